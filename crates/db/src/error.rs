//! Classification of database errors into the storage error taxonomy.
//!
//! Decisions are made on SQLSTATE codes reported by PostgreSQL, never on
//! message text.

use loyalty_core::StoreError;
use loyalty_shared::FaultClass;
use sea_orm::{DbErr, RuntimeErr};

/// `unique_violation`
pub const UNIQUE_VIOLATION: &str = "23505";
/// `foreign_key_violation`
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// `check_violation`
pub const CHECK_VIOLATION: &str = "23514";

/// Returns the SQLSTATE code carried by `err`, if any.
#[must_use]
pub fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

/// Returns true if `err` is a violation of a uniqueness constraint.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    sqlstate(err).as_deref() == Some(UNIQUE_VIOLATION)
}

/// Returns true if `err` is a violation of a foreign key.
#[must_use]
pub fn is_foreign_key_violation(err: &DbErr) -> bool {
    sqlstate(err).as_deref() == Some(FOREIGN_KEY_VIOLATION)
}

/// Maps a SQLSTATE code onto a transient storage error.
///
/// Class `08` becomes `StoreError::Connection`, class `57` becomes
/// `StoreError::OperatorIntervention`; anything else is not transient.
#[must_use]
pub fn transient_from_sqlstate(code: &str, message: String) -> Option<StoreError> {
    match FaultClass::from_sqlstate(code)? {
        FaultClass::ConnectionException => Some(StoreError::Connection(message)),
        FaultClass::OperatorIntervention => Some(StoreError::OperatorIntervention(message)),
    }
}

/// Classifies a database error that callers have no specific mapping for.
#[must_use]
pub fn classify(err: DbErr) -> StoreError {
    let message = err.to_string();

    if let Some(code) = sqlstate(&err) {
        return transient_from_sqlstate(&code, message.clone())
            .unwrap_or(StoreError::Backend(message));
    }

    match err {
        DbErr::ConnectionAcquire(_) => StoreError::Connection(message),
        DbErr::Conn(RuntimeErr::SqlxError(inner))
        | DbErr::Exec(RuntimeErr::SqlxError(inner))
        | DbErr::Query(RuntimeErr::SqlxError(inner))
            if is_connection_failure(&inner) =>
        {
            StoreError::Connection(message)
        }
        DbErr::Conn(_) => StoreError::Connection(message),
        _ => StoreError::Backend(message),
    }
}

fn is_connection_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("08000")]
    #[case("08003")]
    #[case("08006")]
    #[case("08P01")]
    fn test_connection_exception_class(#[case] code: &str) {
        assert!(matches!(
            transient_from_sqlstate(code, "lost".into()),
            Some(StoreError::Connection(_))
        ));
    }

    #[rstest]
    #[case("57000")]
    #[case("57014")]
    #[case("57P01")]
    #[case("57P03")]
    fn test_operator_intervention_class(#[case] code: &str) {
        assert!(matches!(
            transient_from_sqlstate(code, "admin shutdown".into()),
            Some(StoreError::OperatorIntervention(_))
        ));
    }

    #[rstest]
    #[case(UNIQUE_VIOLATION)]
    #[case(FOREIGN_KEY_VIOLATION)]
    #[case(CHECK_VIOLATION)]
    #[case("40001")]
    #[case("42P01")]
    fn test_other_codes_are_not_transient(#[case] code: &str) {
        assert_eq!(transient_from_sqlstate(code, "x".into()), None);
    }

    #[test]
    fn test_pool_timeout_is_connection_failure() {
        let err = classify(DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut)));
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_io_failure_during_query_is_connection_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = classify(DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Io(io))));
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_unclassified_error_is_backend() {
        let err = classify(DbErr::Custom("unexpected".into()));
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!is_unique_violation(&DbErr::Custom("unexpected".into())));
    }
}
