//! Bounded retry of storage calls on transient faults.
//!
//! A [`RetryPolicy`] runs an operation up to `max_attempts` times, sleeping
//! between attempts according to a fixed schedule. Only errors that report
//! the requested [`FaultClass`] are retried; anything else propagates on the
//! first occurrence, unmodified.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};
use loyalty_shared::FaultClass;
use loyalty_shared::config::RetryConfig;
use thiserror::Error;
use tracing::warn;

/// Errors that can tell whether they belong to a transient fault class.
pub trait TransientFault {
    /// Returns the fault class of this error, or `None` if it is permanent.
    fn fault_class(&self) -> Option<FaultClass>;

    /// Returns true if this error is transient under `class`.
    fn is_transient(&self, class: FaultClass) -> bool {
        self.fault_class() == Some(class)
    }
}

/// Failure of an operation run under a [`RetryPolicy`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error.
    #[error("all {attempts} attempts failed: {source}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The error from the last attempt.
        source: E,
    },

    /// The operation failed with an error that is never retried.
    #[error(transparent)]
    Permanent(E),
}

impl<E> RetryError<E> {
    /// Returns the underlying error.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::Permanent(source) => source,
        }
    }

    /// Returns true if the retry budget was used up.
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Fixed list of waits between attempts.
#[derive(Debug, Clone)]
struct Schedule(Vec<Duration>);

impl BackoffBuilder for Schedule {
    type Backoff = std::vec::IntoIter<Duration>;

    fn build(self) -> Self::Backoff {
        self.0.into_iter()
    }
}

/// Retry-with-backoff wrapper for storage operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    class: FaultClass,
}

impl RetryPolicy {
    /// Creates a policy that waits `delays[i]` after the `i`-th failed attempt.
    ///
    /// The number of attempts is `delays.len() + 1`.
    #[must_use]
    pub const fn new(delays: Vec<Duration>, class: FaultClass) -> Self {
        Self { delays, class }
    }

    /// Creates a policy from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.schedule(), config.fault_class)
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn no_retry(class: FaultClass) -> Self {
        Self::new(Vec::new(), class)
    }

    /// Total attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// The fault class used by [`RetryPolicy::call`].
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        self.class
    }

    /// Runs `op`, retrying while it fails with errors transient under `class`.
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Permanent` with the original error on the first
    /// non-transient failure, or `RetryError::Exhausted` wrapping the last
    /// error once every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, class: FaultClass, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientFault + std::fmt::Display,
    {
        let attempts = AtomicUsize::new(0);

        let result = (|| {
            attempts.fetch_add(1, Ordering::Relaxed);
            op()
        })
        .retry(Schedule(self.delays.clone()))
        .when(|err: &E| err.is_transient(class))
        .notify(|err: &E, delay: Duration| {
            warn!(
                fault = %class,
                attempt = attempts.load(Ordering::Relaxed),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Transient storage fault, retrying"
            );
        })
        .await;

        result.map_err(|source| {
            if source.is_transient(class) {
                RetryError::Exhausted {
                    attempts: attempts.load(Ordering::Relaxed),
                    source,
                }
            } else {
                RetryError::Permanent(source)
            }
        })
    }

    /// Runs `op` under this policy's own fault class.
    ///
    /// # Errors
    ///
    /// See [`RetryPolicy::run`].
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientFault + std::fmt::Display,
    {
        self.run(self.class, op).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
