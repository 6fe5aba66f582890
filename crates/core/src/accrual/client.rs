//! Accrual authority collaborator and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::config::AccrualConfig;
use reqwest::{Client, StatusCode, header};
use tracing::debug;

use super::types::{AccrualError, AccrualReport};
use crate::order::OrderNumber;

/// Source of truth for how many points an order earns.
#[async_trait]
pub trait AccrualAuthority: Send + Sync {
    /// Asks for the current status and accrual of `number`.
    async fn query(&self, number: &OrderNumber) -> Result<AccrualReport, AccrualError>;
}

/// HTTP client for the accrual service (`GET /api/orders/{number}`).
#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    client: Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// Creates a client for the configured address.
    ///
    /// A bare `host:port` address is treated as plain HTTP.
    pub fn new(config: &AccrualConfig) -> Result<Self, AccrualError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.address),
        })
    }

    /// URL queried for `number`.
    #[must_use]
    pub fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

#[async_trait]
impl AccrualAuthority for HttpAccrualClient {
    async fn query(&self, number: &OrderNumber) -> Result<AccrualReport, AccrualError> {
        let response = self.client.get(self.order_url(number)).send().await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.bytes().await?;

        debug!(order = %number, status = %status, "Accrual service answered");
        interpret_response(number, status, retry_after, &body)
    }
}

fn normalize_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Parses a `Retry-After` value given in seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Turns a raw HTTP answer into a report.
///
/// # Errors
///
/// * `204` → `AccrualError::NotRegistered`
/// * `429` → `AccrualError::RateLimited`
/// * any other non-`200` → `AccrualError::UnexpectedStatus`
/// * undecodable body, negative accrual or foreign order → decode errors
pub fn interpret_response(
    number: &OrderNumber,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &[u8],
) -> Result<AccrualReport, AccrualError> {
    match status {
        StatusCode::OK => {}
        StatusCode::NO_CONTENT => return Err(AccrualError::NotRegistered),
        StatusCode::TOO_MANY_REQUESTS => return Err(AccrualError::RateLimited { retry_after }),
        other => return Err(AccrualError::UnexpectedStatus(other.as_u16())),
    }

    let report: AccrualReport =
        serde_json::from_slice(body).map_err(|err| AccrualError::Decode(err.to_string()))?;

    if report.order != number.as_str() {
        return Err(AccrualError::OrderMismatch {
            expected: number.to_string(),
            actual: report.order,
        });
    }
    if let Some(accrual) = report.accrual
        && accrual.is_negative()
    {
        return Err(AccrualError::Decode(format!("negative accrual {accrual}")));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accrual::AccrualStatus;
    use loyalty_shared::Points;
    use rust_decimal_macros::dec;

    fn number() -> OrderNumber {
        OrderNumber::parse("4561261212345467").unwrap()
    }

    #[test]
    fn test_processed_report() {
        let body = br#"{"order":"4561261212345467","status":"PROCESSED","accrual":500}"#;
        let report = interpret_response(&number(), StatusCode::OK, None, body).unwrap();

        assert_eq!(report.status, AccrualStatus::Processed);
        assert_eq!(report.accrual, Some(Points::new(dec!(500))));
    }

    #[test]
    fn test_registered_alias() {
        let body = br#"{"order":"4561261212345467","status":"REGISTERED"}"#;
        let report = interpret_response(&number(), StatusCode::OK, None, body).unwrap();
        assert_eq!(report.status, AccrualStatus::New);
    }

    #[test]
    fn test_no_content_means_not_registered() {
        let result = interpret_response(&number(), StatusCode::NO_CONTENT, None, b"");
        assert!(matches!(result, Err(AccrualError::NotRegistered)));
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let result = interpret_response(
            &number(),
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(60)),
            b"No more than N requests per minute allowed",
        );
        assert!(matches!(
            result,
            Err(AccrualError::RateLimited { retry_after: Some(d) }) if d == Duration::from_secs(60)
        ));
    }

    #[test]
    fn test_server_error_is_unexpected() {
        let result = interpret_response(&number(), StatusCode::INTERNAL_SERVER_ERROR, None, b"");
        assert!(matches!(result, Err(AccrualError::UnexpectedStatus(500))));
    }

    #[test]
    fn test_garbage_body_is_decode_error() {
        let result = interpret_response(&number(), StatusCode::OK, None, b"<html>");
        assert!(matches!(result, Err(AccrualError::Decode(_))));
    }

    #[test]
    fn test_negative_accrual_is_decode_error() {
        let body = br#"{"order":"4561261212345467","status":"PROCESSED","accrual":-5}"#;
        let result = interpret_response(&number(), StatusCode::OK, None, body);
        assert!(matches!(result, Err(AccrualError::Decode(_))));
    }

    #[test]
    fn test_foreign_order_rejected() {
        let body = br#"{"order":"79927398713","status":"PROCESSED","accrual":5}"#;
        let result = interpret_response(&number(), StatusCode::OK, None, body);
        assert!(matches!(result, Err(AccrualError::OrderMismatch { .. })));
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after(" 60 "), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_order_url() {
        let client = HttpAccrualClient::new(&AccrualConfig::new("localhost:8081/")).unwrap();
        assert_eq!(
            client.order_url(&number()),
            "http://localhost:8081/api/orders/4561261212345467"
        );

        let client = HttpAccrualClient::new(&AccrualConfig::new("https://accrual.example")).unwrap();
        assert_eq!(
            client.order_url(&number()),
            "https://accrual.example/api/orders/4561261212345467"
        );
    }
}
