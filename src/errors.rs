//! API Error Hierarchy
//!
//! 거래소 API 호출 에러 타입 정의
//!
//! 에러는 세 분류로 나뉜다:
//! - 재시도 대상: HTTP 429 ([`ApiError::RateLimited`]) — 클라이언트가 고정
//!   지연 후 재전송하며 호출자에게 노출되지 않는다.
//! - 요청 거부: 그 외 비 2xx 응답 ([`ApiError::RequestFailed`]) — 거래소 에러
//!   코드와 원 요청 컨텍스트를 담아 그대로 전파된다.
//! - 메타데이터 누락: 필수 응답 헤더 부재 ([`ApiError::MissingHeader`]) —
//!   기본값으로 대체하지 않고 즉시 실패한다.

use thiserror::Error;

/// API 에러
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request rejected by the exchange (non-2xx, non-429)
    ///
    /// 거래소 에러 코드(`code`)와 함께 원 요청의 메서드/URL/파라미터를 보존한다.
    #[error("Request failed [{code}] {status} {status_text}: {method} {url}")]
    RequestFailed {
        /// 거래소가 내려준 에러 코드 또는 이름 (예: Upbit `error.name`, Bithumb 상태 코드)
        code: String,
        status: u16,
        status_text: String,
        method: String,
        url: String,
        /// 요청 당시의 인코딩된 파라미터
        params: Option<String>,
    },

    /// HTTP 429 — retried internally, not surfaced to callers
    #[error("Rate limited: {url}")]
    RateLimited { url: String },

    /// Authentication material missing or unusable
    #[error("Authentication error: {message}")]
    AuthenticationError { message: String },

    /// Transport-level failure
    #[error("Network error: {url} - {message}")]
    NetworkError { url: String, message: String },

    /// Request timed out
    #[error("Request timeout: {url}")]
    RequestTimeout { url: String },

    /// Required response header absent
    #[error("Missing response header: {name}")]
    MissingHeader { name: String },

    /// Failed to parse response data into the expected shape
    #[error("Parse error: {data_type} - {message}")]
    ParseError { data_type: String, message: String },

    /// JSON (de)serialization error
    #[error("JSON error: {message}")]
    JsonError { message: String },

    /// WebSocket connection or protocol error
    #[error("WebSocket error: {message}")]
    WebSocketError { message: String },

    /// WebSocket unsubscribe failed (unknown channel id)
    #[error("Unsubscribe error: {message}")]
    UnsubscribeError { message: String },
}

impl ApiError {
    /// Returns the error code as a string constant
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RequestFailed { .. } => "REQUEST_FAILED",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::AuthenticationError { .. } => "AUTHENTICATION_ERROR",
            ApiError::NetworkError { .. } => "NETWORK_ERROR",
            ApiError::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            ApiError::MissingHeader { .. } => "MISSING_HEADER",
            ApiError::ParseError { .. } => "PARSE_ERROR",
            ApiError::JsonError { .. } => "JSON_ERROR",
            ApiError::WebSocketError { .. } => "WEBSOCKET_ERROR",
            ApiError::UnsubscribeError { .. } => "UNSUBSCRIBE_ERROR",
        }
    }

    /// Returns true if this error is temporary and the operation can be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::NetworkError { .. }
                | ApiError::RequestTimeout { .. }
        )
    }

    /// Returns the upstream error code for request-rejected errors
    pub fn upstream_code(&self) -> Option<&str> {
        match self {
            ApiError::RequestFailed { code, .. } => Some(code),
            _ => None,
        }
    }
}

// === From implementations for common error types ===

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::JsonError {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::RequestTimeout {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else if err.is_connect() {
            ApiError::NetworkError {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                message: "Connection failed".into(),
            }
        } else {
            ApiError::NetworkError {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                message: err.to_string(),
            }
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ApiError::WebSocketError {
            message: err.to_string(),
        }
    }
}

/// Result 타입 alias
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ApiError::RequestFailed {
            code: "too_many_request".into(),
            status: 418,
            status_text: "I'm a teapot".into(),
            method: "GET".into(),
            url: "https://api.upbit.com/v1/ticker".into(),
            params: Some("markets=KRW-BTC".into()),
        };
        assert_eq!(err.code(), "REQUEST_FAILED");
        assert_eq!(err.upstream_code(), Some("too_many_request"));

        let err = ApiError::MissingHeader {
            name: "remaining-req".into(),
        };
        assert_eq!(err.code(), "MISSING_HEADER");
        assert_eq!(err.upstream_code(), None);
    }

    #[test]
    fn test_retryable_errors() {
        let rate_limited = ApiError::RateLimited {
            url: "https://api.upbit.com/v1/ticker".into(),
        };
        assert!(rate_limited.is_retryable());

        let network_err = ApiError::NetworkError {
            url: "https://api.bithumb.com".into(),
            message: "Connection refused".into(),
        };
        assert!(network_err.is_retryable());

        let request_failed = ApiError::RequestFailed {
            code: "5600".into(),
            status: 200,
            status_text: "OK".into(),
            method: "POST".into(),
            url: "https://api.bithumb.com/info/orders".into(),
            params: None,
        };
        assert!(!request_failed.is_retryable());

        let auth_err = ApiError::AuthenticationError {
            message: "Secret required".into(),
        };
        assert!(!auth_err.is_retryable());
    }

    #[test]
    fn test_request_failed_display() {
        let err = ApiError::RequestFailed {
            code: "insufficient_funds_bid".into(),
            status: 400,
            status_text: "Bad Request".into(),
            method: "POST".into(),
            url: "https://api.upbit.com/v1/orders".into(),
            params: Some("market=KRW-BTC&side=bid".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("insufficient_funds_bid"));
        assert!(msg.contains("400"));
        assert!(msg.contains("/v1/orders"));
    }
}
