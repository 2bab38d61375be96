//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service returned an error response.
    #[error("API error ({status}) {code}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code reported by the service.
        code: String,
        /// Error message reported by the service.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if the service throttled the request.
    pub fn is_throttled(&self) -> bool {
        match self {
            Error::Api { status: 429, .. } => true,
            Error::Api { code, .. } => {
                code.contains("Throttl")
                    || code == "TooManyRequestsException"
                    || code == "RequestLimitExceeded"
            }
            _ => false,
        }
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }

    /// Check if retrying the same request later may succeed.
    ///
    /// Transport failures, throttling and server errors are transient;
    /// client errors and undecodable responses are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_)) || self.is_throttled() || self.is_server_error()
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body of the JSON protocol.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct JsonErrorResponse {
    #[serde(rename = "__type", default)]
    pub code: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl JsonErrorResponse {
    /// The error code without its namespace prefix.
    pub(crate) fn short_code(&self) -> Option<&str> {
        self.code
            .as_deref()
            .map(|c| c.rsplit_once('#').map_or(c, |(_, short)| short))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str) -> Error {
        Error::Api {
            status,
            code: code.to_string(),
            message: String::new(),
        }
    }

    #[test]
    fn test_is_throttled() {
        assert!(api(400, "ThrottlingException").is_throttled());
        assert!(api(400, "Throttling").is_throttled());
        assert!(api(429, "unknown").is_throttled());
        assert!(!api(400, "ExecutionDoesNotExist").is_throttled());
        assert!(!Error::Config("x".to_string()).is_throttled());
    }

    #[test]
    fn test_is_server_error() {
        assert!(api(503, "ServiceUnavailable").is_server_error());
        assert!(!api(400, "InvalidArn").is_server_error());
    }

    #[test]
    fn test_is_transient() {
        assert!(api(400, "ThrottlingException").is_transient());
        assert!(api(502, "BadGateway").is_transient());
        assert!(!api(400, "AccessDeniedException").is_transient());
        assert!(!api(400, "ExecutionDoesNotExist").is_transient());
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::Json(decode).is_transient());
    }

    #[test]
    fn test_short_code() {
        let body: JsonErrorResponse = serde_json::from_str(
            r#"{"__type": "com.amazonaws.swf.service.model#ThrottlingException", "message": "Rate exceeded"}"#,
        )
        .unwrap();
        assert_eq!(body.short_code(), Some("ThrottlingException"));
        assert_eq!(body.message.as_deref(), Some("Rate exceeded"));

        let body: JsonErrorResponse =
            serde_json::from_str(r#"{"__type": "InvalidArn", "Message": "bad"}"#).unwrap();
        assert_eq!(body.short_code(), Some("InvalidArn"));
        assert_eq!(body.message.as_deref(), Some("bad"));
    }
}
