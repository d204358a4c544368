use serde::Deserialize;
use thiserror::Error;

use super::envelope::status_text;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication rejected ({status}): {}", message.as_deref().unwrap_or("no message"))]
    AuthRejected {
        status: u16,
        message: Option<String>,
        /// `status` field of the error body, e.g. "Unauthorized"
        server_status: Option<String>,
    },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {}", message.as_deref().unwrap_or("no message"))]
    ServerError {
        status: u16,
        message: Option<String>,
        server_status: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error bodies from the auth API share the success envelope.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "status_text")]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message.filter(|m| !m.trim().is_empty());
        let server_status = parsed.status.filter(|s| !s.trim().is_empty());
        let code = status.as_u16();
        match code {
            429 => ApiError::RateLimited,
            400..=499 => ApiError::AuthRejected {
                status: code,
                message,
                server_status,
            },
            500..=599 => ApiError::ServerError {
                status: code,
                message,
                server_status,
            },
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// HTTP status reported by the server, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthRejected { status, .. } | ApiError::ServerError { status, .. } => {
                Some(*status)
            }
            ApiError::RateLimited => Some(429),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) => None,
        }
    }

    /// Human-readable message supplied by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::AuthRejected { message, .. } | ApiError::ServerError { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// The body's own `status` label, falling back to the HTTP code.
    pub fn summary(&self) -> Option<String> {
        match self {
            ApiError::AuthRejected {
                server_status: Some(label),
                ..
            }
            | ApiError::ServerError {
                server_status: Some(label),
                ..
            } => Some(label.clone()),
            _ => self.status().map(|s| s.to_string()),
        }
    }

    /// Whether the server refused the credentials or token outright, as
    /// opposed to a transient failure that may succeed on retry.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ApiError::AuthRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classifies_codes() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"status":401,"message":"Invalid credentials"}"#,
        );
        assert!(err.is_auth_rejection());
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.server_message(), Some("Invalid credentials"));

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, ApiError::ServerError { status: 502, message: None, .. }));
        assert!(!err.is_auth_rejection());

        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ApiError::RateLimited));
        assert!(!err.is_auth_rejection());
    }

    #[test]
    fn test_from_status_ignores_blank_message() {
        let err = ApiError::from_status(StatusCode::FORBIDDEN, r#"{"message":"  "}"#);
        assert_eq!(err.server_message(), None);
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_summary_prefers_body_status() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"status":"Unauthorized","message":"Token expired"}"#,
        );
        assert_eq!(err.summary().as_deref(), Some("Unauthorized"));

        let err = ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.summary().as_deref(), Some("503"));

        let err = ApiError::InvalidResponse("bad".into());
        assert_eq!(err.summary(), None);
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
