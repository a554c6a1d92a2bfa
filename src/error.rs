use thiserror::Error;

/// Result alias for the Google API layer
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors raised while talking to the Gmail and Sheets APIs
#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable access token (consent refused, bad client secret, 401/403)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Requested resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, TLS or timeout failure, or an undecodable body
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered 2xx with something we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A configured base URL that cannot be used to build request URLs
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Map a non-success status and its body to an error.
    ///
    /// Google APIs wrap failures as `{"error": {"code": .., "message": ..}}`;
    /// the inner message is preferred over the raw body when present.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            401 | 403 => ApiError::Auth(message),
            404 => ApiError::NotFound(message),
            _ => ApiError::Http { status, message },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_error_message_is_extracted() {
        let body = r#"{"error": {"code": 400, "message": "Unable to parse range: Nope"}}"#;
        match ApiError::from_status(400, body) {
            ApiError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Unable to parse range: Nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn auth_statuses_map_to_auth() {
        assert!(ApiError::from_status(401, "").is_auth());
        assert!(ApiError::from_status(403, "forbidden").is_auth());
        assert!(matches!(ApiError::from_status(404, "gone"), ApiError::NotFound(m) if m == "gone"));
    }
}
