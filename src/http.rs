use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

/// Shared HTTP client for both Google APIs.
pub fn build_client(timeout_secs: u64) -> ApiResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("mail2sheets/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Turn a response into `T`, or into an `ApiError` for any non-2xx status.
pub async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::from_status(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        ApiError::InvalidResponse(format!("{} (body: {})", e, truncate(&body, 200)))
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
