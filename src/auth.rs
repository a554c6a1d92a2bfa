use async_trait::async_trait;
use log::{debug, info};
use yup_oauth2::authenticator::Authenticator;

use crate::config::GoogleAuthConfig;
use crate::error::{ApiError, ApiResult};

/// Read messages and remove the UNREAD label.
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
/// Append rows to spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Every scope a run needs. Requesting them together keeps a single token
/// (and a single consent prompt) for both APIs.
pub const DEFAULT_SCOPES: [&str; 2] = [GMAIL_MODIFY_SCOPE, SHEETS_SCOPE];

/// Source of a valid bearer token for the Google APIs
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> ApiResult<String>;
}

type HttpsAuthenticator =
    Authenticator<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

/// OAuth2 installed-application flow backed by an on-disk token cache.
///
/// The first run opens the consent page and catches the redirect on a local
/// port. Later runs reuse the cached token and refresh it once it expires.
pub struct InstalledFlowCredentials {
    auth: HttpsAuthenticator,
    scopes: Vec<String>,
}

impl InstalledFlowCredentials {
    pub async fn new(config: &GoogleAuthConfig, scopes: &[&str]) -> ApiResult<Self> {
        info!("🔐 Loading OAuth2 client secret from {}", config.credentials_path);

        let secret = yup_oauth2::read_application_secret(&config.credentials_path)
            .await
            .map_err(|e| {
                ApiError::Auth(format!(
                    "unable to read OAuth2 client credentials file {}: {}",
                    config.credentials_path, e
                ))
            })?;

        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .map_err(|e| ApiError::Auth(format!("unable to create OAuth2 authenticator: {}", e)))?;

        debug!("Token cache: {}", config.token_cache_path);

        Ok(InstalledFlowCredentials {
            auth,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[async_trait]
impl CredentialProvider for InstalledFlowCredentials {
    async fn access_token(&self) -> ApiResult<String> {
        let token = self
            .auth
            .token(self.scopes.as_slice())
            .await
            .map_err(|e| ApiError::Auth(e.to_string()))?;

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Auth("token response carried no access token".to_string()))
    }
}

/// A bearer token obtained elsewhere and used as-is
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> ApiResult<String> {
        Ok(self.0.clone())
    }
}
