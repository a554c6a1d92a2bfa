use anyhow::Result;
use log::warn;
use serde::Deserialize;

/// Spreadsheet receiving the rows when `SPREADSHEET_ID` is not set.
pub const DEFAULT_SPREADSHEET_ID: &str = "1vl5_OAjK7l-NoWN4rLgGZokpf-YAF1qdQxdKBytSQ_c";

pub const DEFAULT_GMAIL_QUERY: &str = "is:unread in:inbox";
pub const DEFAULT_GMAIL_BASE_URL: &str = "https://gmail.googleapis.com";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub auth: GoogleAuthConfig,
    pub gmail: GmailConfig,
    pub sheets: SheetsConfig,
    pub processed_ids_path: String,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleAuthConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
    /// Pre-issued bearer token; skips the OAuth flow entirely when set.
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub query: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub range: String,
    pub base_url: String,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, so callers other than
    /// `main` do not have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let http_timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    warn!("HTTP_TIMEOUT_SECS={:?} is not a positive integer, using 30", raw);
                    30
                }
            },
            None => 30,
        };

        let spreadsheet_id = var("SPREADSHEET_ID", DEFAULT_SPREADSHEET_ID);
        if spreadsheet_id.contains('/') {
            anyhow::bail!(
                "SPREADSHEET_ID must be the bare ID from the sheet URL, not the URL itself: {}",
                spreadsheet_id
            );
        }

        Ok(Config {
            auth: GoogleAuthConfig {
                credentials_path: var("GOOGLE_CREDENTIALS_PATH", "credentials/credentials.json"),
                token_cache_path: var("GOOGLE_TOKEN_CACHE_PATH", "./google-token-cache.json"),
                access_token: lookup("GOOGLE_ACCESS_TOKEN").filter(|t| !t.trim().is_empty()),
            },
            gmail: GmailConfig {
                query: var("GMAIL_QUERY", DEFAULT_GMAIL_QUERY),
                base_url: var("GMAIL_API_BASE_URL", DEFAULT_GMAIL_BASE_URL),
            },
            sheets: SheetsConfig {
                spreadsheet_id,
                range: var("SHEET_RANGE", "Sheet1"),
                base_url: var("SHEETS_API_BASE_URL", DEFAULT_SHEETS_BASE_URL),
            },
            processed_ids_path: var("PROCESSED_IDS_PATH", "processed_emails.json"),
            http_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.sheets.spreadsheet_id, DEFAULT_SPREADSHEET_ID);
        assert_eq!(config.sheets.range, "Sheet1");
        assert_eq!(config.gmail.query, "is:unread in:inbox");
        assert_eq!(config.processed_ids_path, "processed_emails.json");
        assert_eq!(config.auth.credentials_path, "credentials/credentials.json");
        assert!(config.auth.access_token.is_none());
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = config_from(&[
            ("SPREADSHEET_ID", "abc123"),
            ("SHEET_RANGE", "Inbox!A:D"),
            ("PROCESSED_IDS_PATH", "/tmp/ids.json"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.sheets.spreadsheet_id, "abc123");
        assert_eq!(config.sheets.range, "Inbox!A:D");
        assert_eq!(config.processed_ids_path, "/tmp/ids.json");
        assert_eq!(config.auth.access_token.as_deref(), Some("ya29.token"));
        assert_eq!(config.http_timeout_secs, 5);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("SHEET_RANGE", "  "), ("GOOGLE_ACCESS_TOKEN", "")]).unwrap();
        assert_eq!(config.sheets.range, "Sheet1");
        assert!(config.auth.access_token.is_none());
    }

    #[test]
    fn invalid_timeout_uses_default() {
        let config = config_from(&[("HTTP_TIMEOUT_SECS", "soon")]).unwrap();
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn spreadsheet_url_is_rejected() {
        let result = config_from(&[(
            "SPREADSHEET_ID",
            "https://docs.google.com/spreadsheets/d/abc/edit",
        )]);
        assert!(result.is_err());
    }
}
