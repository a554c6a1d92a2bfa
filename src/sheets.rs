use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::auth::CredentialProvider;
use crate::config::SheetsConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::decode_response;

/// Values are stored as typed, never parsed as formulas or dates.
const VALUE_INPUT_OPTION: &str = "RAW";
const INSERT_DATA_OPTION: &str = "INSERT_ROWS";

/// What the Sheets API reports after an append
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub updated_range: String,
    pub updated_rows: u64,
}

/// Destination for one row per processed email
#[async_trait]
pub trait SheetSink: Send + Sync {
    async fn append_row(&self, row: &[String]) -> ApiResult<AppendSummary>;
}

#[async_trait]
impl<'a, T: SheetSink + ?Sized> SheetSink for &'a T {
    async fn append_row(&self, row: &[String]) -> ApiResult<AppendSummary> {
        (**self).append_row(row).await
    }
}

#[derive(Serialize)]
struct ValueRange<'a> {
    values: [&'a [String]; 1],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendValuesResponse {
    #[serde(default)]
    updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    #[serde(default)]
    updated_range: Option<String>,
    #[serde(default)]
    updated_rows: Option<u64>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    spreadsheet_id: String,
    range: String,
}

impl SheetsClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
        config: &SheetsConfig,
    ) -> Self {
        SheetsClient {
            http,
            credentials,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
        }
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}:append`, each segment
    /// percent-encoded (ranges like `My Sheet!A:D` contain spaces).
    fn append_url(&self) -> ApiResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ApiError::InvalidUrl(format!("invalid Sheets base URL {}: {}", self.base_url, e))
        })?;

        let range_segment = format!("{}:append", self.range);
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::InvalidUrl(format!("Sheets base URL {} cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range_segment.as_str(),
            ]);

        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION)
            .append_pair("insertDataOption", INSERT_DATA_OPTION);

        Ok(url)
    }
}

#[async_trait]
impl SheetSink for SheetsClient {
    async fn append_row(&self, row: &[String]) -> ApiResult<AppendSummary> {
        let url = self.append_url()?;
        debug!("Appending {} cell(s) to {}", row.len(), self.range);

        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(&ValueRange { values: [row] })
            .send()
            .await?;

        let result: AppendValuesResponse = decode_response(response).await?;
        let updates = result.updates.unwrap_or_default();

        Ok(AppendSummary {
            updated_range: updates.updated_range.unwrap_or_default(),
            updated_rows: updates.updated_rows.unwrap_or_default(),
        })
    }
}
