use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::auth::CredentialProvider;
use crate::config::GmailConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::decode_response;

pub const UNREAD_LABEL: &str = "UNREAD";

const USER_ID: &str = "me";
const PAGE_SIZE: u32 = 100;

// ============================================================================
// Wire models (subset of the Gmail v1 REST resources)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Option<Vec<String>>,
    #[serde(default)]
    pub snippet: Option<String>,
    /// Milliseconds since the epoch, encoded as a string by the API
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl Message {
    /// False only when the API reported labels and UNREAD is not among them.
    pub fn is_unread(&self) -> bool {
        match &self.label_ids {
            Some(labels) => labels.iter().any(|l| l == UNREAD_LABEL),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Option<Vec<Header>>,
    #[serde(default)]
    pub body: Option<MessagePartBody>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub size: Option<u64>,
    /// base64url-encoded content
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Option<Vec<MessageRef>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyMessageRequest<'a> {
    remove_label_ids: [&'a str; 1],
}

// ============================================================================
// Mailbox
// ============================================================================

/// The three mailbox operations a run needs
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// IDs of every message matching the unread query, across all pages.
    async fn list_unread_ids(&self) -> ApiResult<Vec<String>>;

    /// Full message: headers, labels and MIME tree.
    async fn fetch_message(&self, message_id: &str) -> ApiResult<Message>;

    /// Remove the UNREAD label.
    async fn mark_as_read(&self, message_id: &str) -> ApiResult<()>;
}

#[async_trait]
impl<'a, T: Mailbox + ?Sized> Mailbox for &'a T {
    async fn list_unread_ids(&self) -> ApiResult<Vec<String>> {
        (**self).list_unread_ids().await
    }

    async fn fetch_message(&self, message_id: &str) -> ApiResult<Message> {
        (**self).fetch_message(message_id).await
    }

    async fn mark_as_read(&self, message_id: &str) -> ApiResult<()> {
        (**self).mark_as_read(message_id).await
    }
}

pub struct GmailClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    query: String,
}

impl GmailClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
        config: &GmailConfig,
    ) -> Self {
        GmailClient {
            http,
            credentials,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            query: config.query.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/{}/messages", self.base_url, USER_ID)
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_unread_ids(&self) -> ApiResult<Vec<String>> {
        info!("Searching Gmail with query '{}'", self.query);

        let token = self.credentials.access_token().await?;
        let mut message_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.messages_url())
                .bearer_auth(&token)
                .query(&[("q", self.query.as_str())])
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let page: ListMessagesResponse = decode_response(request.send().await?).await?;

            message_ids.extend(
                page.messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => {
                    debug!("Fetching next page of results ({} IDs so far)", message_ids.len());
                    page_token = Some(next);
                }
                _ => break,
            }
        }

        info!("Found {} unread message(s)", message_ids.len());
        Ok(message_ids)
    }

    async fn fetch_message(&self, message_id: &str) -> ApiResult<Message> {
        debug!("Fetching message {}", message_id);

        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .get(format!("{}/{}", self.messages_url(), message_id))
            .bearer_auth(&token)
            .query(&[("format", "full")])
            .send()
            .await?;

        let message: Message = decode_response(response).await?;
        if message.id != message_id {
            return Err(ApiError::InvalidResponse(format!(
                "asked for message {} but received {}",
                message_id, message.id
            )));
        }
        Ok(message)
    }

    async fn mark_as_read(&self, message_id: &str) -> ApiResult<()> {
        debug!("Removing {} label from {}", UNREAD_LABEL, message_id);

        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(format!("{}/{}/modify", self.messages_url(), message_id))
            .bearer_auth(&token)
            .json(&ModifyMessageRequest {
                remove_label_ids: [UNREAD_LABEL],
            })
            .send()
            .await?;

        // The modified message comes back; only the status matters here.
        let _: serde_json::Value = decode_response(response).await?;
        Ok(())
    }
}
