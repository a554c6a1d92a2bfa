/// Extraction of the spreadsheet-relevant fields from a Gmail message
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::gmail::{Message, MessagePart};

pub const UNKNOWN_SENDER: &str = "Unknown";
pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN_DATE: &str = "Unknown Date";
pub const NO_BODY: &str = "No Body";

/// Gmail bodies are base64url; padding is present on some parts and not others.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static ANGLE_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]+)>").expect("valid regex"));

/// One email, reduced to the columns written to the sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailRecord {
    pub message_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub received_at: Option<String>,
    pub body: Option<String>,
}

impl EmailRecord {
    pub fn from_message(message: &Message) -> Self {
        let mut record = EmailRecord {
            message_id: message.id.clone(),
            ..Default::default()
        };

        if let Some(payload) = &message.payload {
            for header in payload.headers.iter().flatten() {
                if header.value.trim().is_empty() {
                    continue;
                }
                match header.name.to_ascii_lowercase().as_str() {
                    "from" => record.sender = Some(sender_address(&header.value)),
                    "subject" => record.subject = Some(header.value.clone()),
                    "date" => record.received_at = Some(header.value.clone()),
                    _ => {}
                }
            }

            let body = plain_text_body(payload);
            if !body.is_empty() {
                record.body = Some(body);
            }
        }

        // internalDate is always present, so it only completes a record that
        // already has content; otherwise empty messages would never be skipped.
        if record.received_at.is_none() && !record.is_empty() {
            record.received_at = message.internal_date.as_deref().and_then(internal_date_rfc2822);
        }

        debug!(
            "Extracted message {}: from={:?} subject={:?}",
            record.message_id, record.sender, record.subject
        );

        record
    }

    /// True when nothing usable came out of the message.
    pub fn is_empty(&self) -> bool {
        [&self.sender, &self.subject, &self.received_at, &self.body]
            .iter()
            .all(|field| field.as_deref().map_or(true, str::is_empty))
    }

    /// `[sender, subject, received_at, body]`, with placeholders for gaps.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            or_placeholder(&self.sender, UNKNOWN_SENDER),
            or_placeholder(&self.subject, NO_SUBJECT),
            or_placeholder(&self.received_at, UNKNOWN_DATE),
            or_placeholder(&self.body, NO_BODY),
        ]
    }

    /// Body cut to `max_chars` characters, suffixed with `...` when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let body = self.body.as_deref().unwrap_or("");
        if body.chars().count() > max_chars {
            format!("{}...", body.chars().take(max_chars).collect::<String>())
        } else {
            body.to_string()
        }
    }
}

fn or_placeholder(value: &Option<String>, placeholder: &str) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

/// `"Name <user@example.com>"` → `user@example.com`; anything else unchanged.
pub fn sender_address(from: &str) -> String {
    ANGLE_ADDRESS
        .captures(from)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| from.to_string())
}

/// First non-empty `text/plain` part, depth first. HTML-only mail yields "".
pub fn plain_text_body(part: &MessagePart) -> String {
    let mime_type = part.mime_type.as_deref().unwrap_or("");

    if mime_type.eq_ignore_ascii_case("text/plain") {
        return part
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .map(decode_body_data)
            .unwrap_or_default();
    }

    if mime_type.to_ascii_lowercase().starts_with("multipart/") {
        return part
            .parts
            .iter()
            .flatten()
            .map(plain_text_body)
            .find(|body| !body.is_empty())
            .unwrap_or_default();
    }

    String::new()
}

fn decode_body_data(data: &str) -> String {
    match URL_SAFE_LENIENT.decode(data.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("Undecodable body data ({} chars): {}", data.len(), e);
            String::new()
        }
    }
}

fn internal_date_rfc2822(millis: &str) -> Option<String> {
    let millis: i64 = millis.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.to_rfc2822())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::{Header, MessagePartBody};

    fn b64(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    fn text_part(mime: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            body: Some(MessagePartBody {
                size: Some(text.len() as u64),
                data: Some(b64(text)),
            }),
            ..Default::default()
        }
    }

    fn header(name: &str, value: &str) -> Header {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn message_with(payload: MessagePart) -> Message {
        Message {
            id: "m1".to_string(),
            payload: Some(payload),
            ..Default::default()
        }
    }

    #[test]
    fn sender_is_taken_from_angle_brackets() {
        assert_eq!(sender_address("Jane Doe <jane@example.com>"), "jane@example.com");
        assert_eq!(sender_address("jane@example.com"), "jane@example.com");
        assert_eq!(sender_address("\"Doe, Jane\" <jane@example.com>"), "jane@example.com");
    }

    #[test]
    fn headers_match_case_insensitively() {
        let mut payload = text_part("text/plain", "Hello there");
        payload.headers = Some(vec![
            header("FROM", "Ops <ops@example.com>"),
            header("subject", "Weekly report"),
            header("Date", "Mon, 6 Oct 2025 09:15:00 +0200"),
            header("To", "me@example.com"),
        ]);

        let record = EmailRecord::from_message(&message_with(payload));
        assert_eq!(record.sender.as_deref(), Some("ops@example.com"));
        assert_eq!(record.subject.as_deref(), Some("Weekly report"));
        assert_eq!(record.received_at.as_deref(), Some("Mon, 6 Oct 2025 09:15:00 +0200"));
        assert_eq!(record.body.as_deref(), Some("Hello there"));
    }

    #[test]
    fn multipart_prefers_first_plain_text_part() {
        let alternative = MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            parts: Some(vec![
                text_part("text/html", "<p>html</p>"),
                text_part("text/plain", "plain version"),
            ]),
            ..Default::default()
        };
        let mixed = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: Some(vec![alternative, text_part("text/plain", "attachment text")]),
            ..Default::default()
        };

        assert_eq!(plain_text_body(&mixed), "plain version");
    }

    #[test]
    fn html_only_message_has_no_body() {
        let record = EmailRecord::from_message(&message_with(text_part("text/html", "<b>hi</b>")));
        assert_eq!(record.body, None);
        assert_eq!(record.to_row()[3], NO_BODY);
    }

    #[test]
    fn padded_and_unpadded_bodies_decode() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("ab?>");
        let part = MessagePart {
            mime_type: Some("text/plain".to_string()),
            body: Some(MessagePartBody { size: None, data: Some(padded) }),
            ..Default::default()
        };
        assert_eq!(plain_text_body(&part), "ab?>");
        assert_eq!(plain_text_body(&text_part("text/plain", "ab?>")), "ab?>");
    }

    #[test]
    fn missing_date_falls_back_to_internal_date() {
        let mut message = message_with(text_part("text/plain", "body"));
        message.internal_date = Some("1700000000000".to_string());

        let record = EmailRecord::from_message(&message);
        assert_eq!(record.received_at.as_deref(), Some("Tue, 14 Nov 2023 22:13:20 +0000"));
    }

    #[test]
    fn internal_date_alone_is_still_empty() {
        let mut message = message_with(text_part("text/html", "<p>only html</p>"));
        message.internal_date = Some("1700000000000".to_string());

        let record = EmailRecord::from_message(&message);
        assert!(record.is_empty());
        assert_eq!(record.received_at, None);
    }

    #[test]
    fn blank_date_header_falls_back_to_internal_date() {
        let mut payload = text_part("text/plain", "hi");
        payload.headers = Some(vec![header("Date", ""), header("Subject", "  ")]);
        let mut message = message_with(payload);
        message.internal_date = Some("1700000000000".to_string());

        let record = EmailRecord::from_message(&message);
        assert_eq!(record.subject, None);
        assert_eq!(
            record.to_row(),
            vec!["Unknown", "No Subject", "Tue, 14 Nov 2023 22:13:20 +0000", "hi"]
        );
    }

    #[test]
    fn row_uses_placeholders() {
        let record = EmailRecord {
            message_id: "m1".to_string(),
            subject: Some(String::new()),
            ..Default::default()
        };
        assert!(record.is_empty());
        assert_eq!(record.to_row(), vec!["Unknown", "No Subject", "Unknown Date", "No Body"]);
    }

    #[test]
    fn preview_truncates_on_characters() {
        let record = EmailRecord {
            body: Some("é".repeat(120)),
            ..Default::default()
        };
        let preview = record.preview(100);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 103);

        let short = EmailRecord {
            body: Some("short".to_string()),
            ..Default::default()
        };
        assert_eq!(short.preview(100), "short");
    }
}
