//! Messages accepted from WebSocket clients

use crate::llm::Attachment;
use serde::Deserialize;

const DEFAULT_IMAGE_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Start {
        dilemma: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
        /// Single image, raw base64 or a `data:` URL
        #[serde(default)]
        image_data: Option<String>,
    },
    /// Directive with content
    Intervention { content: String },
    /// Halt the running turn, optionally with a directive
    Interrupt {
        #[serde(default)]
        content: Option<String>,
    },
    StartCrossExam,
    ConcludeCrossExam,
}

/// Fold the legacy `image_data` field into the attachment list
pub fn collect_attachments(mut attachments: Vec<Attachment>, image_data: Option<String>) -> Vec<Attachment> {
    if let Some(image) = image_data.filter(|d| !d.trim().is_empty()) {
        attachments.push(parse_data_url(&image));
    }
    attachments
}

fn parse_data_url(raw: &str) -> Attachment {
    let raw = raw.trim();
    if let Some((header, data)) = raw
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
    {
        let media_type = header
            .strip_suffix(";base64")
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_IMAGE_TYPE);
        return Attachment {
            media_type: media_type.to_string(),
            data: data.to_string(),
        };
    }
    Attachment {
        media_type: DEFAULT_IMAGE_TYPE.to_string(),
        data: raw.to_string(),
    }
}
