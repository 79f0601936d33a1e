//! Host-side plugin contract
//!
//! The host framework owns the conversation model: it hands the adapter a
//! [`Prompt`] (the current turn), an optional [`Conversation`] (prior turns)
//! and a [`ResponseRecord`] to fill with the provider's verbatim response.
//! Everything here is read-only to the adapter except the record.

use crate::claude::ClaudeModel;
use crate::error::{AdapterError, AdapterResult};
use crate::options::Options;
use base64::Engine;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

/// Environment variable consulted when no explicit API key is provided
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Media types accepted as image attachments
pub const IMAGE_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// Media type accepted as a document attachment
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Resolve the API key for a request: an explicit key wins, otherwise the
/// environment is consulted.
pub fn resolve_api_key(explicit: Option<&str>) -> AdapterResult<String> {
    if let Some(key) = explicit {
        return Ok(key.to_string());
    }
    env::var(API_KEY_ENV).map_err(|_| AdapterError::MissingKey { var: API_KEY_ENV })
}

/// Binary attachment with a resolved media type, scoped to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    media_type: String,
    content: Vec<u8>,
}

impl Attachment {
    /// Create an attachment from bytes and an already-resolved media type
    pub fn new(media_type: impl Into<String>, content: Vec<u8>) -> AdapterResult<Self> {
        let media_type = media_type.into();
        if !IMAGE_MEDIA_TYPES.contains(&media_type.as_str()) && media_type != PDF_MEDIA_TYPE {
            return Err(AdapterError::InvalidRequest(format!(
                "unsupported attachment media type: {}",
                media_type
            )));
        }
        Ok(Self {
            media_type,
            content,
        })
    }

    /// Create an attachment by sniffing the media type from the content
    pub fn from_bytes(content: Vec<u8>) -> AdapterResult<Self> {
        let kind = infer::get(&content).ok_or_else(|| {
            AdapterError::InvalidRequest("could not resolve attachment media type".to_string())
        })?;
        Self::new(kind.mime_type(), content)
    }

    /// The resolved media type
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Whether this attachment is a PDF document
    pub fn is_document(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }

    /// Base64 encoding of the content, as the wire format requires
    pub fn base64_data(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.content)
    }
}

/// The current user turn
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Prompt text
    pub prompt: String,

    /// Optional system-prompt override
    pub system: Option<String>,

    /// Ordered attachments for this turn
    pub attachments: Vec<Attachment>,

    /// Validated sampling configuration
    pub options: Options,
}

impl Prompt {
    /// Create a prompt from text and validated options
    pub fn new(prompt: impl Into<String>, options: Options) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            attachments: Vec::new(),
            options,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Append an attachment
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// One completed prior exchange: a user turn and the assistant's reply
#[derive(Debug, Clone)]
pub struct Exchange {
    /// The user prompt text of the turn
    pub prompt: String,

    /// Attachments the user turn carried
    pub attachments: Vec<Attachment>,

    /// The assistant's response text
    pub response: String,
}

impl Exchange {
    /// Create a plain text exchange
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: Vec::new(),
            response: response.into(),
        }
    }

    /// Append an attachment to the user turn
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Ordered prior exchanges, immutable once read
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// Exchanges in chronological order
    pub exchanges: Vec<Exchange>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exchange
    pub fn push(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }
}

/// Out-parameter the host passes to collect the provider's raw response
#[derive(Debug, Clone, Default)]
pub struct ResponseRecord {
    /// The provider response, stored verbatim
    pub response_json: Option<serde_json::Value>,
}

impl ResponseRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }
}

/// Registry of adapters keyed by model id, with alias resolution
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ClaudeModel>>,
    aliases: HashMap<String, String>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its model id, plus zero or more aliases
    pub fn register(&mut self, model: ClaudeModel, aliases: &[&str]) {
        let model_id = model.model_id().to_string();
        for alias in aliases {
            self.aliases.insert((*alias).to_string(), model_id.clone());
        }
        self.models.insert(model_id, Arc::new(model));
    }

    /// Look up an adapter by model id or alias
    pub fn get_model(&self, id: &str) -> Option<Arc<ClaudeModel>> {
        if let Some(model) = self.models.get(id) {
            return Some(Arc::clone(model));
        }
        let target = self.aliases.get(id)?;
        self.models.get(target).map(Arc::clone)
    }

    /// Registered model ids, in no particular order
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_rejects_unknown_media_type() {
        let err = Attachment::new("text/plain", b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest(_)));
    }

    #[test]
    fn attachment_sniffs_png() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec();
        let attachment = Attachment::from_bytes(png).unwrap();
        assert_eq!(attachment.media_type(), "image/png");
        assert!(!attachment.is_document());
    }

    #[test]
    fn attachment_base64_round_trips() {
        let attachment = Attachment::new("image/png", vec![1, 2, 3]).unwrap();
        assert_eq!(attachment.base64_data(), "AQID");
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let key = resolve_api_key(Some("sk-explicit")).unwrap();
        assert_eq!(key, "sk-explicit");
    }
}
