//! Messages API wire types
//!
//! These types match the Anthropic Messages API format and are used for
//! serialization/deserialization when communicating with the provider.

use serde::{Deserialize, Serialize};

/// Role of a wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Cache type for content-block annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Ephemeral,
}

/// Annotation requesting the provider cache a content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub cache_type: CacheType,
}

impl CacheControl {
    /// The ephemeral cache marker
    pub const fn ephemeral() -> Self {
        Self {
            cache_type: CacheType::Ephemeral,
        }
    }
}

/// Base64 source for image and document blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSource {
    #[serde(rename = "type")]
    pub source_type: String,

    pub media_type: String,

    pub data: String,
}

impl BlockSource {
    /// Create a base64 source
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Typed content block within a wire message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,

        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    Image {
        source: BlockSource,
    },
    Document {
        source: BlockSource,
    },
}

impl ContentBlock {
    /// Create a plain text block
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            cache_control: None,
        }
    }
}

/// Message content: a plain string, or an ordered list of typed blocks
///
/// A plain string is only used when there is nothing else to attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One role-tagged message in the wire request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: MessageBody,
}

impl WireMessage {
    /// Create a user message
    pub fn user(content: MessageBody) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// Create an assistant message with plain text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageBody::Text(text.into()),
        }
    }
}

/// System prompt: a plain string, or a one-element block list when it
/// carries a cache marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Request metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub user_id: String,
}

/// Messages API request payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,

    pub messages: Vec<WireMessage>,

    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Content block in a Messages API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContent {
    Text { text: String },
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,

    #[serde(default)]
    pub output_tokens: u32,
}

/// Complete Messages API response
///
/// `stop_reason` and `stop_sequence` serialize as explicit nulls when
/// absent: the record stores the response verbatim, nulls included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,

    #[serde(rename = "type")]
    pub response_type: String,

    pub role: String,

    pub content: Vec<ResponseContent>,

    pub model: String,

    pub stop_reason: Option<String>,

    pub stop_sequence: Option<String>,

    pub usage: Usage,
}

impl MessagesResponse {
    /// The first text block of the response, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().map(|block| match block {
            ResponseContent::Text { text } => text.as_str(),
        }).next()
    }
}

/// Provider error body: `{"type": "error", "error": {"type", "message"}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

/// Provider error detail
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,

    pub message: String,
}
