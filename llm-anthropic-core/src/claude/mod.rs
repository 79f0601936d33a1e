//! Anthropic Messages adapter
//!
//! One [`ClaudeModel`] is constructed per registered model id. Variants
//! differ only in configuration: capability flags, output-token ceiling and
//! unlock headers. Each instance is stateless across requests; everything a
//! request mutates is built fresh inside the execution call.

pub mod blocking;
pub mod client;
pub mod streaming;
pub mod transcribe;
pub mod types;

pub use streaming::MessageStream;
pub use types::{MessagesRequest, MessagesResponse, WireMessage};

use crate::host::{ModelRegistry, IMAGE_MEDIA_TYPES, PDF_MEDIA_TYPE};
use crate::options::{
    Options, OptionsBuilder, ValidationError, LONG_OUTPUT_MAX_TOKENS, STANDARD_MAX_TOKENS,
};
use reqwest::Client;
use std::collections::HashMap;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Beta header unlocking PDF document support
const PDF_BETA: &str = "pdfs-2024-09-25";

/// Beta header unlocking prompt caching
const CACHE_BETA: &str = "prompt-caching-2024-07-31";

/// Beta header unlocking the 8192-token output ceiling
const LONG_OUTPUT_BETA: &str = "max-tokens-3-5-sonnet-2024-07-15";

/// Per-variant capability flags
///
/// Plain data, not a type hierarchy: image support, document support and the
/// output ceiling vary independently across the model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Does the variant accept image attachments?
    pub supports_images: bool,

    /// Does the variant accept PDF document attachments?
    pub supports_pdf: bool,

    /// Does the variant accept ephemeral cache markers?
    pub supports_cache: bool,

    /// Maximum permitted output-token count
    pub max_output_tokens: u32,
}

impl ModelCapabilities {
    /// Capabilities of the original Claude 3 generation
    pub fn standard() -> Self {
        Self {
            supports_images: true,
            supports_pdf: false,
            supports_cache: false,
            max_output_tokens: STANDARD_MAX_TOKENS,
        }
    }

    /// Capabilities of the Claude 3.5 generation
    pub fn caching() -> Self {
        Self {
            supports_cache: true,
            ..Self::standard()
        }
    }

    /// Whether an attachment with this media type is accepted
    pub fn accepts_media_type(&self, media_type: &str) -> bool {
        if media_type == PDF_MEDIA_TYPE {
            self.supports_pdf
        } else {
            self.supports_images && IMAGE_MEDIA_TYPES.contains(&media_type)
        }
    }
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self::standard()
    }
}

/// A registered model adapter
///
/// Identity, capability flags and transport headers are fixed at
/// registration time. The held HTTP client is shared across requests; all
/// per-request state lives in the execution call's scope.
pub struct ClaudeModel {
    model_id: String,
    claude_model_id: Option<String>,
    capabilities: ModelCapabilities,
    extra_headers: HashMap<String, String>,
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl ClaudeModel {
    /// Create an adapter for a model id with standard capabilities
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            claude_model_id: None,
            capabilities: ModelCapabilities::standard(),
            extra_headers: HashMap::new(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Use a wire model id distinct from the registered id
    pub fn with_claude_model_id(mut self, claude_model_id: impl Into<String>) -> Self {
        self.claude_model_id = Some(claude_model_id.into());
        self
    }

    /// Replace the capability record
    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Add an extra transport header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Provide an explicit API key, bypassing the environment lookup
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The registered model id
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The model id sent on the wire
    pub fn wire_model_id(&self) -> &str {
        self.claude_model_id.as_deref().unwrap_or(&self.model_id)
    }

    /// The variant's capability record
    pub fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    /// Extra transport headers for this variant
    pub fn extra_headers(&self) -> &HashMap<String, String> {
        &self.extra_headers
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Validate raw option values against this variant's ceiling
    ///
    /// Runs eagerly, before any network call, so failures are reported
    /// synchronously and never mid-stream.
    pub fn validate_options(&self, builder: OptionsBuilder) -> Result<Options, ValidationError> {
        builder.build(self.capabilities.max_output_tokens)
    }

    /// Default options for this variant
    pub fn default_options(&self) -> Options {
        Options::default_for(self.capabilities.max_output_tokens)
    }
}

impl std::fmt::Display for ClaudeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Anthropic Messages: {}", self.model_id)
    }
}

/// Register the Claude model family with the host registry
pub fn register_models(registry: &mut ModelRegistry) {
    registry.register(
        ClaudeModel::new("claude-3-opus-20240229"),
        &["claude-3-opus"],
    );
    registry.register(
        ClaudeModel::new("claude-3-sonnet-20240229"),
        &["claude-3-sonnet"],
    );
    registry.register(
        ClaudeModel::new("claude-3-haiku-20240307"),
        &["claude-3-haiku"],
    );

    let sonnet_35 = ModelCapabilities {
        supports_pdf: true,
        ..ModelCapabilities::caching()
    };
    registry.register(
        ClaudeModel::new("claude-3-5-sonnet-20241022")
            .with_capabilities(sonnet_35)
            .with_header("anthropic-beta", format!("{},{}", PDF_BETA, CACHE_BETA)),
        &["claude-3.5-sonnet", "claude-3.5-sonnet-latest"],
    );
    registry.register(
        ClaudeModel::new("claude-3.5-sonnet-long")
            .with_claude_model_id("claude-3-5-sonnet-20241022")
            .with_capabilities(ModelCapabilities {
                supports_pdf: true,
                max_output_tokens: LONG_OUTPUT_MAX_TOKENS,
                ..ModelCapabilities::caching()
            })
            .with_header(
                "anthropic-beta",
                format!("{},{},{}", PDF_BETA, CACHE_BETA, LONG_OUTPUT_BETA),
            ),
        &[],
    );
    registry.register(
        ClaudeModel::new("claude-3-5-haiku-20241022")
            .with_capabilities(ModelCapabilities::caching())
            .with_header("anthropic-beta", CACHE_BETA),
        &["claude-3.5-haiku"],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_aliases() {
        let mut registry = ModelRegistry::new();
        register_models(&mut registry);

        let by_alias = registry.get_model("claude-3-opus").unwrap();
        assert_eq!(by_alias.model_id(), "claude-3-opus-20240229");
        assert!(registry.get_model("claude-4").is_none());
    }

    #[test]
    fn long_output_variant_shares_wire_id_with_larger_ceiling() {
        let mut registry = ModelRegistry::new();
        register_models(&mut registry);

        let long = registry.get_model("claude-3.5-sonnet-long").unwrap();
        assert_eq!(long.wire_model_id(), "claude-3-5-sonnet-20241022");
        assert_eq!(long.capabilities().max_output_tokens, 8192);

        let standard = registry.get_model("claude-3.5-sonnet").unwrap();
        assert_eq!(standard.capabilities().max_output_tokens, 4096);
    }

    #[test]
    fn capability_flags_are_independent() {
        let docs_only = ModelCapabilities {
            supports_images: false,
            supports_pdf: true,
            ..ModelCapabilities::standard()
        };
        assert!(docs_only.accepts_media_type("application/pdf"));
        assert!(!docs_only.accepts_media_type("image/png"));

        let images_only = ModelCapabilities::standard();
        assert!(images_only.accepts_media_type("image/png"));
        assert!(!images_only.accepts_media_type("application/pdf"));
    }

    #[test]
    fn ceiling_feeds_option_validation() {
        let model = ClaudeModel::new("claude-3-opus-20240229");
        assert!(model
            .validate_options(Options::builder().max_tokens(4096))
            .is_ok());
        assert!(model
            .validate_options(Options::builder().max_tokens(8192))
            .is_err());
    }
}
