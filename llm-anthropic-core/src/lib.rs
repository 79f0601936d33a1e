//! Anthropic Messages adapter for LLM plugin hosts
//!
//! This crate is the translation layer between a host "LLM plugin"
//! conversation model and the Anthropic Messages API: it registers a family
//! of Claude model adapters, transcribes a conversation plus current prompt
//! into the provider's wire format (including attachment blocks and prompt
//! cache markers), executes the request (blocking or async, streamed or
//! not), and stores the provider's verbatim response on the host's record.
//!
//! ```no_run
//! use llm_anthropic_core::claude::register_models;
//! use llm_anthropic_core::host::{ModelRegistry, Prompt, ResponseRecord};
//!
//! # async fn run() -> Result<(), llm_anthropic_core::AdapterError> {
//! let mut registry = ModelRegistry::new();
//! register_models(&mut registry);
//!
//! let model = registry.get_model("claude-3.5-sonnet").unwrap();
//! let prompt = Prompt::new("Two names for a pet pelican, be brief", model.default_options());
//! let mut record = ResponseRecord::new();
//! let text = model.execute(&prompt, &mut record, None).await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

pub mod claude;
pub mod error;
pub mod host;
pub mod options;

pub use claude::{ClaudeModel, MessageStream, ModelCapabilities};
pub use error::{AdapterError, AdapterResult};
pub use host::{Attachment, Conversation, Exchange, ModelRegistry, Prompt, ResponseRecord};
pub use options::{Options, OptionsBuilder, ValidationError};

/// Returns the version of the adapter library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
