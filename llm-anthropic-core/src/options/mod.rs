//! Sampling options and their validation
//!
//! Options are validated eagerly, at configuration time, so that invalid
//! values are reported synchronously to the caller and never surface
//! mid-stream. The output-token ceiling is not a property of the options
//! themselves: each model variant supplies its own when validating.

mod error;

pub use error::{ValidationError, ValidationErrorKind};

use serde::Deserialize;

/// Output-token ceiling for standard model variants
pub const STANDARD_MAX_TOKENS: u32 = 4096;

/// Output-token ceiling for long-output model variants
pub const LONG_OUTPUT_MAX_TOKENS: u32 = 8192;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Validated sampling configuration for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Maximum number of tokens to generate before stopping
    pub max_tokens: u32,

    /// Amount of randomness injected into the response (0.0 to 1.0)
    pub temperature: f32,

    /// Nucleus sampling cutoff; mutually exclusive with a non-default
    /// temperature
    pub top_p: Option<f32>,

    /// Only sample from the top K options for each subsequent token
    pub top_k: Option<u32>,

    /// External identifier for the user associated with the request
    pub user_id: Option<String>,

    /// Whether to annotate prior conversation turns for prompt caching
    /// (caching-capable variants only)
    pub cache_prompt: Option<bool>,

    /// Whether to annotate the system prompt for prompt caching
    /// (caching-capable variants only)
    pub cache_system: Option<bool>,
}

impl Options {
    /// Default options for a model variant with the given ceiling
    pub fn default_for(ceiling: u32) -> Self {
        Self {
            max_tokens: ceiling,
            temperature: DEFAULT_TEMPERATURE,
            top_p: None,
            top_k: None,
            user_id: None,
            cache_prompt: None,
            cache_system: None,
        }
    }

    /// Start building options from raw field values
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }
}

/// Raw, unvalidated option values
///
/// All fields are optional so the builder can be deserialized straight from
/// whatever the host hands over. `build` runs the full validation pass.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsBuilder {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub user_id: Option<String>,
    pub cache_prompt: Option<bool>,
    pub cache_system: Option<bool>,
}

impl OptionsBuilder {
    /// Set the maximum number of output tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the nucleus sampling cutoff
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the top-k sampling limit
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the external user identifier
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Enable or disable prompt caching for prior turns
    pub fn cache_prompt(mut self, cache_prompt: bool) -> Self {
        self.cache_prompt = Some(cache_prompt);
        self
    }

    /// Enable or disable system prompt caching
    pub fn cache_system(mut self, cache_system: bool) -> Self {
        self.cache_system = Some(cache_system);
        self
    }

    /// Validate the raw values against a model variant's ceiling
    pub fn build(self, ceiling: u32) -> Result<Options, ValidationError> {
        let max_tokens = self.max_tokens.unwrap_or(ceiling);
        if max_tokens == 0 || max_tokens > ceiling {
            return Err(ValidationError::out_of_range(
                "max_tokens",
                format!("must be in 1..={}, got {}", ceiling, max_tokens),
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ValidationError::out_of_range(
                    "temperature",
                    format!("must be in 0.0..=1.0, got {}", temperature),
                ));
            }
        }

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ValidationError::out_of_range(
                    "top_p",
                    format!("must be in 0.0..=1.0, got {}", top_p),
                ));
            }
        }

        if let Some(top_k) = self.top_k {
            if top_k == 0 {
                return Err(ValidationError::invalid_value(
                    "top_k",
                    "a positive integer",
                    "0",
                ));
            }
        }

        // temperature and top_p are competing sampling strategies: a
        // non-default temperature together with top_p is rejected here
        // rather than left for the provider to arbitrate.
        if let Some(temperature) = self.temperature {
            if temperature != DEFAULT_TEMPERATURE && self.top_p.is_some() {
                return Err(ValidationError::incompatible(
                    "temperature",
                    "temperature and top_p cannot both be set",
                ));
            }
        }

        Ok(Options {
            max_tokens,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: self.top_p,
            top_k: self.top_k,
            user_id: self.user_id,
            cache_prompt: self.cache_prompt,
            cache_system: self.cache_system,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1; "lower bound")]
    #[test_case(2048; "midrange")]
    #[test_case(4096; "at ceiling")]
    fn max_tokens_within_ceiling_is_accepted(value: u32) {
        let options = Options::builder()
            .max_tokens(value)
            .build(STANDARD_MAX_TOKENS)
            .unwrap();
        assert_eq!(options.max_tokens, value);
    }

    #[test_case(0; "zero")]
    #[test_case(4097; "just above ceiling")]
    #[test_case(100_000; "far above ceiling")]
    fn max_tokens_outside_ceiling_is_rejected(value: u32) {
        let err = Options::builder()
            .max_tokens(value)
            .build(STANDARD_MAX_TOKENS)
            .unwrap_err();
        assert_eq!(err.field, "max_tokens");
    }

    #[test]
    fn long_output_ceiling_admits_larger_values() {
        assert!(Options::builder()
            .max_tokens(8192)
            .build(STANDARD_MAX_TOKENS)
            .is_err());
        assert!(Options::builder()
            .max_tokens(8192)
            .build(LONG_OUTPUT_MAX_TOKENS)
            .is_ok());
    }

    #[test]
    fn max_tokens_defaults_to_ceiling() {
        let options = Options::builder().build(LONG_OUTPUT_MAX_TOKENS).unwrap();
        assert_eq!(options.max_tokens, LONG_OUTPUT_MAX_TOKENS);
    }

    #[test_case(-0.1)]
    #[test_case(1.5)]
    fn temperature_out_of_range_is_rejected(value: f32) {
        let err = Options::builder()
            .temperature(value)
            .build(STANDARD_MAX_TOKENS)
            .unwrap_err();
        assert_eq!(err.field, "temperature");
    }

    #[test]
    fn top_k_must_be_positive() {
        let err = Options::builder()
            .top_k(0)
            .build(STANDARD_MAX_TOKENS)
            .unwrap_err();
        assert_eq!(err.field, "top_k");

        assert!(Options::builder()
            .top_k(40)
            .build(STANDARD_MAX_TOKENS)
            .is_ok());
    }

    #[test]
    fn non_default_temperature_with_top_p_is_rejected() {
        let err = Options::builder()
            .temperature(0.5)
            .top_p(0.9)
            .build(STANDARD_MAX_TOKENS)
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ValidationErrorKind::Incompatible { .. }
        ));
    }

    #[test]
    fn default_temperature_with_top_p_is_accepted() {
        let options = Options::builder()
            .temperature(1.0)
            .top_p(0.9)
            .build(STANDARD_MAX_TOKENS)
            .unwrap();
        assert_eq!(options.top_p, Some(0.9));
    }

    #[test]
    fn either_strategy_alone_is_accepted() {
        assert!(Options::builder()
            .temperature(0.2)
            .build(STANDARD_MAX_TOKENS)
            .is_ok());
        assert!(Options::builder()
            .top_p(0.95)
            .build(STANDARD_MAX_TOKENS)
            .is_ok());
    }

    #[test]
    fn builder_deserializes_from_raw_json() {
        let builder: OptionsBuilder =
            serde_json::from_str(r#"{"max_tokens": 100, "user_id": "u-1"}"#).unwrap();
        let options = builder.build(STANDARD_MAX_TOKENS).unwrap();
        assert_eq!(options.max_tokens, 100);
        assert_eq!(options.user_id.as_deref(), Some("u-1"));
    }
}
