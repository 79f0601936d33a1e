//! Asynchronous request execution against the Messages API
//!
//! One plain HTTP call per request. Retries, backoff and timeouts are the
//! transport's business, not this layer's: provider failures propagate
//! unchanged as a fatal error for the current request.

use crate::claude::streaming::MessageStream;
use crate::claude::transcribe::build_request;
use crate::claude::types::{ApiErrorBody, MessagesResponse};
use crate::claude::ClaudeModel;
use crate::error::{AdapterError, AdapterResult};
use crate::host::{resolve_api_key, Conversation, Prompt, ResponseRecord};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

/// Messages API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

impl ClaudeModel {
    /// Execute a non-streaming request
    ///
    /// Stores the verbatim response JSON on the record and returns the
    /// first text block as the visible result.
    pub async fn execute(
        &self,
        prompt: &Prompt,
        record: &mut ResponseRecord,
        conversation: Option<&Conversation>,
    ) -> AdapterResult<String> {
        let request = build_request(prompt, conversation, self, false)?;
        tracing::debug!(model = self.wire_model_id(), "issuing messages request");

        let response = self
            .http_client()
            .post(self.messages_endpoint())
            .headers(self.request_headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_error_response(status, body));
        }

        let raw: serde_json::Value = response.json().await?;
        let message: MessagesResponse = serde_json::from_value(raw.clone())?;
        let text = message
            .first_text()
            .ok_or_else(|| AdapterError::Parse("response contained no text block".to_string()))?
            .to_string();
        record.response_json = Some(raw);
        Ok(text)
    }

    /// Open a streaming session
    ///
    /// The returned [`MessageStream`] yields text fragments as they arrive;
    /// dropping it releases the session.
    pub async fn execute_stream(
        &self,
        prompt: &Prompt,
        conversation: Option<&Conversation>,
    ) -> AdapterResult<MessageStream> {
        let request = build_request(prompt, conversation, self, true)?;
        tracing::debug!(model = self.wire_model_id(), "opening messages stream");

        let response = self
            .http_client()
            .post(self.messages_endpoint())
            .headers(self.request_headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_error_response(status, body));
        }

        Ok(MessageStream::new(response.bytes_stream()))
    }

    pub(crate) fn messages_endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url().trim_end_matches('/'))
    }

    pub(crate) fn request_headers(&self) -> AdapterResult<HeaderMap> {
        let api_key = resolve_api_key(self.api_key())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| AdapterError::InvalidRequest(format!("invalid API key: {}", e)))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        for (name, value) in self.extra_headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AdapterError::InvalidRequest(format!("invalid header name '{}': {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                AdapterError::InvalidRequest(format!("invalid header value for '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

/// Map a provider error type to the adapter taxonomy
pub(crate) fn provider_error(
    error_type: &str,
    message: String,
    status: Option<StatusCode>,
) -> AdapterError {
    match error_type {
        "authentication_error" | "permission_error" => AdapterError::Authentication(message),
        "rate_limit_error" => AdapterError::RateLimit(message),
        "invalid_request_error" => AdapterError::InvalidRequest(message),
        "not_found_error" => AdapterError::ModelNotFound(message),
        "overloaded_error" | "api_error" => AdapterError::ServiceUnavailable(message),
        _ => AdapterError::Provider {
            code: status
                .map(|s| s.to_string())
                .unwrap_or_else(|| error_type.to_string()),
            message,
        },
    }
}

/// Turn a non-success HTTP response into a typed error
pub(crate) fn handle_error_response(status: StatusCode, body: String) -> AdapterError {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
        return provider_error(&parsed.error.error_type, parsed.error.message, Some(status));
    }

    // Fallback to status code-based mapping
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::Authentication(body),
        StatusCode::TOO_MANY_REQUESTS => AdapterError::RateLimit(body),
        StatusCode::BAD_REQUEST => AdapterError::InvalidRequest(body),
        StatusCode::NOT_FOUND => AdapterError::ModelNotFound(body),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => AdapterError::ServiceUnavailable(body),
        _ => AdapterError::Provider {
            code: status.to_string(),
            message: body,
        },
    }
}
