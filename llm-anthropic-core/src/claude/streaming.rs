//! Streaming support for Messages API responses
//!
//! The provider streams Server-Sent Events (`message_start`,
//! `content_block_delta`, `message_delta`, `message_stop`, ...). The stream
//! exposed to the host yields only the text fragments; alongside, a
//! [`MessageAccumulator`] composes the final aggregated response so that the
//! host can store it verbatim after normal completion. Dropping the stream
//! drops the underlying HTTP response, releasing the network session.

use crate::claude::client::provider_error;
use crate::claude::types::{ApiErrorDetail, MessagesResponse, ResponseContent};
use crate::error::{AdapterError, AdapterResult};
use crate::host::ResponseRecord;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};

/// One Server-Sent Event from the Messages API
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessagesResponse,
    },
    ContentBlockStart {
        index: usize,
        content_block: serde_json::Value,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaFields,
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiErrorDetail,
    },
}

/// Delta within one content block
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
}

/// Top-level message fields updated near the end of the stream
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaFields {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

/// Usage counters carried on a `message_delta` event
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeltaUsage {
    pub output_tokens: u32,
}

/// Composes the final aggregated response from the event sequence
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    message: Option<MessagesResponse>,
    text: String,
    complete: bool,
}

impl MessageAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one event, returning the text fragment it carried, if any
    pub fn absorb(&mut self, event: StreamEvent) -> AdapterResult<Option<String>> {
        match event {
            StreamEvent::MessageStart { message } => {
                self.message = Some(message);
                Ok(None)
            }
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            } => {
                self.text.push_str(&text);
                Ok(Some(text))
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(message) = &mut self.message {
                    if delta.stop_reason.is_some() {
                        message.stop_reason = delta.stop_reason;
                    }
                    if delta.stop_sequence.is_some() {
                        message.stop_sequence = delta.stop_sequence;
                    }
                    if let Some(usage) = usage {
                        message.usage.output_tokens = usage.output_tokens;
                    }
                }
                Ok(None)
            }
            StreamEvent::MessageStop => {
                if let Some(message) = &mut self.message {
                    message.content = vec![ResponseContent::Text {
                        text: std::mem::take(&mut self.text),
                    }];
                }
                self.complete = true;
                Ok(None)
            }
            StreamEvent::Error { error } => {
                Err(provider_error(&error.error_type, error.message, None))
            }
            StreamEvent::ContentBlockStart { .. }
            | StreamEvent::ContentBlockStop { .. }
            | StreamEvent::Ping => Ok(None),
        }
    }

    /// The composed response, available only after `message_stop`
    pub fn final_message(&self) -> Option<&MessagesResponse> {
        if self.complete {
            self.message.as_ref()
        } else {
            None
        }
    }
}

type EventItem = Result<eventsource_stream::Event, eventsource_stream::EventStreamError<reqwest::Error>>;

/// A finite, forward-only, non-restartable stream of text fragments
///
/// Implements `Stream<Item = Result<String>>`. The final aggregated
/// response becomes available through [`MessageStream::final_message`] once
/// the stream has been consumed to completion; abandoning the stream early
/// simply drops the session.
pub struct MessageStream {
    inner: Pin<Box<dyn Stream<Item = EventItem> + Send>>,
    accumulator: MessageAccumulator,
    done: bool,
}

impl MessageStream {
    /// Wrap the raw byte stream of a streaming Messages API response
    pub fn new(
        bytes: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(bytes.eventsource()),
            accumulator: MessageAccumulator::new(),
            done: false,
        }
    }

    /// The composed final response, if the stream completed normally
    pub fn final_message(&self) -> Option<&MessagesResponse> {
        self.accumulator.final_message()
    }

    /// Store the composed final response verbatim on the host's record
    pub fn record_into(&self, record: &mut ResponseRecord) -> AdapterResult<()> {
        let message = self.accumulator.final_message().ok_or_else(|| {
            AdapterError::IncompleteStream(
                "stream did not complete; no final message to record".to_string(),
            )
        })?;
        record.response_json = Some(serde_json::to_value(message)?);
        Ok(())
    }
}

impl Stream for MessageStream {
    type Item = AdapterResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }
            match this.inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(AdapterError::Network(format!(
                        "stream error: {}",
                        err
                    )))));
                }
                Poll::Ready(Some(Ok(event))) => {
                    let parsed = match serde_json::from_str::<StreamEvent>(&event.data) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            // Unknown event kinds are skipped, not fatal
                            tracing::warn!("skipping unparseable stream event: {}", err);
                            continue;
                        }
                    };
                    let stop = matches!(parsed, StreamEvent::MessageStop);
                    match this.accumulator.absorb(parsed) {
                        Ok(Some(text)) => return Poll::Ready(Some(Ok(text))),
                        Ok(None) => {
                            if stop {
                                this.done = true;
                                return Poll::Ready(None);
                            }
                        }
                        Err(err) => {
                            this.done = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                }
            }
        }
    }
}
