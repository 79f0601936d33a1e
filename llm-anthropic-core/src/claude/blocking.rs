//! Blocking request execution
//!
//! Same contract as the async flavor: one request, a finite forward-only
//! sequence of text fragments, one stored final response. The only
//! difference is that issuance and iteration block the calling thread.
//! `eventsource-stream` is async-only, so the blocking path carries its own
//! line-level reader for the same data-field subset of the SSE format.

use crate::claude::client::handle_error_response;
use crate::claude::streaming::{MessageAccumulator, StreamEvent};
use crate::claude::transcribe::build_request;
use crate::claude::types::MessagesResponse;
use crate::claude::ClaudeModel;
use crate::error::{AdapterError, AdapterResult};
use crate::host::{Conversation, Prompt, ResponseRecord};
use std::io::{BufRead, BufReader, Read};

impl ClaudeModel {
    /// Execute a non-streaming request, blocking the calling thread
    pub fn execute_blocking(
        &self,
        prompt: &Prompt,
        record: &mut ResponseRecord,
        conversation: Option<&Conversation>,
    ) -> AdapterResult<String> {
        let request = build_request(prompt, conversation, self, false)?;
        tracing::debug!(model = self.wire_model_id(), "issuing blocking messages request");

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(self.messages_endpoint())
            .headers(self.request_headers()?)
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_error_response(status, body));
        }

        let raw: serde_json::Value = response.json()?;
        let message: MessagesResponse = serde_json::from_value(raw.clone())?;
        let text = message
            .first_text()
            .ok_or_else(|| AdapterError::Parse("response contained no text block".to_string()))?
            .to_string();
        record.response_json = Some(raw);
        Ok(text)
    }

    /// Open a streaming session, blocking the calling thread while iterating
    pub fn execute_stream_blocking(
        &self,
        prompt: &Prompt,
        conversation: Option<&Conversation>,
    ) -> AdapterResult<BlockingMessageStream> {
        let request = build_request(prompt, conversation, self, true)?;
        tracing::debug!(model = self.wire_model_id(), "opening blocking messages stream");

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(self.messages_endpoint())
            .headers(self.request_headers()?)
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_error_response(status, body));
        }

        Ok(BlockingMessageStream::new(response))
    }
}

/// Line-level Server-Sent Events reader
///
/// Yields one joined `data` payload per event. Event-name and comment lines
/// are skipped: the payload's own `type` field carries the dispatch.
pub struct SseReader<R> {
    reader: R,
}

impl<R: BufRead> SseReader<R> {
    /// Wrap a buffered reader positioned at the start of the event stream
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for SseReader<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut data: Vec<String> = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    return if data.is_empty() {
                        None
                    } else {
                        Some(Ok(data.join("\n")))
                    };
                }
                Ok(_) => {
                    let trimmed = line.trim_end_matches(|c| c == '\r' || c == '\n');
                    if trimmed.is_empty() {
                        if !data.is_empty() {
                            return Some(Ok(data.join("\n")));
                        }
                    } else if let Some(rest) = trimmed.strip_prefix("data:") {
                        data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Blocking counterpart of [`crate::claude::MessageStream`]
///
/// An iterator over text fragments; the composed final response becomes
/// available after normal completion. Dropping the iterator drops the
/// underlying response, releasing the session.
pub struct BlockingMessageStream<R: Read = reqwest::blocking::Response> {
    events: SseReader<BufReader<R>>,
    accumulator: MessageAccumulator,
    done: bool,
}

impl<R: Read> BlockingMessageStream<R> {
    /// Wrap the body of a streaming Messages API response
    pub fn new(body: R) -> Self {
        Self {
            events: SseReader::new(BufReader::new(body)),
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

impl<R: Read> Iterator for BlockingMessageStream<R> {
    type Item = AdapterResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let data = match self.events.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(AdapterError::Network(format!("stream error: {}", err))));
                }
                Some(Ok(data)) => data,
            };

            let event = match serde_json::from_str::<StreamEvent>(&data) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!("skipping unparseable stream event: {}", err);
                    continue;
                }
            };
            let stop = matches!(event, StreamEvent::MessageStop);
            match self.accumulator.absorb(event) {
                Ok(Some(text)) => return Some(Ok(text)),
                Ok(None) => {
                    if stop {
                        self.done = true;
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRANSCRIPT: &str = concat!(
        "event: message_start\n",
        "data: {\"type\": \"message_start\", \"message\": {\"id\": \"msg_b\", ",
        "\"type\": \"message\", \"role\": \"assistant\", \"content\": [], ",
        "\"model\": \"claude-3-opus-20240229\", \"stop_reason\": null, ",
        "\"stop_sequence\": null, ",
        "\"usage\": {\"input_tokens\": 5, \"output_tokens\": 1}}}\n",
        "\n",
        "event: content_block_delta\n",
        "data: {\"type\": \"content_block_delta\", \"index\": 0, ",
        "\"delta\": {\"type\": \"text_delta\", \"text\": \"Hel\"}}\n",
        "\n",
        "event: content_block_delta\n",
        "data: {\"type\": \"content_block_delta\", \"index\": 0, ",
        "\"delta\": {\"type\": \"text_delta\", \"text\": \"lo\"}}\n",
        "\n",
        "event: message_delta\n",
        "data: {\"type\": \"message_delta\", \"delta\": {\"stop_reason\": \"end_turn\", ",
        "\"stop_sequence\": null}, \"usage\": {\"output_tokens\": 4}}\n",
        "\n",
        "event: message_stop\n",
        "data: {\"type\": \"message_stop\"}\n",
        "\n",
    );

    #[test]
    fn sse_reader_yields_data_payloads() {
        let input = "event: ping\ndata: {\"a\": 1}\n\ndata: {\"b\": 2}\n\n";
        let payloads: Vec<String> = SseReader::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(payloads, vec!["{\"a\": 1}", "{\"b\": 2}"]);
    }

    #[test]
    fn sse_reader_joins_multi_line_data() {
        let input = "data: line1\ndata: line2\n\n";
        let payloads: Vec<String> = SseReader::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(payloads, vec!["line1\nline2"]);
    }

    #[test]
    fn blocking_stream_yields_fragments_then_final_message() {
        let mut stream = BlockingMessageStream::new(Cursor::new(TRANSCRIPT));

        let fragments: Vec<String> = stream
            .by_ref()
            .collect::<AdapterResult<_>>()
            .unwrap();
        assert_eq!(fragments, vec!["Hel", "lo"]);

        let message = stream.final_message().unwrap();
        assert_eq!(message.first_text(), Some("Hello"));
        assert_eq!(message.usage.output_tokens, 4);

        let mut record = ResponseRecord::new();
        stream.record_into(&mut record).unwrap();
        assert_eq!(record.response_json.unwrap()["usage"]["output_tokens"], 4);
    }

    #[test]
    fn abandoned_stream_has_no_final_message() {
        let mut stream = BlockingMessageStream::new(Cursor::new(TRANSCRIPT));
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first, "Hel");
        drop(stream);
    }

    #[test]
    fn incomplete_stream_cannot_be_recorded() {
        let truncated = &TRANSCRIPT[..TRANSCRIPT.find("message_delta").unwrap()];
        let mut stream = BlockingMessageStream::new(Cursor::new(truncated));
        while stream.next().is_some() {}

        let mut record = ResponseRecord::new();
        let err = stream.record_into(&mut record).unwrap_err();
        assert!(matches!(err, AdapterError::IncompleteStream(_)));
    }
}
