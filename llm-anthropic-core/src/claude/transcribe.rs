//! Conversation-to-wire-message transcription and request assembly
//!
//! Maps the host's conversation model onto the Messages API schema: each
//! prior exchange becomes a user/assistant pair, the current prompt becomes
//! the final user message, attachments become typed blocks, and
//! caching-capable variants get ephemeral cache markers on a bounded number
//! of prior user-text blocks.

use crate::claude::types::{
    BlockSource, CacheControl, ContentBlock, MessageBody, MessagesRequest, RequestMetadata, Role,
    SystemPrompt, WireMessage,
};
use crate::claude::{ClaudeModel, ModelCapabilities};
use crate::error::{AdapterError, AdapterResult};
use crate::host::{Attachment, Conversation, Prompt};
use crate::options::ValidationError;

/// Cache markers available for prior turns. Two slots stay reserved for the
/// current prompt and the system prompt, which carry their own markers.
pub const CACHE_BLOCK_BUDGET: usize = 2;

/// Transcribe a conversation plus the current prompt into the ordered wire
/// message list
///
/// Produces 2N+1 messages for N prior exchanges, alternating user/assistant
/// and ending in a user message.
pub fn build_messages(
    prompt: &Prompt,
    conversation: Option<&Conversation>,
    model: &ClaudeModel,
) -> AdapterResult<Vec<WireMessage>> {
    let caps = model.capabilities();
    let mut messages = Vec::new();

    if let Some(conversation) = conversation {
        for exchange in &conversation.exchanges {
            messages.push(WireMessage::user(shape_content(
                &exchange.prompt,
                &exchange.attachments,
                caps,
            )?));
            messages.push(WireMessage::assistant(exchange.response.clone()));
        }
    }

    messages.push(WireMessage::user(shape_content(
        &prompt.prompt,
        &prompt.attachments,
        caps,
    )?));

    if caps.supports_cache {
        // History annotation runs unless caching was explicitly disabled;
        // the current prompt's own marker requires an explicit opt-in.
        if prompt.options.cache_prompt != Some(false) {
            annotate_history(&mut messages);
        }
        if prompt.options.cache_prompt == Some(true) {
            if let Some(current) = messages.last_mut() {
                mark_trailing_text(current);
            }
        }
    }

    Ok(messages)
}

/// Assemble the wire request payload
///
/// A pure merge of the transcribed messages with the validated options,
/// system prompt and wire model id; validation happened earlier.
pub fn build_request(
    prompt: &Prompt,
    conversation: Option<&Conversation>,
    model: &ClaudeModel,
    stream: bool,
) -> AdapterResult<MessagesRequest> {
    let messages = build_messages(prompt, conversation, model)?;
    let options = &prompt.options;

    // top_p wins when set and non-zero; otherwise the (possibly default)
    // temperature is emitted.
    let (temperature, top_p) = match options.top_p {
        Some(p) if p > 0.0 => (None, Some(p)),
        _ => (Some(options.temperature), None),
    };

    let cache_system =
        model.capabilities().supports_cache && options.cache_system == Some(true);
    let system = prompt.system.as_ref().map(|system| {
        if cache_system {
            SystemPrompt::Blocks(vec![ContentBlock::Text {
                text: system.clone(),
                cache_control: Some(CacheControl::ephemeral()),
            }])
        } else {
            SystemPrompt::Text(system.clone())
        }
    });

    Ok(MessagesRequest {
        model: model.wire_model_id().to_string(),
        messages,
        max_tokens: options.max_tokens,
        temperature,
        top_p,
        top_k: options.top_k,
        metadata: options
            .user_id
            .clone()
            .map(|user_id| RequestMetadata { user_id }),
        system,
        stream: stream.then_some(true),
    })
}

/// Shape one turn's content: typed blocks with a trailing text block when
/// attachments are present, a plain string otherwise
fn shape_content(
    text: &str,
    attachments: &[Attachment],
    caps: &ModelCapabilities,
) -> AdapterResult<MessageBody> {
    if attachments.is_empty() {
        return Ok(MessageBody::Text(text.to_string()));
    }

    let mut blocks = Vec::with_capacity(attachments.len() + 1);
    for attachment in attachments {
        blocks.push(attachment_block(attachment, caps)?);
    }
    blocks.push(ContentBlock::text(text));
    Ok(MessageBody::Blocks(blocks))
}

fn attachment_block(
    attachment: &Attachment,
    caps: &ModelCapabilities,
) -> AdapterResult<ContentBlock> {
    if !caps.accepts_media_type(attachment.media_type()) {
        return Err(AdapterError::Validation(ValidationError::invalid_value(
            "attachments",
            "a media type this model accepts",
            attachment.media_type(),
        )));
    }

    let source = BlockSource::base64(attachment.media_type(), attachment.base64_data());
    Ok(if attachment.is_document() {
        ContentBlock::Document { source }
    } else {
        ContentBlock::Image { source }
    })
}

/// Mark up to [`CACHE_BLOCK_BUDGET`] prior user-text blocks with the
/// ephemeral marker, oldest first
fn annotate_history(messages: &mut [WireMessage]) {
    let prior = messages.len().saturating_sub(1);
    let mut budget = CACHE_BLOCK_BUDGET;

    for message in &mut messages[..prior] {
        if budget == 0 {
            break;
        }
        if message.role != Role::User {
            continue;
        }
        mark_trailing_text(message);
        budget -= 1;
    }
}

/// Attach the ephemeral marker to a message's trailing text block,
/// promoting plain-string content to a one-element block list first
fn mark_trailing_text(message: &mut WireMessage) {
    if let MessageBody::Text(text) = &message.content {
        message.content = MessageBody::Blocks(vec![ContentBlock::text(text.clone())]);
    }
    if let MessageBody::Blocks(blocks) = &mut message.content {
        for block in blocks.iter_mut().rev() {
            if let ContentBlock::Text { cache_control, .. } = block {
                *cache_control = Some(CacheControl::ephemeral());
                break;
            }
        }
    }
}
