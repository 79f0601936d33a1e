//! Transcription and assembly scenarios, asserted at the wire-JSON level

use llm_anthropic_core::claude::transcribe::{build_messages, build_request};
use llm_anthropic_core::claude::{register_models, ClaudeModel};
use llm_anthropic_core::host::{Attachment, Conversation, Exchange, ModelRegistry, Prompt};
use llm_anthropic_core::options::Options;
use serde_json::json;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

fn model(id: &str) -> std::sync::Arc<ClaudeModel> {
    let mut registry = ModelRegistry::new();
    register_models(&mut registry);
    registry.get_model(id).unwrap()
}

#[test]
fn empty_conversation_pelican_prompt_is_a_single_plain_message() {
    let model = model("claude-3-opus");
    let prompt = Prompt::new(
        "Two names for a pet pelican, be brief",
        model.default_options(),
    );

    let messages = build_messages(&prompt, None, &model).unwrap();
    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        json!([{
            "role": "user",
            "content": "Two names for a pet pelican, be brief"
        }])
    );
}

#[test]
fn png_attachment_prompt_matches_wire_shape() {
    let model = model("claude-3-opus");
    let attachment = Attachment::from_bytes(PNG_BYTES.to_vec()).unwrap();
    let b64 = attachment.base64_data();
    let prompt = Prompt::new("What is this?", model.default_options()).with_attachment(attachment);

    let messages = build_messages(&prompt, None, &model).unwrap();
    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        json!([{
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": {"type": "base64", "media_type": "image/png", "data": b64}
                },
                {"type": "text", "text": "What is this?"}
            ]
        }])
    );
}

#[test]
fn prior_exchanges_expand_to_alternating_pairs() {
    let model = model("claude-3-opus");
    let mut conversation = Conversation::new();
    conversation.push(Exchange::new("first question", "first answer"));
    conversation.push(Exchange::new("second question", "second answer"));

    let prompt = Prompt::new("third question", model.default_options());
    let messages = build_messages(&prompt, Some(&conversation), &model).unwrap();

    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        json!([
            {"role": "user", "content": "first question"},
            {"role": "assistant", "content": "first answer"},
            {"role": "user", "content": "second question"},
            {"role": "assistant", "content": "second answer"},
            {"role": "user", "content": "third question"}
        ])
    );
}

#[test]
fn caching_variant_marks_two_oldest_prior_user_turns() {
    let model = model("claude-3.5-sonnet");
    let mut conversation = Conversation::new();
    for i in 1..=3 {
        conversation.push(Exchange::new(format!("q{}", i), format!("a{}", i)));
    }

    let prompt = Prompt::new("q4", model.default_options());
    let messages = build_messages(&prompt, Some(&conversation), &model).unwrap();

    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        json!([
            {"role": "user", "content": [
                {"type": "text", "text": "q1", "cache_control": {"type": "ephemeral"}}
            ]},
            {"role": "assistant", "content": "a1"},
            {"role": "user", "content": [
                {"type": "text", "text": "q2", "cache_control": {"type": "ephemeral"}}
            ]},
            {"role": "assistant", "content": "a2"},
            {"role": "user", "content": "q3"},
            {"role": "assistant", "content": "a3"},
            {"role": "user", "content": "q4"}
        ])
    );
}

#[test]
fn assembled_request_matches_outbound_schema() {
    let model = model("claude-3-opus");
    let options = model
        .validate_options(
            Options::builder()
                .max_tokens(256)
                .top_k(40)
                .user_id("user-7"),
        )
        .unwrap();
    let prompt = Prompt::new("hello", options).with_system("You are terse.");

    let request = build_request(&prompt, None, &model, false).unwrap();
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "model": "claude-3-opus-20240229",
            "messages": [{"role": "user", "content": "hello"}],
            "max_tokens": 256,
            "temperature": 1.0,
            "top_k": 40,
            "metadata": {"user_id": "user-7"},
            "system": "You are terse."
        })
    );
}

#[test]
fn pdf_goes_through_the_document_path_on_capable_variants() {
    let model = model("claude-3.5-sonnet");
    let attachment = Attachment::new("application/pdf", b"%PDF-1.7".to_vec()).unwrap();
    let b64 = attachment.base64_data();
    let prompt = Prompt::new("summarize", model.default_options()).with_attachment(attachment);

    let messages = build_messages(&prompt, None, &model).unwrap();
    let value = serde_json::to_value(&messages).unwrap();
    assert_eq!(value[0]["content"][0]["type"], "document");
    assert_eq!(
        value[0]["content"][0]["source"],
        json!({"type": "base64", "media_type": "application/pdf", "data": b64})
    );

    // Standard variants accept images but reject documents
    let standard = model_without_pdf();
    let attachment = Attachment::new("application/pdf", b"%PDF-1.7".to_vec()).unwrap();
    let prompt =
        Prompt::new("summarize", standard.default_options()).with_attachment(attachment);
    assert!(build_messages(&prompt, None, &standard).is_err());
}

fn model_without_pdf() -> std::sync::Arc<ClaudeModel> {
    model("claude-3-haiku")
}
