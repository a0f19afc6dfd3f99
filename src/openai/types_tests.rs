//! Unit tests for the chat and transcription wire types.

use super::*;
use serde_json::json;

#[test]
fn test_message_constructors() {
    let msg = ChatMessage::system("You coach sales reps");
    assert_eq!(msg.role, ChatRole::System);
    assert_eq!(msg.content, "You coach sales reps");

    let msg = ChatMessage::user("Analyze this call");
    assert_eq!(msg.role, ChatRole::User);
}

#[test]
fn test_role_serializes_lowercase() {
    let value = serde_json::to_value(ChatMessage::user("hi")).unwrap();
    assert_eq!(value, json!({"role": "user", "content": "hi"}));
}

#[test]
fn test_chat_request_serialization() {
    let req = ChatCompletionRequest::new("gpt-4-turbo", "prompt text");
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(
        value,
        json!({
            "model": "gpt-4-turbo",
            "messages": [{"role": "user", "content": "prompt text"}]
        })
    );
}

#[test]
fn test_chat_request_with_system_and_temperature() {
    let req = ChatCompletionRequest::new("m", "user text")
        .with_system("system text")
        .with_temperature(0.2);
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0].role, ChatRole::System);
    assert_eq!(req.messages[1].content, "user text");
    assert_eq!(req.temperature, Some(0.2));
}

#[test]
fn test_chat_response_first_content() {
    let body = json!({
        "id": "chatcmpl-1",
        "model": "gpt-4-turbo",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "Warmer: 7/10"}, "finish_reason": "stop"}
        ],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    });
    let resp: ChatCompletionResponse = serde_json::from_value(body).unwrap();
    assert_eq!(resp.first_content(), Some("Warmer: 7/10"));
    assert_eq!(resp.usage.unwrap().total_tokens, Some(15));
}

#[test]
fn test_chat_response_without_choices() {
    let resp: ChatCompletionResponse = serde_json::from_value(json!({"id": "x"})).unwrap();
    assert!(resp.choices.is_empty());
    assert_eq!(resp.first_content(), None);
}

#[test]
fn test_transcription_response() {
    let resp: TranscriptionResponse =
        serde_json::from_value(json!({"text": "Olá, tudo bem?"})).unwrap();
    assert_eq!(resp.text, "Olá, tudo bem?");
}

#[test]
fn test_error_message_prefers_envelope() {
    let body = r#"{"error": {"message": "Invalid file format.", "type": "invalid_request_error", "code": null}}"#;
    assert_eq!(error_message(body), "Invalid file format.");
    assert_eq!(error_message("  upstream down  "), "upstream down");
}
