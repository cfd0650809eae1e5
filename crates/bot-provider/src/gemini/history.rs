use bot_core::types::{ChatTurn, Role};
use serde_json::{json, Value};

/// Translate one conversation turn into a Gemini `contents[]` element
///:
/// - a turn carrying `raw_content` produced by this provider is replayed
///   verbatim (the caller is expected to have already dropped raw content
///   from a different provider via `ChatTurn::for_provider`),
/// - a turn with tool-calls becomes a single model-role element with an
///   optional text part followed by one `functionCall` part per call,
/// - a turn with tool-responses becomes a single function-role element
///   bundling every response from that turn,
/// - otherwise a plain text element (`model` for assistant, `user` for
///   user turns).
pub fn turn_to_content(turn: &ChatTurn) -> Value {
    if let Some(raw) = &turn.raw_content {
        if raw.provider_tag == "gemini" {
            return raw.payload.clone();
        }
    }

    if !turn.tool_calls.is_empty() {
        let mut parts: Vec<Value> = Vec::new();
        if !turn.text.is_empty() {
            parts.push(json!({ "text": turn.text }));
        }
        for call in &turn.tool_calls {
            parts.push(json!({
                "functionCall": {
                    "name": call.name,
                    "args": call.arguments,
                }
            }));
        }
        return json!({ "role": "model", "parts": parts });
    }

    if !turn.tool_responses.is_empty() {
        let parts: Vec<Value> = turn
            .tool_responses
            .iter()
            .map(|resp| {
                json!({
                    "functionResponse": {
                        "name": resp.name,
                        "response": { "output": resp.content },
                    }
                })
            })
            .collect();
        return json!({ "role": "function", "parts": parts });
    }

    let role = match turn.role {
        Role::Assistant => "model",
        _ => "user",
    };
    json!({ "role": role, "parts": [{ "text": turn.text }] })
}

/// Builds the first user-role element carrying per-request volatile
/// context (current time, pending tasks), kept separate from history so
/// the cacheable prefix (system prompt + history up to this point) stays
/// stable across requests.
pub fn dynamic_context_content(dynamic_context: &str) -> Option<Value> {
    if dynamic_context.trim().is_empty() {
        return None;
    }
    Some(json!({
        "role": "user",
        "parts": [{ "text": format!("[SYSTEM_CONTEXT/TODAY]\n{dynamic_context}") }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::types::{RawContent, ToolCall, ToolResponse};

    #[test]
    fn plain_user_turn_becomes_user_role() {
        let turn = ChatTurn::user("hello");
        let content = turn_to_content(&turn);
        assert_eq!(content["role"], "user");
        assert_eq!(content["parts"][0]["text"], "hello");
    }

    #[test]
    fn assistant_turn_becomes_model_role() {
        let turn = ChatTurn::assistant("hi there");
        let content = turn_to_content(&turn);
        assert_eq!(content["role"], "model");
    }

    #[test]
    fn tool_call_turn_bundles_function_calls() {
        let mut turn = ChatTurn::assistant("checking");
        turn.tool_calls.push(ToolCall {
            id: "1".into(),
            name: "lookup".into(),
            arguments: json!({"q": "weather"}),
        });
        let content = turn_to_content(&turn);
        assert_eq!(content["role"], "model");
        let parts = content["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["functionCall"]["name"], "lookup");
    }

    #[test]
    fn tool_response_turn_uses_function_role() {
        let mut turn = ChatTurn::user("");
        turn.tool_responses.push(ToolResponse {
            call_id: "1".into(),
            name: "lookup".into(),
            content: "sunny".into(),
            is_error: false,
        });
        let content = turn_to_content(&turn);
        assert_eq!(content["role"], "function");
        assert_eq!(content["parts"][0]["functionResponse"]["name"], "lookup");
    }

    #[test]
    fn matching_provider_raw_content_replayed_verbatim() {
        let mut turn = ChatTurn::assistant("ignored");
        turn.raw_content = Some(RawContent {
            provider_tag: "gemini".into(),
            payload: json!({"role": "model", "parts": [{"text": "verbatim"}]}),
        });
        let content = turn_to_content(&turn);
        assert_eq!(content["parts"][0]["text"], "verbatim");
    }

    #[test]
    fn dynamic_context_wraps_in_envelope() {
        let content = dynamic_context_content("it is monday").unwrap();
        assert_eq!(content["role"], "user");
        assert!(content["parts"][0]["text"].as_str().unwrap().starts_with("[SYSTEM_CONTEXT/TODAY]"));
    }

    #[test]
    fn empty_dynamic_context_is_none() {
        assert!(dynamic_context_content("   ").is_none());
    }
}
