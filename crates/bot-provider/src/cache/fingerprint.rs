use sha2::{Digest, Sha256};

use bot_core::types::ToolSpec;

/// Fingerprint for a bot-scoped cache entry: `SHA-256(chatKey ‖ systemPrompt
/// ‖ json(stablePrefix) ‖ json(toolDecls))`. Stable across requests that
/// share the same chat, system prompt, primed history prefix, and tool
/// set — the exact set of things the Gemini adapter holds fixed in the
/// cached prefix.
pub fn bot_fingerprint(chat_key: &str, system_prompt: &str, stable_prefix: &serde_json::Value, tools: &[ToolSpec]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chat_key.as_bytes());
    hasher.update(system_prompt.as_bytes());
    hasher.update(stable_prefix.to_string().as_bytes());
    hasher.update(serde_json::to_string(tools).unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint for the global intuition cache, shared across all bots on a
/// given model: `global:intuition:{model}`.
pub fn global_intuition_fingerprint(model: &str) -> String {
    format!("global:intuition:{model}")
}

/// Estimate token count for cache-eligibility and usage-accounting
/// purposes: roughly one token per four characters.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() as f64) / 4.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_fingerprint_is_stable() {
        let a = bot_fingerprint("chat-1", "you are a bot", &serde_json::json!([]), &[]);
        let b = bot_fingerprint("chat-1", "you are a bot", &serde_json::json!([]), &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn bot_fingerprint_changes_with_inputs() {
        let a = bot_fingerprint("chat-1", "you are a bot", &serde_json::json!([]), &[]);
        let b = bot_fingerprint("chat-2", "you are a bot", &serde_json::json!([]), &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn global_fingerprint_is_namespaced() {
        assert_eq!(global_intuition_fingerprint("gemini-2.5-pro"), "global:intuition:gemini-2.5-pro");
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
