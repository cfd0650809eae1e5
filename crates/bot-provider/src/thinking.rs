use std::fmt;

/// Which of the two call shapes a thinking budget is being resolved for.
/// Chat calls (the main reply) and intuition calls (mindset pre-analysis,
/// the global cached system prompt) get different budgets on some model
/// families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Chat,
    Intuition,
}

/// The shape of `thinkingConfig` sent on the wire differs by model
/// generation: the 3.x family takes a named level, the 2.5 family takes a
/// raw token budget where `-1` means "let the model decide" and `0` means
/// "disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingConfig {
    Level(&'static str),
    Budget(i32),
}

impl fmt::Display for ThinkingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThinkingConfig::Level(l) => write!(f, "level:{l}"),
            ThinkingConfig::Budget(b) => write!(f, "budget:{b}"),
        }
    }
}

/// Resolve the thinking configuration for a model + call kind. Returns
/// `None` for model families with no thinking support, in which case no
/// `thinkingConfig` field should be sent at all.
pub fn thinking_config_for(model: &str, call: CallKind) -> Option<ThinkingConfig> {
    let m = model.split('/').next_back().unwrap_or(model);
    if m.starts_with("gemini-3-pro") {
        return Some(match call {
            CallKind::Chat => ThinkingConfig::Level("high"),
            CallKind::Intuition => ThinkingConfig::Level("low"),
        });
    }
    if m.starts_with("gemini-3-flash") {
        return Some(match call {
            CallKind::Chat => ThinkingConfig::Level("high"),
            CallKind::Intuition => ThinkingConfig::Level("minimal"),
        });
    }
    if m.starts_with("gemini-2.5-pro") {
        return Some(ThinkingConfig::Budget(-1));
    }
    if m.starts_with("gemini-2.5-flash") || m.starts_with("gemini-2.5-flash-lite") {
        return Some(match call {
            CallKind::Chat => ThinkingConfig::Budget(-1),
            CallKind::Intuition => ThinkingConfig::Budget(0),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_3_pro_uses_named_levels() {
        assert_eq!(
            thinking_config_for("gemini-3-pro", CallKind::Chat),
            Some(ThinkingConfig::Level("high"))
        );
        assert_eq!(
            thinking_config_for("gemini-3-pro", CallKind::Intuition),
            Some(ThinkingConfig::Level("low"))
        );
    }

    #[test]
    fn gemini_2_5_pro_is_always_dynamic() {
        assert_eq!(
            thinking_config_for("gemini-2.5-pro", CallKind::Chat),
            Some(ThinkingConfig::Budget(-1))
        );
        assert_eq!(
            thinking_config_for("gemini-2.5-pro", CallKind::Intuition),
            Some(ThinkingConfig::Budget(-1))
        );
    }

    #[test]
    fn gemini_2_5_flash_disables_thinking_for_intuition() {
        assert_eq!(
            thinking_config_for("gemini-2.5-flash", CallKind::Intuition),
            Some(ThinkingConfig::Budget(0))
        );
        assert_eq!(
            thinking_config_for("gemini-2.5-flash", CallKind::Chat),
            Some(ThinkingConfig::Budget(-1))
        );
    }

    #[test]
    fn unknown_model_has_no_thinking_config() {
        assert_eq!(thinking_config_for("gemini-1.0-pro", CallKind::Chat), None);
        assert_eq!(thinking_config_for("gpt-4o", CallKind::Chat), None);
    }
}
