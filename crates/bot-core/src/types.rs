use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A configured bot. Owned by the config store; the core only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub id: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub credentials_ref: String,
    pub model: String,
    pub system_prompt: String,
    #[serde(default)]
    pub knowledge_base: String,
    #[serde(default)]
    pub memory_enabled: bool,
    #[serde(default)]
    pub modalities: ModalityFlags,
    /// Sender identifiers allowed to reach this bot. Empty = unrestricted.
    /// Substring match is permitted (see `Bot::allows_sender`).
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// `Bot.provider` defaults to "gemini" when absent (§4.5 step 4).
fn default_provider() -> String {
    "gemini".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModalityFlags {
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub image: bool,
    #[serde(default)]
    pub document: bool,
    #[serde(default)]
    pub video: bool,
}

impl Bot {
    /// Whitelist gate: empty whitelist admits everyone;
    /// otherwise the sender must equal or contain a trimmed entry.
    pub fn allows_sender(&self, sender: &str) -> bool {
        if self.whitelist.is_empty() {
            return true;
        }
        let sender = sender.trim();
        self.whitelist.iter().any(|w| {
            let w = w.trim();
            w == sender || sender.contains(w)
        })
    }
}

/// A single coalesced inbound message handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInput {
    pub bot_id: String,
    pub workspace_id: Option<String>,
    pub sender_id: String,
    pub chat_id: String,
    pub instance_id: String,
    pub platform: String,
    pub text: String,
    pub media: Option<Media>,
    /// Generated if absent when the input enters `Process`.
    pub trace_id: Option<String>,
    pub last_mindset: Option<Mindset>,
    #[serde(default)]
    pub pending_tasks: Vec<String>,
    pub language_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl BotInput {
    /// Chat key: `{instance}|{chat}`, identifies a conversation stream
    /// independent of bot identity.
    pub fn chat_key(&self) -> String {
        format!("{}|{}", self.instance_id, self.chat_id)
    }

    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.media.is_some()
    }
}

/// Reply produced by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotOutput {
    pub text: String,
    pub action: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl BotOutput {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Role of a single turn in a conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Function,
}

/// Provider-specific opaque representation of a past assistant turn,
/// preserved so subsequent turns stay format-compatible with the provider
/// that produced them. Never replayed against a different provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    pub provider_tag: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

/// One turn of chat history. `raw_content`, `tool_calls`, and `tool_responses`
/// are mutually informative, not mutually exclusive: a turn recorded from an
/// assistant tool-use step carries both `tool_calls` and (if the provider
/// supplied one) `raw_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub raw_content: Option<RawContent>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_responses: Vec<ToolResponse>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            raw_content: None,
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            raw_content: None,
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
        }
    }

    /// Drop a raw-content handle recorded by a different provider than the
    /// one about to receive this turn, degrading gracefully to a plain-text
    /// turn rather than failing the whole conversation.
    pub fn for_provider(mut self, provider_tag: &str) -> Self {
        if let Some(raw) = &self.raw_content {
            if raw.provider_tag != provider_tag {
                self.raw_content = None;
            }
        }
        self
    }
}

/// Composite memory key: `ws|{workspace}|bot|{bot}|{sender}`, or the legacy
/// `bot|{bot}|{sender}` form when no workspace is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryKey(pub String);

impl MemoryKey {
    pub fn new(workspace_id: Option<&str>, bot_id: &str, sender_id: &str) -> Self {
        match workspace_id {
            Some(ws) if !ws.is_empty() => {
                Self(format!("ws|{}|bot|{}|{}", ws, bot_id, sender_id))
            }
            _ => Self(format!("bot|{}|{}", bot_id, sender_id)),
        }
    }

    pub fn bot_prefix(bot_id: &str) -> String {
        format!("bot|{}|", bot_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON-Schema-described tool made available to the provider for a single
/// `Chat` round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A single round-trip request to a provider adapter.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub chat_key: String,
    pub system_prompt: String,
    pub dynamic_context: String,
    pub user_text: String,
    pub history: Vec<ChatTurn>,
    pub tools: Vec<ToolSpec>,
    pub model: String,
    pub bot_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_tokens: u32,
    pub estimated_system_tokens: u32,
    pub estimated_user_tokens: u32,
    pub estimated_history_tokens: u32,
    pub cost_usd: f64,
}

/// A single round-trip response from a provider adapter.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub raw_content: Option<RawContent>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Pace at which the engine should move through a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Fast,
    Steady,
    Deep,
}

/// Lightweight intent classification driving the should-respond gate and
/// acknowledgement generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mindset {
    pub pace: Pace,
    pub focus: bool,
    pub work: bool,
    pub should_respond: bool,
    pub acknowledgement: String,
    pub enqueue_task: Option<String>,
    pub clear_tasks: bool,
}

impl Mindset {
    /// Safe fallback used whenever pre-analysis fails non-critically.
    pub fn fallback() -> Self {
        Self {
            pace: Pace::Steady,
            focus: false,
            work: false,
            should_respond: true,
            acknowledgement: String::new(),
            enqueue_task: None,
            clear_tasks: false,
        }
    }
}

/// Kind of context-cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Bot,
    Global,
    Maturing,
}

/// Local index record for a provider-managed context cache handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCacheEntry {
    pub cache_name: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub model: String,
    pub provider: String,
    pub scope: String,
    pub fingerprint: String,
    pub stored_content_hash: String,
    pub kind: CacheKind,
}

impl ContextCacheEntry {
    pub fn is_valid(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now < self.expires_at
    }
}

/// Kind of entity tracked by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Mcp,
    Credential,
    Bot,
    Workspace,
    Channel,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Mcp => "mcp",
            EntityType::Credential => "credential",
            EntityType::Bot => "bot",
            EntityType::Workspace => "workspace",
            EntityType::Channel => "channel",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub name: String,
    pub status: HealthStatus,
    pub last_checked: chrono::DateTime<chrono::Utc>,
    pub last_success: Option<chrono::DateTime<chrono::Utc>>,
    pub last_message: String,
}

impl HealthRecord {
    pub fn unknown(entity_type: EntityType, entity_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            name: name.into(),
            status: HealthStatus::Unknown,
            last_checked: chrono::Utc::now(),
            last_success: None,
            last_message: String::new(),
        }
    }
}
