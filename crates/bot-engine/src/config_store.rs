use std::collections::HashMap;

use async_trait::async_trait;
use bot_core::types::Bot;
use bot_mcp::McpServerRecord;

/// External collaborator owning bot definitions and their MCP server
/// bindings. Persistence, the admin surface, and credential decryption are
/// all out of scope here — the engine only ever reads through
/// this trait, which keeps it free of a concrete database dependency.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_bot(&self, bot_id: &str) -> Option<Bot>;

    /// Operational MCP servers bound to `bot_id`. Empty for a bot with no
    /// tool servers configured.
    async fn mcp_servers_for_bot(&self, bot_id: &str) -> Vec<McpServerRecord>;

    /// Per-bot custom headers for `server_id`, already decrypted. Empty if
    /// none are configured.
    async fn mcp_headers_for_bot(&self, bot_id: &str, server_id: &str) -> HashMap<String, String>;

    /// Resolves `Bot.credentials_ref` to the raw API key used for
    /// multimodal pre-processing. `None` if the reference can't be
    /// resolved; the caller degrades by skipping `Interpret` entirely.
    async fn resolve_credential(&self, credentials_ref: &str) -> Option<String>;
}
