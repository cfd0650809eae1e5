use async_trait::async_trait;

/// Implemented by whatever owns MCP server records (`bot-mcp`, wired in by
/// the gateway's DI root). Kept as a trait here — not a dependency on
/// `bot-mcp` — to break the cyclic component graph the engine/provider/
/// MCP/health quartet would otherwise form.
#[async_trait]
pub trait McpValidator: Send + Sync {
    async fn validate(&self, server_id: &str) -> Result<(), String>;
}

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, credential_id: &str) -> Result<(), String>;
}

/// `CheckBot` never triggers a network probe of its own; this
/// validation is local config inspection only (e.g. bot exists, is
/// enabled, has a resolvable provider).
#[async_trait]
pub trait BotValidator: Send + Sync {
    async fn validate(&self, bot_id: &str) -> Result<(), String>;
}

#[async_trait]
pub trait WorkspaceValidator: Send + Sync {
    async fn validate(&self, workspace_id: &str) -> Result<(), String>;
}

#[async_trait]
pub trait ChannelValidator: Send + Sync {
    async fn validate(&self, channel_id: &str) -> Result<(), String>;
}
