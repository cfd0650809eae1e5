use thiserror::Error;

/// Workspace-root error type. Individual crates (bot-provider, bot-mcp, ...)
/// define their own narrower error enums at the seam where their operations
/// fail; those convert into `BotError` via `#[from]` at the boundary the
/// gateway binary sits behind.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bot not found: {id}")]
    BotNotFound { id: String },

    #[error("provider not registered: {provider}")]
    ProviderUnregistered { provider: String },

    #[error("credential missing or invalid: {0}")]
    CredentialInvalid(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("mcp error: {0}")]
    Mcp(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Short error code, mirrored in observability events and admin-surface
    /// responses.
    pub fn code(&self) -> &'static str {
        match self {
            BotError::Config(_) => "CONFIG_ERROR",
            BotError::BotNotFound { .. } => "BOT_NOT_FOUND",
            BotError::ProviderUnregistered { .. } => "PROVIDER_UNREGISTERED",
            BotError::CredentialInvalid(_) => "CREDENTIAL_INVALID",
            BotError::Provider(_) => "PROVIDER_ERROR",
            BotError::Mcp(_) => "MCP_ERROR",
            BotError::Serialization(_) => "SERIALIZATION_ERROR",
            BotError::Io(_) => "IO_ERROR",
            BotError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
