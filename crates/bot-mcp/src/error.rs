use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("plaintext HTTP rejected for MCP server (set dev override to allow): {0}")]
    PlaintextRejected(String),

    #[error("stdio transport is forbidden for MCP servers")]
    StdioForbidden,

    #[error("MCP server unknown: {0}")]
    ServerNotFound(String),

    #[error("MCP session initialization failed: {0}")]
    InitializeFailed(String),

    #[error("MCP tool list failed: {0}")]
    ListToolsFailed(String),

    #[error("MCP tool call failed: {0}")]
    CallFailed(String),

    #[error("MCP availability probe failed: {0}")]
    ProbeFailed(String),

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;
