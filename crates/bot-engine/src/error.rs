use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bot not found: {0}")]
    BotNotFound(String),

    #[error("provider not registered: {0}")]
    ProviderUnregistered(String),

    #[error(transparent)]
    Provider(#[from] bot_provider::ProviderError),

    #[error("tool-call loop exceeded maximum iterations for a single message")]
    ToolLoopExceeded,
}

pub type Result<T> = std::result::Result<T, EngineError>;
