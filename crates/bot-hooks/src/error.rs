use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    /// The hook's handler returned an error. Never propagated past the
    /// engine — only logged.
    #[error("hook execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, HookError>;
