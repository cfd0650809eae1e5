use thiserror::Error;

/// Memory Store operations are all infallible by design — this
/// exists so call sites and tests have a stable `Result` alias to match the
/// rest of the workspace's crates, and so a future fallible backend (e.g. a
/// distributed KV fallback) has somewhere to grow into.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("internal memory store error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
