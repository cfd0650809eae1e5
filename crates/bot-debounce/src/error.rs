use thiserror::Error;

#[derive(Debug, Error)]
pub enum DebounceError {
    #[error("flush handler panicked: {0}")]
    FlushPanicked(String),
}

pub type Result<T> = std::result::Result<T, DebounceError>;
