use thiserror::Error;

#[derive(Debug, Error)]
pub enum HumanizerError {
    #[error("presence signal failed: {0}")]
    Presence(String),
}

pub type Result<T> = std::result::Result<T, HumanizerError>;
