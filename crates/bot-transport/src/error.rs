use thiserror::Error;

/// Errors surfaced by a `Transport` implementation. The concrete adapters
/// (WhatsApp/Telegram/etc. clients) are external collaborators;
/// this crate only defines the contract they must satisfy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("presence update failed: {0}")]
    PresenceFailed(String),

    #[error("transport transient error: {0}")]
    Transient(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
