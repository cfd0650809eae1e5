use async_trait::async_trait;

use crate::error::TransportError;

/// Contract the core consumes from an external chat transport. The
/// transport's own connection lifecycle, QR-login flow, and media handling
/// are explicit non-goals — the core only ever sends through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identifier for this transport instance (e.g. a WhatsApp
    /// instance id). Used as the key in `TransportRegistry`.
    fn id(&self) -> &str;

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;

    /// The humanizer calls this repeatedly; implementations must tolerate
    /// redundant toggles without erroring.
    async fn send_presence(&self, chat_id: &str, is_typing: bool) -> Result<(), TransportError>;
}
