use bot_core::types::Media;

/// A single inbound transport event offered to `Debouncer::enqueue`.
#[derive(Debug, Clone, Default)]
pub struct DebounceEvent {
    pub text: String,
    pub media: Option<Media>,
}

impl DebounceEvent {
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.media.is_some()
    }
}

/// Handed to the flush function once a key's quiet window elapses (or an
/// immediate flush is forced by media/zero-window).
#[derive(Debug, Clone)]
pub struct FlushContext {
    pub instance_id: String,
    pub chat_id: String,
    pub phone: String,
    /// Newline-joined, trimmed combination of every buffered event's text
    ///.
    pub combined_text: String,
    pub last_event: DebounceEvent,
}
