pub mod error;
pub mod profile;
pub mod rng;

pub use error::{HumanizerError, Result};
pub use profile::HumanizerProfile;
pub use rng::{RandomSource, ThreadRandomSource};

use std::sync::Arc;
use std::time::Duration;

use bot_transport::Transport;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of a single humanizer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All pacing segments completed; the caller should proceed to send.
    Delivered,
    /// Cancelled mid-run; the caller must skip the send.
    Aborted,
}

/// Typing-presence + paced-delay engine. One instance is constructed
/// at startup and shared (it is stateless aside from its profile/rng) —
/// no global mutable singleton.
pub struct Humanizer {
    profile: HumanizerProfile,
    rng: Arc<dyn RandomSource>,
}

impl Humanizer {
    pub fn new(profile: HumanizerProfile) -> Self {
        Self {
            profile,
            rng: Arc::new(ThreadRandomSource),
        }
    }

    pub fn with_rng(profile: HumanizerProfile, rng: Arc<dyn RandomSource>) -> Self {
        Self { profile, rng }
    }

    /// Drive typing-presence + paced sleeps for `text`, then return whether
    /// the run completed or was aborted by `cancel`. With no transport
    /// registered, returns `Delivered` immediately with no side effects.
    pub async fn run(
        &self,
        transport: Option<&(dyn Transport)>,
        chat_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        let Some(transport) = transport else {
            return Outcome::Delivered;
        };

        if self.sleep(self.rng.uniform(50, 150), cancel).await.is_err() {
            return self.abort(transport, chat_id).await;
        }

        let _ = transport.send_presence(chat_id, true).await;

        let mut pending_chars: u64 = 0;
        let mut words_since_break: u32 = 0;
        let mut break_threshold = self.next_break_threshold();
        let mut prev_char: Option<char> = None;

        for ch in text.chars() {
            pending_chars += 1;

            let mut pause: Option<(u64, u64, bool)> = match ch {
                '.' | '!' | '?' => {
                    if self.rng.chance(self.profile.punctuation_pause_chance) {
                        Some((
                            self.profile.punctuation_pause_min_ms,
                            self.profile.punctuation_pause_max_ms,
                            true,
                        ))
                    } else {
                        None
                    }
                }
                ',' | ':' | ';' => {
                    if self.rng.chance(0.20) {
                        Some((60, 160, false))
                    } else {
                        None
                    }
                }
                '\n' => {
                    if prev_char == Some('\n') {
                        Some((300, 700, true))
                    } else {
                        Some((180, 450, true))
                    }
                }
                c if is_emoji(c) => Some((100, 350, true)),
                _ => None,
            };

            if ch == ' ' || ch == '\n' {
                words_since_break += 1;
                if words_since_break >= break_threshold {
                    words_since_break = 0;
                    break_threshold = self.next_break_threshold();
                    if pause.is_none() && self.rng.chance(self.profile.thinking_pause_chance) {
                        pause = Some((
                            self.profile.thinking_pause_min_ms,
                            self.profile.thinking_pause_max_ms,
                            true,
                        ));
                    }
                }
            }

            if let Some((min_ms, max_ms, toggle_presence)) = pause {
                let segment_delay = self.segment_delay_ms(pending_chars);
                if self.sleep(segment_delay, cancel).await.is_err() {
                    return self.abort(transport, chat_id).await;
                }
                pending_chars = 0;
                let pause_ms = self.rng.uniform(min_ms, max_ms);
                if toggle_presence && pause_ms >= 200 {
                    let _ = transport.send_presence(chat_id, false).await;
                    if self.sleep(pause_ms, cancel).await.is_err() {
                        return self.abort(transport, chat_id).await;
                    }
                    let _ = transport.send_presence(chat_id, true).await;
                } else if self.sleep(pause_ms, cancel).await.is_err() {
                    return self.abort(transport, chat_id).await;
                }
            }

            prev_char = Some(ch);
        }

        if pending_chars > 0 {
            let segment_delay = self.segment_delay_ms(pending_chars);
            if self.sleep(segment_delay, cancel).await.is_err() {
                return self.abort(transport, chat_id).await;
            }
        }

        let _ = transport.send_presence(chat_id, false).await;
        if self
            .sleep(self.rng.uniform(80, 260), cancel)
            .await
            .is_err()
        {
            return Outcome::Aborted;
        }

        Outcome::Delivered
    }

    fn segment_delay_ms(&self, segment_chars: u64) -> u64 {
        let per_char = self.profile.base_char_delay_ms
            + self.rng.uniform(0, self.profile.char_delay_variance_ms);
        (segment_chars * per_char).min(4_000)
    }

    fn next_break_threshold(&self) -> u32 {
        let variance = self.profile.words_break_variance as u64;
        let draw = self.rng.uniform(0, variance * 2) as i64 - variance as i64;
        (self.profile.words_per_break as i64 + draw).max(5) as u32
    }

    /// Sleep for `ms`, observing cancellation at every suspension point
    ///. Returns `Err(())` if the cancellation fired first.
    async fn sleep(&self, ms: u64, cancel: &CancellationToken) -> std::result::Result<(), ()> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
            _ = cancel.cancelled() => Err(()),
        }
    }

    /// Best-effort typing-off with an independent 2-second deadline. Never fails the caller even if the presence call errors or
    /// times out.
    async fn abort(&self, transport: &dyn Transport, chat_id: &str) -> Outcome {
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            transport.send_presence(chat_id, false),
        )
        .await;
        if result.is_err() {
            debug!(chat_id, "typing-off on abort did not complete within deadline");
        }
        Outcome::Aborted
    }
}

/// Emoji code-point ranges: the main pictograph block,
/// the misc-symbols/dingbats block, and the supplementary pictograph
/// extensions.
fn is_emoji(ch: char) -> bool {
    let cp = ch as u32;
    matches!(cp, 0x1F300..=0x1F9FF | 0x2600..=0x27BF | 0x1FA00..=0x1FAFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::test_support::FixedRandomSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingTransport {
        id: String,
        sent: Mutex<Vec<String>>,
        presence_calls: AtomicUsize,
        fail_send: AtomicBool,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                id: "t1".into(),
                sent: Mutex::new(Vec::new()),
                presence_calls: AtomicUsize::new(0),
                fail_send: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send_message(
            &self,
            _chat_id: &str,
            text: &str,
        ) -> std::result::Result<(), bot_transport::TransportError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_presence(
            &self,
            _chat_id: &str,
            _is_typing: bool,
        ) -> std::result::Result<(), bot_transport::TransportError> {
            self.presence_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_profile() -> HumanizerProfile {
        // near-zero delays so tests run quickly regardless of text length.
        HumanizerProfile {
            base_char_delay_ms: 0,
            char_delay_variance_ms: 0,
            punctuation_pause_chance: 0.0,
            punctuation_pause_min_ms: 1,
            punctuation_pause_max_ms: 1,
            words_per_break: 1000,
            words_break_variance: 0,
            thinking_pause_chance: 0.0,
            thinking_pause_min_ms: 1,
            thinking_pause_max_ms: 1,
        }
    }

    #[tokio::test]
    async fn no_transport_returns_delivered_immediately_with_no_side_effects() {
        let humanizer = Humanizer::new(fast_profile());
        let cancel = CancellationToken::new();
        let outcome = humanizer.run(None, "c1", "hello there", &cancel).await;
        assert_eq!(outcome, Outcome::Delivered);
    }

    #[tokio::test]
    async fn completes_and_toggles_presence_at_least_twice() {
        let rng = Arc::new(FixedRandomSource {
            chance_result: false,
        });
        let humanizer = Humanizer::with_rng(fast_profile(), rng);
        let transport = RecordingTransport::new();
        let cancel = CancellationToken::new();

        let outcome = humanizer
            .run(Some(&transport), "c1", "hello world", &cancel)
            .await;

        assert_eq!(outcome, Outcome::Delivered);
        assert!(transport.presence_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn cancellation_aborts_without_send_and_attempts_typing_off() {
        let humanizer = Humanizer::new(HumanizerProfile {
            base_char_delay_ms: 500,
            char_delay_variance_ms: 0,
            ..fast_profile()
        });
        let transport = RecordingTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = humanizer
            .run(Some(&transport), "c1", "this will not be sent", &cancel)
            .await;

        assert_eq!(outcome, Outcome::Aborted);
        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(transport.presence_calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn emoji_ranges_detected() {
        assert!(is_emoji('🎉'));
        assert!(is_emoji('☀'));
        assert!(!is_emoji('a'));
        assert!(!is_emoji('5'));
    }

    #[test]
    fn profile_by_name_falls_back_to_default() {
        assert_eq!(HumanizerProfile::by_name("fast"), HumanizerProfile::fast());
        assert_eq!(
            HumanizerProfile::by_name("unknown"),
            HumanizerProfile::default_profile()
        );
    }
}
