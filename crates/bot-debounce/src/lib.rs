pub mod error;
pub mod types;

pub use error::{DebounceError, Result};
pub use types::{DebounceEvent, FlushContext};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The function the owner of a `Debouncer` supplies to actually handle a
/// coalesced batch. Receives the flush context and a cancellation token the
/// supersession logic fires when a newer batch for the same key arrives.
pub type FlushFn =
    Arc<dyn Fn(FlushContext, CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct PendingKey {
    texts: Vec<String>,
    phone: String,
    last_event: DebounceEvent,
    timer: JoinHandle<()>,
}

struct InFlightEntry {
    token: u64,
    cancel: CancellationToken,
}

struct Inner {
    pending: HashMap<String, PendingKey>,
    in_flight: HashMap<String, InFlightEntry>,
    next_token: u64,
}

/// Coalesces bursts per `(instance, chat)` key into a single delivery
///. A single mutex covers both the per-key buffer table and the
/// in-flight table — the two are never locked separately, so there is
/// no lock-ordering hazard between them.
pub struct Debouncer {
    window: Duration,
    flush_fn: FlushFn,
    inner: Mutex<Inner>,
}

impl Debouncer {
    pub fn new(window: Duration, flush_fn: FlushFn) -> Arc<Self> {
        Arc::new(Self {
            window,
            flush_fn,
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                in_flight: HashMap::new(),
                next_token: 0,
            }),
        })
    }

    /// Drops events with a blank/"global" instance, a blank
    /// chat id, or no text and no media. Media (or a zero debounce window)
    /// bypasses coalescing entirely and flushes synchronously.
    pub fn enqueue(self: &Arc<Self>, instance_id: &str, chat_id: &str, phone: &str, event: DebounceEvent) {
        if instance_id.trim().is_empty() || instance_id == "global" || chat_id.trim().is_empty() {
            return;
        }
        if !event.has_content() {
            return;
        }

        let key = format!("{instance_id}|{chat_id}");

        if event.media.is_some() || self.window.is_zero() {
            {
                let mut inner = self.inner.lock().expect("debouncer lock poisoned");
                if let Some(pending) = inner.pending.remove(&key) {
                    pending.timer.abort();
                }
            }
            let combined = event.text.trim().to_string();
            self.flush(instance_id, chat_id, phone, combined, event);
            return;
        }

        let mut inner = self.inner.lock().expect("debouncer lock poisoned");
        let text = event.text.clone();
        match inner.pending.get_mut(&key) {
            Some(existing) => {
                existing.texts.push(text);
                existing.phone = phone.to_string();
                existing.last_event = event;
                existing.timer.abort();
            }
            None => {
                inner.pending.insert(
                    key.clone(),
                    PendingKey {
                        texts: vec![text],
                        phone: phone.to_string(),
                        last_event: event,
                        // placeholder; replaced immediately below once we
                        // have a handle into `self` for the real timer.
                        timer: tokio::spawn(async {}),
                    },
                );
            }
        }

        let self_clone = Arc::clone(self);
        let key_clone = key.clone();
        let window = self.window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            self_clone.fire(&key_clone);
        });
        if let Some(pending) = inner.pending.get_mut(&key) {
            pending.timer = timer;
        }
    }

    /// Timer fire: atomically detach the buffered state, then flush it.
    fn fire(self: &Arc<Self>, key: &str) {
        let detached = {
            let mut inner = self.inner.lock().expect("debouncer lock poisoned");
            inner.pending.remove(key)
        };
        let Some(detached) = detached else {
            return;
        };
        let Some((instance_id, chat_id)) = key.split_once('|') else {
            return;
        };
        let combined_text = detached.texts.join("\n").trim().to_string();
        self.flush(instance_id, chat_id, &detached.phone, combined_text, detached.last_event);
    }

    /// Registration-and-cancellation ritual: cancel and forget the
    /// previous in-flight entry for this key, register the new one under a
    /// monotonically increasing token, and only clear it on completion if
    /// the stored token still matches (stale completions never clobber
    /// fresh ones).
    fn flush(
        self: &Arc<Self>,
        instance_id: &str,
        chat_id: &str,
        phone: &str,
        combined_text: String,
        last_event: DebounceEvent,
    ) {
        let key = format!("{instance_id}|{chat_id}");
        let cancel = CancellationToken::new();
        let token = {
            let mut inner = self.inner.lock().expect("debouncer lock poisoned");
            if let Some(previous) = inner.in_flight.remove(&key) {
                debug!(key = %key, "cancelling predecessor in-flight job");
                previous.cancel.cancel();
            }
            inner.next_token += 1;
            let token = inner.next_token;
            inner.in_flight.insert(
                key.clone(),
                InFlightEntry {
                    token,
                    cancel: cancel.clone(),
                },
            );
            token
        };

        let ctx = FlushContext {
            instance_id: instance_id.to_string(),
            chat_id: chat_id.to_string(),
            phone: phone.to_string(),
            combined_text,
            last_event,
        };
        let flush_fn = Arc::clone(&self.flush_fn);
        let self_clone = Arc::clone(self);
        tokio::spawn(async move {
            (flush_fn)(ctx, cancel).await;
            let mut inner = self_clone.inner.lock().expect("debouncer lock poisoned");
            if let Some(entry) = inner.in_flight.get(&key) {
                if entry.token == token {
                    inner.in_flight.remove(&key);
                }
            }
        });
    }

    /// Observable count of keys with a live in-flight job. Exposed for
    /// tests and admin-surface introspection.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().expect("debouncer lock poisoned").in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    fn recording_flush(
        calls: Arc<AsyncMutex<Vec<FlushContext>>>,
    ) -> FlushFn {
        Arc::new(move |ctx, _cancel| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.lock().await.push(ctx);
            })
        })
    }

    #[tokio::test]
    async fn coalesces_burst_into_single_newline_joined_flush() {
        let calls = Arc::new(AsyncMutex::new(Vec::new()));
        let debouncer = Debouncer::new(Duration::from_millis(60), recording_flush(Arc::clone(&calls)));

        for text in ["hi", "how are", "you?"] {
            debouncer.enqueue(
                "i1",
                "c1",
                "+1",
                DebounceEvent {
                    text: text.to_string(),
                    media: None,
                },
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(150)).await;

        let calls = calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].combined_text, "hi\nhow are\nyou?");
    }

    #[tokio::test]
    async fn blank_instance_or_chat_is_dropped() {
        let calls = Arc::new(AsyncMutex::new(Vec::new()));
        let debouncer = Debouncer::new(Duration::from_millis(20), recording_flush(Arc::clone(&calls)));

        debouncer.enqueue("", "c1", "+1", DebounceEvent { text: "hi".into(), media: None });
        debouncer.enqueue("global", "c1", "+1", DebounceEvent { text: "hi".into(), media: None });
        debouncer.enqueue("i1", "", "+1", DebounceEvent { text: "hi".into(), media: None });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_text_and_no_media_is_dropped() {
        let calls = Arc::new(AsyncMutex::new(Vec::new()));
        let debouncer = Debouncer::new(Duration::from_millis(20), recording_flush(Arc::clone(&calls)));
        debouncer.enqueue("i1", "c1", "+1", DebounceEvent { text: "   ".into(), media: None });
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn zero_window_flushes_synchronously_without_a_timer() {
        let calls = Arc::new(AsyncMutex::new(Vec::new()));
        let debouncer = Debouncer::new(Duration::ZERO, recording_flush(Arc::clone(&calls)));
        debouncer.enqueue("i1", "c1", "+1", DebounceEvent { text: "now".into(), media: None });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let calls = calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].combined_text, "now");
    }

    #[tokio::test]
    async fn supersession_cancels_predecessor_token() {
        let observed_cancelled = Arc::new(AtomicUsize::new(0));
        let obs = Arc::clone(&observed_cancelled);
        let flush_fn: FlushFn = Arc::new(move |_ctx, cancel| {
            let obs = Arc::clone(&obs);
            Box::pin(async move {
                // Predecessor: wait long enough to observe cancellation.
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                    _ = cancel.cancelled() => {
                        obs.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        });
        let debouncer = Debouncer::new(Duration::ZERO, flush_fn);

        debouncer.enqueue("i1", "c1", "+1", DebounceEvent { text: "first".into(), media: None });
        tokio::time::sleep(Duration::from_millis(10)).await;
        debouncer.enqueue("i1", "c1", "+1", DebounceEvent { text: "second".into(), media: None });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(observed_cancelled.load(Ordering::SeqCst), 1);
    }
}
