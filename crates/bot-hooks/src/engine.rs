use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, warn};

use crate::types::PostReplyContext;

/// A single post-reply hook. Handlers must be cheap — they run inline on
/// whatever task calls `HookEngine::run`, which is either the
/// engine's own background delivery task or the caller's context when no
/// transport is registered.
pub trait PostReplyHook: Send + Sync {
    fn name(&self) -> &str;
    fn handle(&self, ctx: &PostReplyContext) -> Result<(), String>;
}

/// Dispatches post-reply hooks in registration order. A single instance is
/// constructed at startup and passed explicitly into the engine rather than
/// held as a global mutable singleton.
pub struct HookEngine {
    hooks: RwLock<Vec<Arc<dyn PostReplyHook>>>,
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HookEngine {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, hook: Arc<dyn PostReplyHook>) {
        let mut hooks = self.hooks.write().expect("hook registry poisoned");
        debug!(name = hook.name(), "post-reply hook registered");
        hooks.push(hook);
    }

    /// Run every hook in registration order. A hook's failure is logged and
    /// does not stop the remaining hooks or propagate to the caller.
    pub fn run(&self, ctx: &PostReplyContext) {
        let hooks = self.hooks.read().expect("hook registry poisoned");
        for hook in hooks.iter() {
            let t = Instant::now();
            let result = hook.handle(ctx);
            let elapsed_ms = t.elapsed().as_millis() as u64;
            match result {
                Ok(()) => debug!(hook = hook.name(), elapsed_ms, "post-reply hook completed"),
                Err(reason) => warn!(hook = hook.name(), elapsed_ms, reason, "post-reply hook failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::types::{BotInput, BotOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_ctx() -> PostReplyContext {
        PostReplyContext {
            input: BotInput {
                bot_id: "b1".into(),
                workspace_id: None,
                sender_id: "alice".into(),
                chat_id: "c1".into(),
                instance_id: "i1".into(),
                platform: "test".into(),
                text: "hi".into(),
                media: None,
                trace_id: None,
                last_mindset: None,
                pending_tasks: Vec::new(),
                language_hint: None,
            },
            output: BotOutput {
                text: "hello".into(),
                ..Default::default()
            },
            delivered: true,
        }
    }

    struct CountingHook {
        name: String,
        calls: Arc<AtomicUsize>,
        fails: bool,
    }

    impl PostReplyHook for CountingHook {
        fn name(&self) -> &str {
            &self.name
        }
        fn handle(&self, _ctx: &PostReplyContext) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn runs_hooks_in_registration_order_and_isolates_failures() {
        let engine = HookEngine::new();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        engine.register(Arc::new(CountingHook {
            name: "first".into(),
            calls: Arc::clone(&first_calls),
            fails: true,
        }));
        engine.register(Arc::new(CountingHook {
            name: "second".into(),
            calls: Arc::clone(&second_calls),
            fails: false,
        }));

        engine.run(&sample_ctx());

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }
}
