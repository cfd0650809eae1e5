use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bot_core::config::BotConfig;
use bot_core::types::{BotInput, Media};
use bot_debounce::{DebounceEvent, Debouncer, FlushContext};
use bot_engine::{BotEngine, ConfigStore};
use bot_health::HealthReporter;
use bot_hooks::HookEngine;
use bot_humanizer::{Humanizer, HumanizerProfile};
use bot_mcp::McpClient;
use bot_provider::ContextCacheStore;
use bot_transport::{Transport, TransportRegistry};
use bot_workers::{Job, WorkerPool};

/// Per-`(instance, chat)` context the debouncer's `FlushContext` doesn't
/// carry (sender/bot identity). Recorded on every inbound event and read
/// back once the debounced batch actually fires.
#[derive(Clone)]
struct SenderContext {
    bot_id: String,
    workspace_id: Option<String>,
    sender_id: String,
    platform: String,
}

/// One inbound message offered to the runtime, before debounce coalescing.
pub struct InboundEvent {
    pub bot_id: String,
    pub workspace_id: Option<String>,
    pub sender_id: String,
    pub instance_id: String,
    pub chat_id: String,
    pub phone: String,
    pub platform: String,
    pub text: String,
    pub media: Option<Media>,
}

/// The gateway's DI root. Built once at startup from `BotConfig`
/// and wired to a `ConfigStore`, then handed every inbound event; owns the
/// debounce → worker-pool → engine pipeline end to end.
pub struct Runtime {
    debouncer: Arc<Debouncer>,
    pool: Arc<WorkerPool>,
    transports: Arc<TransportRegistry>,
    pending_senders: Arc<DashMap<String, SenderContext>>,
}

impl Runtime {
    pub fn new(
        config: &BotConfig,
        config_store: Arc<dyn ConfigStore>,
        health: Option<Arc<dyn HealthReporter>>,
    ) -> Arc<Self> {
        let memory = Arc::new(bot_memory::MemoryStore::new());
        let hooks = Arc::new(HookEngine::new());
        let transports = Arc::new(TransportRegistry::new());
        let humanizer = Arc::new(Humanizer::new(HumanizerProfile::by_name(&config.humanizer.profile)));
        let mcp = Arc::new(McpClient::new(config.mcp.allow_plaintext_http));
        let cache = Arc::new(ContextCacheStore::new(None));

        let engine = Arc::new(BotEngine::new(
            config_store,
            memory,
            hooks,
            Arc::clone(&transports),
            humanizer,
            mcp,
            cache,
            config.providers.clone(),
            health,
            config.memory.turn_limit,
        ));

        let pool = WorkerPool::start(bot_workers::WorkerPoolConfig {
            worker_count: config.workers.worker_count,
            queue_capacity: config.workers.queue_capacity,
        });

        let pending_senders: Arc<DashMap<String, SenderContext>> = Arc::new(DashMap::new());
        let flush_pool = Arc::clone(&pool);
        let flush_senders = Arc::clone(&pending_senders);
        let flush_engine = Arc::clone(&engine);

        let flush_fn: bot_debounce::FlushFn = Arc::new(move |ctx: FlushContext, debounce_cancel: CancellationToken| {
            let pool = Arc::clone(&flush_pool);
            let senders = Arc::clone(&flush_senders);
            let engine = Arc::clone(&flush_engine);
            Box::pin(async move {
                let chat_key = format!("{}|{}", ctx.instance_id, ctx.chat_id);
                let Some(sender) = senders.get(&chat_key).map(|e| e.value().clone()) else {
                    warn!(chat_key, "flush fired with no recorded sender context, dropping");
                    return;
                };
                let engine = Arc::clone(&engine);
                let job_key = chat_key.clone();
                let outcome = pool.dispatch(Job {
                    key: job_key,
                    run: Box::new(move |job_cancel: CancellationToken| {
                        Box::pin(async move {
                            let input = BotInput {
                                bot_id: sender.bot_id,
                                workspace_id: sender.workspace_id,
                                sender_id: sender.sender_id,
                                chat_id: ctx.chat_id,
                                instance_id: ctx.instance_id,
                                platform: sender.platform,
                                text: ctx.combined_text,
                                media: ctx.last_event.media,
                                trace_id: None,
                                last_mindset: None,
                                pending_tasks: vec![],
                                language_hint: None,
                            };
                            tokio::select! {
                                result = engine.process(job_cancel, input) => {
                                    if let Err(err) = result {
                                        warn!(error = %err, "bot engine process failed");
                                    }
                                }
                                _ = debounce_cancel.cancelled() => {
                                    warn!("superseded by a newer batch for this chat, abandoning in-flight process");
                                }
                            }
                        })
                    }),
                });
                if outcome != bot_workers::DispatchOutcome::Enqueued {
                    warn!(?outcome, "dropped debounced batch, worker queue unavailable");
                }
            })
        });

        let debouncer = Debouncer::new(std::time::Duration::from_millis(config.debounce.window_ms), flush_fn);

        Arc::new(Self {
            debouncer,
            pool,
            transports,
            pending_senders,
        })
    }

    /// Registers (or replaces) a transport so the engine can deliver
    /// replies for its instance id.
    pub fn register_transport(&self, transport: Arc<dyn Transport>) {
        self.transports.register(transport);
    }

    /// Offers one inbound message to the debounce → worker-pool → engine
    /// pipeline.
    pub fn submit(&self, event: InboundEvent) {
        let chat_key = format!("{}|{}", event.instance_id, event.chat_id);
        self.pending_senders.insert(
            chat_key,
            SenderContext {
                bot_id: event.bot_id,
                workspace_id: event.workspace_id,
                sender_id: event.sender_id,
                platform: event.platform,
            },
        );
        self.debouncer.enqueue(
            &event.instance_id,
            &event.chat_id,
            &event.phone,
            DebounceEvent {
                text: event.text,
                media: event.media,
            },
        );
    }

    pub fn worker_stats(&self) -> bot_workers::PoolStats {
        self.pool.stats()
    }

    /// Cancels in-flight work and joins the worker pool.
    pub async fn shutdown(&self) {
        info!("shutting down runtime");
        self.pool.stop().await;
    }
}
