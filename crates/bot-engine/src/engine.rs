use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use bot_core::config::ProvidersConfig;
use bot_core::types::{
    Bot, BotInput, BotOutput, ChatRequest, ChatTurn, MemoryKey, Role, ToolSpec,
};
use bot_health::HealthReporter;
use bot_hooks::{HookEngine, PostReplyContext};
use bot_humanizer::Humanizer;
use bot_mcp::{CallToolRequest, McpClient};
use bot_memory::MemoryStore;
use bot_provider::{build_provider, ContextCacheStore, Provider};
use bot_transport::TransportRegistry;

use crate::config_store::ConfigStore;
use crate::error::{EngineError, Result};

/// Tool-call re-entry cap per message.
const MAX_TOOL_ITERATIONS: u32 = 10;

/// Orchestrates the full lifecycle of a single coalesced inbound message
///. One instance is constructed at startup in the gateway's DI root
/// and handed the collaborators it needs by trait object, so it never
/// depends on their concrete types.
pub struct BotEngine {
    config_store: Arc<dyn ConfigStore>,
    memory: Arc<MemoryStore>,
    hooks: Arc<HookEngine>,
    transports: Arc<TransportRegistry>,
    humanizer: Arc<Humanizer>,
    mcp: Arc<McpClient>,
    cache: Arc<ContextCacheStore>,
    providers: ProvidersConfig,
    health: Option<Arc<dyn HealthReporter>>,
    memory_turn_limit: usize,
}

impl BotEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        memory: Arc<MemoryStore>,
        hooks: Arc<HookEngine>,
        transports: Arc<TransportRegistry>,
        humanizer: Arc<Humanizer>,
        mcp: Arc<McpClient>,
        cache: Arc<ContextCacheStore>,
        providers: ProvidersConfig,
        health: Option<Arc<dyn HealthReporter>>,
        memory_turn_limit: usize,
    ) -> Self {
        Self {
            config_store,
            memory,
            hooks,
            transports,
            humanizer,
            mcp,
            cache,
            providers,
            health,
            memory_turn_limit,
        }
    }

    /// Processes a single coalesced inbound message end to end.
    pub async fn process(&self, cancel: CancellationToken, mut input: BotInput) -> Result<BotOutput> {
        let trace_id = input
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        input.trace_id = Some(trace_id.clone());
        info!(trace_id, bot_id = %input.bot_id, chat_key = %input.chat_key(), "inbound");

        let bot = self
            .config_store
            .get_bot(&input.bot_id)
            .await
            .ok_or_else(|| EngineError::BotNotFound(input.bot_id.clone()))?;

        if !bot.allows_sender(&input.sender_id) {
            debug!(trace_id, bot_id = %bot.id, sender = %input.sender_id, "sender not whitelisted, skipping");
            return Ok(BotOutput::default());
        }

        let provider = build_provider(&bot.provider, &self.providers, Arc::clone(&self.cache))
            .map_err(|_| EngineError::ProviderUnregistered(bot.provider.clone()))?;

        let tools = self.resolve_tools(&bot.id).await;

        let output = self
            .generate_reply(&cancel, &provider, &bot, &input, &tools)
            .await?;

        if let Some(reporter) = &self.health {
            reporter.report_success(bot_core::types::EntityType::Bot, &bot.id, "reply generated");
        }

        if output.is_empty() {
            return Ok(output);
        }

        self.dispatch(&bot, &input, output.clone());

        Ok(output)
    }

    /// Best-effort tool discovery: every MCP server bound to
    /// the bot is listed; a server that fails to respond simply contributes
    /// no tools rather than failing the whole message.
    async fn resolve_tools(&self, bot_id: &str) -> Vec<ToolSpec> {
        let servers = self.config_store.mcp_servers_for_bot(bot_id).await;
        let mut tools = Vec::new();
        for server in &servers {
            match self.mcp.list_tools(server).await {
                Ok(outcome) => tools.extend(outcome.tools),
                Err(e) => warn!(server = %server.id, error = %e, "MCP tool discovery failed, continuing without it"),
            }
        }
        tools
    }

    /// Mindset-gated `Chat` invocation with the bounded tool-call loop
    ///. Persists the user and final assistant turns to
    /// memory when the bot has memory enabled.
    async fn generate_reply(
        &self,
        cancel: &CancellationToken,
        provider: &Arc<dyn Provider>,
        bot: &Bot,
        input: &BotInput,
        tools: &[ToolSpec],
    ) -> Result<BotOutput> {
        let mem_key = MemoryKey::new(input.workspace_id.as_deref(), &bot.id, &input.sender_id);
        let mut history: Vec<ChatTurn> = if bot.memory_enabled {
            self.memory
                .get(mem_key.as_str())
                .into_iter()
                .map(|t| t.for_provider(provider.tag()))
                .collect()
        } else {
            Vec::new()
        };

        let (mindset, _mindset_usage) = provider
            .pre_analyze_mindset(cancel, bot, input, &history)
            .await
            .unwrap_or_else(|e| {
                warn!(bot_id = %bot.id, error = %e, "mindset pre-analysis failed, using fallback");
                (bot_core::types::Mindset::fallback(), bot_core::types::Usage::default())
            });

        if !mindset.should_respond {
            debug!(bot_id = %bot.id, "mindset gate declined a response");
            return Ok(BotOutput::default());
        }

        let user_turn = ChatTurn::user(input.text.clone());
        if bot.memory_enabled {
            self.memory
                .save(mem_key.as_str(), user_turn.clone(), self.memory_turn_limit);
        }
        history.push(user_turn);

        let media_context = self.interpret_media(cancel, provider, bot, input).await;
        let mut context = dynamic_context(bot, input);
        if let Some(media_context) = media_context {
            context.push('\n');
            context.push_str(&media_context);
        }

        let mut request = ChatRequest {
            chat_key: input.chat_key(),
            system_prompt: bot.system_prompt.clone(),
            dynamic_context: context,
            user_text: input.text.clone(),
            history,
            tools: tools.to_vec(),
            model: bot.model.clone(),
            bot_id: bot.id.clone(),
        };

        let mut response = provider.chat(cancel, bot, request.clone()).await?;
        let mut iterations = 0u32;

        while response.has_tool_calls() {
            iterations += 1;
            if iterations > MAX_TOOL_ITERATIONS {
                return Err(EngineError::ToolLoopExceeded);
            }

            request.history.push(ChatTurn {
                role: Role::Assistant,
                text: response.text.clone(),
                raw_content: response.raw_content.clone(),
                tool_calls: response.tool_calls.clone(),
                tool_responses: Vec::new(),
            });

            let mut tool_responses = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                tool_responses.push(self.invoke_tool(&bot.id, call).await);
            }

            request.history.push(ChatTurn {
                role: Role::Function,
                text: String::new(),
                raw_content: None,
                tool_calls: Vec::new(),
                tool_responses,
            });

            response = provider.chat(cancel, bot, request.clone()).await?;
        }

        if response.text.is_empty() {
            return Ok(BotOutput::default());
        }

        if bot.memory_enabled {
            self.memory.save(
                mem_key.as_str(),
                ChatTurn {
                    role: Role::Assistant,
                    text: response.text.clone(),
                    raw_content: response.raw_content.clone(),
                    tool_calls: Vec::new(),
                    tool_responses: Vec::new(),
                },
                self.memory_turn_limit,
            );
        }

        Ok(BotOutput {
            text: response.text,
            action: None,
            metadata: HashMap::new(),
        })
    }

    /// Best-effort multimodal pre-processing: resolves
    /// the bot's credential, runs the provider's transcription/description
    /// pass, and folds the results into a single text block the engine can
    /// splice into the dynamic context. Any failure — missing credential,
    /// provider error — just means no media context gets added.
    async fn interpret_media(
        &self,
        cancel: &CancellationToken,
        provider: &Arc<dyn Provider>,
        bot: &Bot,
        input: &BotInput,
    ) -> Option<String> {
        let media = input.media.as_ref()?;
        let api_key = self.config_store.resolve_credential(&bot.credentials_ref).await?;
        let language = input.language_hint.as_deref().unwrap_or("en");

        match provider
            .interpret(cancel, &api_key, &bot.model, &input.text, language, Some(media))
            .await
        {
            Ok((result, _usage)) => {
                let mut lines = Vec::new();
                lines.extend(result.transcriptions.iter().map(|t| format!("Transcription: {t}")));
                lines.extend(result.descriptions.iter().map(|d| format!("Image description: {d}")));
                lines.extend(result.document_summaries.iter().map(|d| format!("Document summary: {d}")));
                lines.extend(result.video_summaries.iter().map(|v| format!("Video summary: {v}")));
                if lines.is_empty() {
                    None
                } else {
                    Some(lines.join("\n"))
                }
            }
            Err(e) => {
                warn!(bot_id = %bot.id, error = %e, "multimodal interpretation failed, continuing text-only");
                None
            }
        }
    }

    /// Resolves the server a tool-call targets and invokes it, collapsing
    /// any MCP failure into an error tool-response so the conversation can
    /// continue rather than aborting the whole message.
    async fn invoke_tool(&self, bot_id: &str, call: &bot_core::types::ToolCall) -> bot_core::types::ToolResponse {
        let servers = self.config_store.mcp_servers_for_bot(bot_id).await;
        let server = servers.iter().find(|s| {
            self.mcp
                .cached_tools(&s.id)
                .map(|tools| tools.iter().any(|t| t.name == call.name))
                .unwrap_or(false)
        });

        let Some(server) = server else {
            return bot_core::types::ToolResponse {
                call_id: call.id.clone(),
                name: call.name.clone(),
                content: format!("no MCP server exposes tool \"{}\"", call.name),
                is_error: true,
            };
        };

        let headers = self.config_store.mcp_headers_for_bot(bot_id, &server.id).await;
        let request = CallToolRequest {
            server_id: server.id.clone(),
            tool_name: call.name.clone(),
            args: call.arguments.clone(),
        };

        match self.mcp.call_tool(server, request, &headers).await {
            Ok(result) => {
                if let Some(reporter) = &self.health {
                    reporter.report_success(bot_core::types::EntityType::Mcp, &server.id, "tool call ok");
                }
                let content = result
                    .content
                    .into_iter()
                    .map(|part| match part {
                        bot_mcp::ToolContentPart::Text { text } => text,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                bot_core::types::ToolResponse {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    content,
                    is_error: result.is_error,
                }
            }
            Err(e) => {
                if let Some(reporter) = &self.health {
                    reporter.report_failure(bot_core::types::EntityType::Mcp, &server.id, &e.to_string());
                }
                bot_core::types::ToolResponse {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: format!("tool call failed: {e}"),
                    is_error: true,
                }
            }
        }
    }

    /// Schedule delivery asynchronously when a transport is
    /// registered for the input's instance (so the caller returning early
    /// never aborts the humanizer run); otherwise run hooks synchronously
    /// on the caller's own context.
    fn dispatch(&self, bot: &Bot, input: &BotInput, output: BotOutput) {
        let Some(transport) = self.transports.get(&input.instance_id) else {
            self.hooks.run(&PostReplyContext {
                input: input.clone(),
                output,
                delivered: false,
            });
            return;
        };

        let humanizer = Arc::clone(&self.humanizer);
        let hooks = Arc::clone(&self.hooks);
        let input = input.clone();
        let bot_id = bot.id.clone();
        let chat_id = input.chat_id.clone();

        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let outcome = humanizer
                .run(Some(transport.as_ref()), &chat_id, &output.text, &cancel)
                .await;

            let delivered = match outcome {
                bot_humanizer::Outcome::Delivered => {
                    match transport.send_message(&chat_id, &output.text).await {
                        Ok(()) => {
                            info!(bot_id, chat_id, "outbound delivered");
                            true
                        }
                        Err(e) => {
                            warn!(bot_id, chat_id, error = %e, "outbound delivery failed");
                            false
                        }
                    }
                }
                bot_humanizer::Outcome::Aborted => {
                    debug!(bot_id, chat_id, "humanizer run aborted, skipping send");
                    false
                }
            };

            hooks.run(&PostReplyContext {
                input,
                output,
                delivered,
            });
        });
    }
}

/// Per-request volatile context: current time in the bot's
/// timezone plus any pending tasks carried on the input. Kept separate
/// from the cacheable system prompt + history prefix.
fn dynamic_context(bot: &Bot, input: &BotInput) -> String {
    let tz: chrono_tz::Tz = bot.timezone.parse().unwrap_or(chrono_tz::UTC);
    let now = Utc::now().with_timezone(&tz);
    let mut lines = vec![format!("Current time ({}): {}", bot.timezone, now.to_rfc3339())];
    if !input.pending_tasks.is_empty() {
        lines.push(format!("Pending tasks: {}", input.pending_tasks.join("; ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedConfigStore {
        bot: Option<Bot>,
    }

    #[async_trait]
    impl ConfigStore for FixedConfigStore {
        async fn get_bot(&self, _bot_id: &str) -> Option<Bot> {
            self.bot.clone()
        }
        async fn mcp_servers_for_bot(&self, _bot_id: &str) -> Vec<bot_mcp::McpServerRecord> {
            Vec::new()
        }
        async fn mcp_headers_for_bot(&self, _bot_id: &str, _server_id: &str) -> HashMap<String, String> {
            HashMap::new()
        }
        async fn resolve_credential(&self, _credentials_ref: &str) -> Option<String> {
            None
        }
    }

    fn sample_bot() -> Bot {
        Bot {
            id: "b1".into(),
            provider: "stub".into(),
            credentials_ref: "cred1".into(),
            model: "test-model".into(),
            system_prompt: "be nice".into(),
            knowledge_base: String::new(),
            memory_enabled: true,
            modalities: Default::default(),
            whitelist: Vec::new(),
            timezone: "UTC".into(),
        }
    }

    fn sample_input() -> BotInput {
        BotInput {
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
        }
    }

    #[tokio::test]
    async fn whitelist_mismatch_returns_empty_output_without_error() {
        let mut bot = sample_bot();
        bot.whitelist = vec!["bob".into()];
        let config_store: Arc<dyn ConfigStore> = Arc::new(FixedConfigStore { bot: Some(bot) });

        let engine = BotEngine::new(
            config_store,
            Arc::new(MemoryStore::new()),
            Arc::new(HookEngine::new()),
            Arc::new(TransportRegistry::new()),
            Arc::new(Humanizer::new(Default::default())),
            Arc::new(McpClient::new(false)),
            Arc::new(ContextCacheStore::new(None)),
            ProvidersConfig::default(),
            None,
            10,
        );

        let output = engine.process(CancellationToken::new(), sample_input()).await.unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn missing_bot_is_a_descriptive_error() {
        let config_store: Arc<dyn ConfigStore> = Arc::new(FixedConfigStore { bot: None });
        let engine = BotEngine::new(
            config_store,
            Arc::new(MemoryStore::new()),
            Arc::new(HookEngine::new()),
            Arc::new(TransportRegistry::new()),
            Arc::new(Humanizer::new(Default::default())),
            Arc::new(McpClient::new(false)),
            Arc::new(ContextCacheStore::new(None)),
            ProvidersConfig::default(),
            None,
            10,
        );

        let err = engine.process(CancellationToken::new(), sample_input()).await.unwrap_err();
        assert!(matches!(err, EngineError::BotNotFound(id) if id == "b1"));
    }
}
