use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bot_core::types::{
    Bot, BotInput, CacheKind, ChatRequest, ChatResponse, ChatTurn, ContextCacheEntry, Media, Mindset, RawContent,
    ToolCall, Usage,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{bot_fingerprint, estimate_tokens, global_intuition_fingerprint, ContextCacheStore};
use crate::cache::store::{extension, initial_ttl};
use crate::error::{ProviderError, Result};
use crate::gemini::history::{dynamic_context_content, turn_to_content};
use crate::gemini::wire::{is_acceptable_finish_reason, map_finish_reason, CachedContent, GenerateContentRequest, GenerateContentResponse};
use crate::pricing::{estimate_cost_usd, gemini_price};
use crate::provider::{MultimodalResult, Provider};
use crate::retry::retry_on_503;
use crate::thinking::{thinking_config_for, CallKind, ThinkingConfig};

/// Estimated tokens-per-tool-declaration used for cache-eligibility sizing
///: the actual JSON Schema size varies, so a flat per-tool
/// estimate stands in for a full serialize-and-count pass.
const TOKENS_PER_TOOL_DECL: u32 = 150;
const CACHE_ELIGIBILITY_THRESHOLD: u32 = 4_000;

const FIXED_INTUITION_SYSTEM_PROMPT: &str = "You are a fast intent classifier. Given the latest message and recent \
history, decide the conversational pace, whether the user expects focused \
work, whether background work should continue, and whether a reply is \
warranted at all. Respond only with the requested structured fields.";

pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    cache: Arc<ContextCacheStore>,
}

impl GeminiAdapter {
    pub fn new(api_key: String, base_url: String, cache: Arc<ContextCacheStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            cache,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url.trim_end_matches('/'), model)
    }

    async fn post_generate(&self, model: &str, body: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let resp = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message: text });
        }
        resp.json::<GenerateContentResponse>().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn create_cache(&self, model: &str, system_prompt: &str, tools: &[Value], ttl: chrono::Duration) -> Result<CachedContent> {
        let mut body = json!({
            "model": format!("models/{model}"),
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "ttl": format!("{}s", ttl.num_seconds()),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        let url = format!("{}/v1beta/cachedContents", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message: text });
        }
        resp.json::<CachedContent>().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn extend_cache(&self, cache_name: &str, ttl: chrono::Duration) -> Result<CachedContent> {
        let url = format!("{}/v1beta/{}", self.base_url.trim_end_matches('/'), cache_name);
        let resp = self
            .client
            .patch(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({ "ttl": format!("{}s", ttl.num_seconds()) }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message: text });
        }
        resp.json::<CachedContent>().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    /// Resolves (or creates, or extends) the explicit context cache for a
    /// bot-scoped chat. Returns `None` when the request is
    /// below the eligibility threshold; a maturing sentinel is recorded in
    /// that case so operators can observe promotion progress.
    async fn resolve_bot_cache(&self, request: &ChatRequest, tool_decls: &[Value]) -> Result<Option<ContextCacheEntry>> {
        let estimated = estimate_tokens(&request.system_prompt) + TOKENS_PER_TOOL_DECL * tool_decls.len() as u32;
        if estimated < CACHE_ELIGIBILITY_THRESHOLD {
            self.cache
                .write_maturing_sentinel(&request.chat_key, &request.model, "gemini", Utc::now());
            return Ok(None);
        }

        let stable_prefix = json!(request.history.iter().map(turn_to_content).collect::<Vec<_>>());
        let fingerprint = bot_fingerprint(&request.chat_key, &request.system_prompt, &stable_prefix, &request.tools);
        let now = Utc::now();

        if let Some(entry) = self.cache.get_valid(&fingerprint, now) {
            if ContextCacheStore::needs_extension(&entry, now) {
                let extended = self.extend_cache(&entry.cache_name, extension()).await?;
                let new_entry = ContextCacheEntry {
                    expires_at: parse_expire_time(&extended.expire_time).unwrap_or(now + extension()),
                    ..entry
                };
                self.cache.insert(new_entry.clone());
                return Ok(Some(new_entry));
            }
            return Ok(Some(entry));
        }

        let created = self.create_cache(&request.model, &request.system_prompt, tool_decls, initial_ttl()).await?;
        let entry = ContextCacheEntry {
            cache_name: created.name,
            expires_at: parse_expire_time(&created.expire_time).unwrap_or(now + initial_ttl()),
            model: request.model.clone(),
            provider: "gemini".into(),
            scope: request.chat_key.clone(),
            fingerprint: fingerprint.clone(),
            stored_content_hash: fingerprint,
            kind: CacheKind::Bot,
        };
        self.cache.insert(entry.clone());
        Ok(Some(entry))
    }

    /// Resolves the global intuition cache, creating it under a
    /// distributed lock if absent.
    async fn resolve_intuition_cache(&self, model: &str) -> Option<ContextCacheEntry> {
        let fingerprint = global_intuition_fingerprint(model);
        let now = Utc::now();
        if let Some(entry) = self.cache.get_valid(&fingerprint, now) {
            if ContextCacheStore::needs_extension(&entry, now) {
                if let Ok(extended) = self.extend_cache(&entry.cache_name, extension()).await {
                    let new_entry = ContextCacheEntry {
                        expires_at: parse_expire_time(&extended.expire_time).unwrap_or(now + extension()),
                        ..entry
                    };
                    self.cache.insert(new_entry.clone());
                    return Some(new_entry);
                }
            }
            return Some(entry);
        }

        let lock_name = format!("lock:{fingerprint}");
        if !self.cache.try_lock(&lock_name, Duration::from_secs(10)).await {
            // Lost the race; another instance is creating it. Proceed
            // uncached this round rather than blocking the reply.
            return None;
        }
        let result = self.create_cache(model, FIXED_INTUITION_SYSTEM_PROMPT, &[], initial_ttl()).await;
        self.cache.unlock(&lock_name).await;
        match result {
            Ok(created) => {
                let entry = ContextCacheEntry {
                    cache_name: created.name,
                    expires_at: parse_expire_time(&created.expire_time).unwrap_or(now + initial_ttl()),
                    model: model.to_string(),
                    provider: "gemini".into(),
                    scope: format!("global:intuition:{model}"),
                    fingerprint: fingerprint.clone(),
                    stored_content_hash: fingerprint,
                    kind: CacheKind::Global,
                };
                self.cache.insert(entry.clone());
                Some(entry)
            }
            Err(err) => {
                warn!(%err, "failed to create intuition cache, proceeding uncached");
                None
            }
        }
    }

    fn usage_from(&self, model: &str, request: &ChatRequest, resp: &GenerateContentResponse) -> Usage {
        let meta = resp.usage_metadata.as_ref();
        let input_tokens = meta.map(|m| m.prompt_token_count).unwrap_or(0);
        let output_tokens = meta.map(|m| m.candidates_token_count).unwrap_or(0);
        let cached_tokens = meta.map(|m| m.cached_content_token_count).unwrap_or(0);
        let price = gemini_price(model);
        Usage {
            input_tokens,
            output_tokens,
            cached_tokens,
            estimated_system_tokens: estimate_tokens(&request.system_prompt),
            estimated_user_tokens: estimate_tokens(&request.user_text),
            estimated_history_tokens: request.history.iter().map(|t| estimate_tokens(&t.text)).sum(),
            cost_usd: estimate_cost_usd(price, input_tokens, cached_tokens, output_tokens),
        }
    }
}

fn parse_expire_time(value: &str) -> Option<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(value).ok().map(|d| d.with_timezone(&Utc))
}

fn tool_decls(request: &ChatRequest) -> Vec<Value> {
    if request.tools.is_empty() {
        return Vec::new();
    }
    vec![json!({
        "functionDeclarations": request.tools.iter().map(|t| json!({
            "name": t.name,
            "description": t.description,
            "parameters": t.input_schema,
        })).collect::<Vec<_>>()
    })]
}

fn apply_thinking_config(generation_config: &mut Value, config: ThinkingConfig) {
    let thinking = match config {
        ThinkingConfig::Level(level) => json!({ "thinkingLevel": level }),
        ThinkingConfig::Budget(budget) => json!({ "thinkingBudget": budget }),
    };
    generation_config["thinkingConfig"] = thinking;
}

fn parse_candidate(candidate_content: &Value) -> (String, Vec<ToolCall>) {
    let mut text = String::new();
    let mut calls = Vec::new();
    if let Some(parts) = candidate_content.get("parts").and_then(|p| p.as_array()) {
        for (i, part) in parts.iter().enumerate() {
            if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                text.push_str(t);
            } else if let Some(fc) = part.get("functionCall") {
                calls.push(ToolCall {
                    id: format!("call_{i}"),
                    name: fc.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string(),
                    arguments: fc.get("args").cloned().unwrap_or(json!({})),
                });
            }
        }
    }
    (text, calls)
}

#[async_trait]
impl Provider for GeminiAdapter {
    fn tag(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, cancel: &CancellationToken, _bot: &Bot, request: ChatRequest) -> Result<ChatResponse> {
        let decls = tool_decls(&request);
        let cache_entry = self.resolve_bot_cache(&request, &decls).await.unwrap_or_else(|err| {
            warn!(%err, "context cache resolution failed, proceeding uncached");
            None
        });

        let mut contents: Vec<Value> = Vec::new();
        if let Some(dyn_ctx) = dynamic_context_content(&request.dynamic_context) {
            contents.push(dyn_ctx);
        }
        for turn in &request.history {
            contents.push(turn_to_content(&turn.clone().for_provider("gemini")));
        }
        contents.push(json!({ "role": "user", "parts": [{ "text": request.user_text }] }));

        let mut generation_config = json!({});
        if let Some(cfg) = thinking_config_for(&request.model, CallKind::Chat) {
            apply_thinking_config(&mut generation_config, cfg);
        }

        let (system_instruction, tools, cached_content) = match &cache_entry {
            Some(entry) => (None, Vec::new(), Some(entry.cache_name.clone())),
            None => (
                Some(json!({ "parts": [{ "text": request.system_prompt }] })),
                decls.clone(),
                None,
            ),
        };

        let body = GenerateContentRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(generation_config),
            cached_content,
        };

        let model = request.model.clone();
        let req_ref = &request;
        let resp = retry_on_503(cancel, || async {
            let body = &body;
            let gen_resp = self.post_generate(&model, body).await?;
            let candidate = gen_resp
                .candidates
                .first()
                .ok_or_else(|| ProviderError::Parse("no candidates in response".into()))?;
            if let Some(reason) = &candidate.finish_reason {
                if !is_acceptable_finish_reason(reason) {
                    warn!(reason, safety_ratings = ?candidate.safety_ratings, "gemini candidate did not finish normally");
                    return Err(ProviderError::Api {
                        status: 0,
                        message: format!("finish_reason:{}", map_finish_reason(reason)),
                    });
                }
            }
            let (text, tool_calls) = candidate
                .content
                .as_ref()
                .map(parse_candidate)
                .unwrap_or_default();
            let raw_content = candidate.content.clone().map(|payload| RawContent {
                provider_tag: "gemini".into(),
                payload,
            });
            Ok(ChatResponse {
                text,
                raw_content,
                tool_calls,
                usage: self.usage_from(&model, req_ref, &gen_resp),
            })
        })
        .await;

        resp
    }

    async fn interpret(
        &self,
        cancel: &CancellationToken,
        api_key: &str,
        model: &str,
        user_text: &str,
        language: &str,
        media: Option<&Media>,
    ) -> Result<(MultimodalResult, Usage)> {
        let Some(media) = media else {
            return Ok((MultimodalResult::default(), Usage::default()));
        };

        let prompt = format!(
            "Describe or transcribe the attached media in {language}. User context: {user_text}"
        );
        let contents = vec![json!({
            "role": "user",
            "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": media.mime_type, "data": base64_encode(&media.bytes) } },
            ]
        })];
        let body = GenerateContentRequest {
            contents,
            system_instruction: None,
            tools: Vec::new(),
            generation_config: None,
            cached_content: None,
        };

        let adhoc = GeminiAdapter::new(api_key.to_string(), self.base_url.clone(), self.cache.clone());
        let model_owned = model.to_string();
        let gen_resp = tokio::select! {
            r = adhoc.post_generate(&model_owned, &body) => r?,
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };

        let (text, _) = gen_resp
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(parse_candidate)
            .unwrap_or_default();

        let mut result = MultimodalResult::default();
        if media.mime_type.starts_with("audio/") {
            result.transcriptions.push(text);
        } else if media.mime_type.starts_with("image/") {
            result.descriptions.push(text);
        } else if media.mime_type.starts_with("video/") {
            result.video_summaries.push(text);
        } else {
            result.document_summaries.push(text);
        }

        let usage = Usage {
            input_tokens: gen_resp.usage_metadata.as_ref().map(|m| m.prompt_token_count).unwrap_or(0),
            output_tokens: gen_resp.usage_metadata.as_ref().map(|m| m.candidates_token_count).unwrap_or(0),
            ..Usage::default()
        };
        Ok((result, usage))
    }

    async fn pre_analyze_mindset(
        &self,
        cancel: &CancellationToken,
        bot: &Bot,
        input: &BotInput,
        history: &[ChatTurn],
    ) -> Result<(Mindset, Usage)> {
        let cache_entry = self.resolve_intuition_cache(&bot.model).await;

        let mut contents: Vec<Value> = history.iter().map(turn_to_content).collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": input.text }] }));

        let mut generation_config = json!({});
        if let Some(cfg) = thinking_config_for(&bot.model, CallKind::Intuition) {
            apply_thinking_config(&mut generation_config, cfg);
        }

        let (system_instruction, cached_content) = match &cache_entry {
            Some(entry) => (None, Some(entry.cache_name.clone())),
            None => (Some(json!({ "parts": [{ "text": FIXED_INTUITION_SYSTEM_PROMPT }] })), None),
        };

        let body = GenerateContentRequest {
            contents,
            system_instruction,
            tools: Vec::new(),
            generation_config: Some(generation_config),
            cached_content,
        };

        let model = bot.model.clone();
        let result = tokio::select! {
            r = self.post_generate(&model, &body) => r,
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };

        let result = match result {
            Err(err) if cache_entry.is_some() && is_stale_cache_error(&err) => {
                if let Some(entry) = &cache_entry {
                    self.cache.remove(&entry.fingerprint);
                }
                debug!(%err, "intuition cache handle stale, retrying uncached");
                let uncached_body = GenerateContentRequest {
                    system_instruction: Some(json!({ "parts": [{ "text": FIXED_INTUITION_SYSTEM_PROMPT }] })),
                    cached_content: None,
                    ..body
                };
                tokio::select! {
                    r = self.post_generate(&model, &uncached_body) => r,
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                }
            }
            other => other,
        };

        let gen_resp = result?;
        let (text, _) = gen_resp
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(parse_candidate)
            .unwrap_or_default();
        let mindset = parse_mindset(&text).unwrap_or_else(Mindset::fallback);
        let usage = Usage {
            input_tokens: gen_resp.usage_metadata.as_ref().map(|m| m.prompt_token_count).unwrap_or(0),
            output_tokens: gen_resp.usage_metadata.as_ref().map(|m| m.candidates_token_count).unwrap_or(0),
            ..Usage::default()
        };
        Ok((mindset, usage))
    }
}

/// Heuristic for a provider rejecting a cache handle that has since expired
/// or been evicted server-side, as opposed to a genuine request failure.
fn is_stale_cache_error(err: &ProviderError) -> bool {
    let message = err.to_string();
    message.contains("cached") || message.contains("not found")
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn parse_mindset(text: &str) -> Option<Mindset> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_decls_empty_for_no_tools() {
        let request = ChatRequest {
            chat_key: "c".into(),
            system_prompt: "s".into(),
            dynamic_context: String::new(),
            user_text: "hi".into(),
            history: vec![],
            tools: vec![],
            model: "gemini-2.5-flash".into(),
            bot_id: "b".into(),
        };
        assert!(tool_decls(&request).is_empty());
    }

    #[test]
    fn parse_candidate_splits_text_and_calls() {
        let content = json!({
            "parts": [
                { "text": "part one" },
                { "functionCall": { "name": "lookup", "args": { "q": "x" } } },
            ]
        });
        let (text, calls) = parse_candidate(&content);
        assert_eq!(text, "part one");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup");
    }
}
