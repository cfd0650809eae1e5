use async_trait::async_trait;
use bot_core::types::{Bot, BotInput, ChatRequest, ChatResponse, ChatTurn, Media, Mindset, RawContent, Role, ToolCall, Usage};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{estimate_tokens, ContextCacheStore};
use crate::error::{ProviderError, Result};
use crate::pricing::{estimate_cost_usd, openai_price};
use crate::provider::{MultimodalResult, Provider};
use crate::retry::retry_on_503;

/// OpenAI chat-completions adapter. No explicit context-cache API exists on
/// this provider family, so cache eligibility is always a no-op maturing
/// sentinel write (never a cache-create RPC) — it still participates in
/// fingerprinting/maturation bookkeeping so operators see consistent
/// promotion signals across providers.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    cache: Arc<ContextCacheStore>,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, base_url: String, cache: Arc<ContextCacheStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            cache,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn post_chat(&self, body: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message: text });
        }
        resp.json::<Value>().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

fn turn_to_message(turn: &ChatTurn) -> Vec<Value> {
    if !turn.tool_calls.is_empty() {
        return vec![json!({
            "role": "assistant",
            "content": if turn.text.is_empty() { Value::Null } else { json!(turn.text) },
            "tool_calls": turn.tool_calls.iter().map(|c| json!({
                "id": c.id,
                "type": "function",
                "function": { "name": c.name, "arguments": c.arguments.to_string() },
            })).collect::<Vec<_>>(),
        })];
    }
    if !turn.tool_responses.is_empty() {
        return turn
            .tool_responses
            .iter()
            .map(|resp| {
                json!({
                    "role": "tool",
                    "tool_call_id": resp.call_id,
                    "content": resp.content,
                })
            })
            .collect();
    }
    let role = match turn.role {
        Role::Assistant => "assistant",
        _ => "user",
    };
    vec![json!({ "role": role, "content": turn.text })]
}

fn build_messages(request: &ChatRequest) -> Vec<Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": format!("{}\n\n{}", request.system_prompt, request.dynamic_context).trim(),
    })];
    for turn in &request.history {
        messages.extend(turn_to_message(&turn.clone().for_provider("openai")));
    }
    messages.push(json!({ "role": "user", "content": request.user_text }));
    messages
}

fn build_tools(request: &ChatRequest) -> Vec<Value> {
    request
        .tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": { "name": t.name, "description": t.description, "parameters": t.input_schema },
            })
        })
        .collect()
}

fn parse_choice(value: &Value) -> (String, Vec<ToolCall>) {
    let message = &value["choices"][0]["message"];
    let text = message.get("content").and_then(|c| c.as_str()).unwrap_or_default().to_string();
    let calls = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .map(|arr| {
            arr.iter()
                .map(|c| ToolCall {
                    id: c["id"].as_str().unwrap_or_default().to_string(),
                    name: c["function"]["name"].as_str().unwrap_or_default().to_string(),
                    arguments: serde_json::from_str(c["function"]["arguments"].as_str().unwrap_or("{}")).unwrap_or(json!({})),
                })
                .collect()
        })
        .unwrap_or_default();
    (text, calls)
}

fn usage_from(model: &str, request: &ChatRequest, value: &Value) -> Usage {
    let input_tokens = value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32;
    let output_tokens = value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;
    let cached_tokens = value["usage"]["prompt_tokens_details"]["cached_tokens"].as_u64().unwrap_or(0) as u32;
    let price = openai_price(model);
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

#[async_trait]
impl Provider for OpenAiAdapter {
    fn tag(&self) -> &str {
        "openai"
    }

    async fn chat(&self, cancel: &CancellationToken, _bot: &Bot, request: ChatRequest) -> Result<ChatResponse> {
        // No explicit cache RPC on this provider family; still record a
        // maturing sentinel so promotion signals stay consistent with the
        // Gemini adapter's bookkeeping.
        self.cache
            .write_maturing_sentinel(&request.chat_key, &request.model, "openai", Utc::now());

        let body = json!({
            "model": request.model,
            "messages": build_messages(&request),
            "tools": build_tools(&request),
        });

        let model = request.model.clone();
        let req_ref = &request;
        retry_on_503(cancel, || async {
            let value = self.post_chat(&body).await?;
            let (text, tool_calls) = parse_choice(&value);
            let raw_content = value["choices"][0]["message"].as_object().map(|_| RawContent {
                provider_tag: "openai".into(),
                payload: value["choices"][0]["message"].clone(),
            });
            Ok(ChatResponse {
                text,
                raw_content,
                tool_calls,
                usage: usage_from(&model, req_ref, &value),
            })
        })
        .await
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

        let prompt = format!("Describe or transcribe the attached media in {language}. User context: {user_text}");
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": format!("data:{};base64,{}", media.mime_type, base64_encode(&media.bytes)) } },
                ],
            }],
        });

        let adhoc = OpenAiAdapter::new(api_key.to_string(), self.base_url.clone(), self.cache.clone());
        let value = tokio::select! {
            r = adhoc.post_chat(&body) => r?,
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };
        let (text, _) = parse_choice(&value);

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
            input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
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
        self.cache.write_maturing_sentinel(
            &format!("global:intuition:{}", bot.model),
            &bot.model,
            "openai",
            Utc::now(),
        );

        let mut messages = vec![json!({
            "role": "system",
            "content": "You are a fast intent classifier. Respond only with the requested structured fields.",
        })];
        for turn in history {
            messages.extend(turn_to_message(&turn.clone().for_provider("openai")));
        }
        messages.push(json!({ "role": "user", "content": input.text }));

        let body = json!({ "model": bot.model, "messages": messages });
        let result = tokio::select! {
            r = self.post_chat(&body) => r,
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };

        match result {
            Ok(value) => {
                let (text, _) = parse_choice(&value);
                let mindset = serde_json::from_str(text.trim()).unwrap_or_else(|_| Mindset::fallback());
                let usage = Usage {
                    input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                    output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
                    ..Usage::default()
                };
                Ok((mindset, usage))
            }
            Err(err) => {
                debug!(%err, "mindset pre-analysis failed, falling back to steady/respond");
                Ok((Mindset::fallback(), Usage::default()))
            }
        }
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::types::ToolSpec;

    #[test]
    fn build_messages_includes_system_and_user() {
        let request = ChatRequest {
            chat_key: "c".into(),
            system_prompt: "be helpful".into(),
            dynamic_context: String::new(),
            user_text: "hi".into(),
            history: vec![],
            tools: vec![],
            model: "gpt-4o-mini".into(),
            bot_id: "b".into(),
        };
        let messages = build_messages(&request);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages.last().unwrap()["content"], "hi");
    }

    #[test]
    fn build_tools_maps_tool_specs() {
        let request = ChatRequest {
            chat_key: "c".into(),
            system_prompt: "s".into(),
            dynamic_context: String::new(),
            user_text: "hi".into(),
            history: vec![],
            tools: vec![ToolSpec {
                name: "lookup".into(),
                description: "look things up".into(),
                input_schema: json!({"type": "object"}),
            }],
            model: "gpt-4o-mini".into(),
            bot_id: "b".into(),
        };
        let tools = build_tools(&request);
        assert_eq!(tools[0]["function"]["name"], "lookup");
    }

    #[test]
    fn parse_choice_extracts_tool_calls() {
        let value = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "lookup", "arguments": "{\"q\":\"x\"}" },
                    }],
                },
            }],
        });
        let (text, calls) = parse_choice(&value);
        assert_eq!(text, "");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup");
    }
}
