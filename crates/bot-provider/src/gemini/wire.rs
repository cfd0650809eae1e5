//! Wire shapes for the Gemini `generateContent` / `cachedContents` REST
//! surfaces. Only the fields this adapter reads or writes are modeled;
//! everything else round-trips through `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "systemInstruction")]
    pub system_instruction: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "generationConfig")]
    pub generation_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "cachedContent")]
    pub cached_content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Value>,
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
    #[serde(rename = "safetyRatings", default)]
    pub safety_ratings: Vec<Value>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u32,
    #[serde(rename = "cachedContentTokenCount", default)]
    pub cached_content_token_count: u32,
}

/// Response from the `cachedContents` create/patch endpoints — only the
/// fields needed to populate a `ContextCacheEntry`.
#[derive(Debug, Deserialize)]
pub struct CachedContent {
    pub name: String,
    #[serde(rename = "expireTime")]
    pub expire_time: String,
}

/// Finish reasons the adapter treats as a normal stop.
pub fn is_acceptable_finish_reason(reason: &str) -> bool {
    matches!(reason, "STOP" | "MAX_TOKENS")
}

/// Maps an unacceptable Gemini finish reason to the coarse failure tag
/// callers log and surface.
pub fn map_finish_reason(reason: &str) -> &'static str {
    match reason {
        "SAFETY" => "safety",
        "RECITATION" => "recitation",
        _ => "other",
    }
}
