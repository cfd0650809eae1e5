use async_trait::async_trait;
use bot_core::types::{Bot, BotInput, ChatRequest, ChatResponse, ChatTurn, Media, Mindset, Usage};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Parallel transcription/description arrays returned from a multimodal
/// pre-processing pass, one slot per medium that was actually present in
/// the request (never sparse — a medium that wasn't attached contributes
/// no entry rather than a placeholder).
#[derive(Debug, Clone, Default)]
pub struct MultimodalResult {
    pub transcriptions: Vec<String>,
    pub descriptions: Vec<String>,
    pub document_summaries: Vec<String>,
    pub video_summaries: Vec<String>,
}

/// Contract every adapter (Gemini, OpenAI) must satisfy. The engine never
/// matches on the concrete adapter type — tool-loop re-entry, history
/// assembly, and delivery scheduling are all written against this trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short tag identifying this provider in `RawContent` and cache
    /// fingerprints (e.g. "gemini", "openai").
    fn tag(&self) -> &str;

    /// A single round-trip that may return text, tool-calls, or both. The
    /// engine re-enters this call with an augmented history after running
    /// any returned tool-calls; see the tool-loop iteration cap in the
    /// engine crate.
    async fn chat(&self, cancel: &CancellationToken, bot: &Bot, request: ChatRequest) -> Result<ChatResponse>;

    /// Multimodal pre-processing: transcribe/describe/summarize whatever
    /// media is attached. Safe to call with no media; returns an empty
    /// result rather than erroring.
    async fn interpret(
        &self,
        cancel: &CancellationToken,
        api_key: &str,
        model: &str,
        user_text: &str,
        language: &str,
        media: Option<&Media>,
    ) -> Result<(MultimodalResult, Usage)>;

    /// Lightweight intent classification. Callers treat any error here as
    /// non-critical and fall back to `Mindset::fallback()`.
    async fn pre_analyze_mindset(
        &self,
        cancel: &CancellationToken,
        bot: &Bot,
        input: &BotInput,
        history: &[ChatTurn],
    ) -> Result<(Mindset, Usage)>;
}
