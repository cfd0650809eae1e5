use std::collections::HashMap;

use bot_core::types::ToolSpec;
use serde::{Deserialize, Serialize};

/// Transport kind a server record is configured with. Stdio is
/// intentionally not a variant here — it is forbidden outright, so a
/// server record claiming stdio is rejected at construction rather than
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Sse,
    HttpStreaming,
}

/// Whether a server record is a reusable template (only probed for
/// reachability) or a fully operational server a bot actually calls tools
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Template,
    Operational,
}

#[derive(Debug, Clone)]
pub struct McpServerRecord {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub connection_type: ConnectionType,
    pub kind: ServerKind,
    /// Headers stored on the server record itself (already decrypted by
    /// the config store before reaching this crate).
    pub headers: HashMap<String, String>,
}

/// A single tool invocation request.
#[derive(Debug, Clone)]
pub struct CallToolRequest {
    pub server_id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ToolContentPart {
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContentPart>,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![ToolContentPart::Text { text: text.into() }],
            is_error,
        }
    }
}

/// What `ListTools` returns before it's cached back onto the server record
/// by the config store (outside this crate's scope).
#[derive(Debug, Clone)]
pub struct ListToolsOutcome {
    pub tools: Vec<ToolSpec>,
}
