use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, warn};

use bot_core::types::ToolSpec;

use crate::error::{McpError, Result};
use crate::types::{
    CallToolRequest, ConnectionType, ListToolsOutcome, McpServerRecord, ServerKind, ToolCallResult,
    ToolContentPart,
};

const INIT_RETRIES: u32 = 5;
const INIT_RETRY_DELAY: Duration = Duration::from_millis(500);
/// Upstream MCP protocol version constant.
const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

/// Discovers and invokes remote tools for a bot. The transport wire
/// format (SSE vs HTTP-streaming framing) is delegated to the upstream
/// protocol and is delegated entirely upstream — this
/// facade only exposes `ListTools`/`CallTool`/`Validate`.
pub struct McpClient {
    http: reqwest::Client,
    allow_plaintext_http: bool,
    tool_cache: DashMap<String, Vec<ToolSpec>>,
}

impl McpClient {
    pub fn new(allow_plaintext_http: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            allow_plaintext_http,
            tool_cache: DashMap::new(),
        }
    }

    /// Opens a client per `connection_type`, initializes
    /// with bounded retry tolerating transient 404/"session" errors, list
    /// tools, and cache the result back onto the server record.
    pub async fn list_tools(&self, server: &McpServerRecord) -> Result<ListToolsOutcome> {
        self.guard_transport(server)?;

        self.initialize_with_retry(server).await?;
        let tools = self.request_tool_list(server).await?;

        self.tool_cache.insert(server.id.clone(), tools.clone());
        debug!(server = %server.id, count = tools.len(), "MCP tool list cached");
        Ok(ListToolsOutcome { tools })
    }

    /// Cached tools for `server_id`, if `list_tools` has run at least once.
    pub fn cached_tools(&self, server_id: &str) -> Option<Vec<ToolSpec>> {
        self.tool_cache.get(server_id).map(|v| v.clone())
    }

    /// Same session setup as `list_tools`, with per-bot
    /// custom headers (decrypted by the caller) merged over the server's
    /// own headers before the call.
    pub async fn call_tool(
        &self,
        server: &McpServerRecord,
        request: CallToolRequest,
        bot_headers: &HashMap<String, String>,
    ) -> Result<ToolCallResult> {
        self.guard_transport(server)?;
        self.initialize_with_retry(server).await?;

        let mut headers = server.headers.clone();
        headers.extend(bot_headers.clone());

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": request.tool_name,
                "arguments": request.args,
            }
        });

        let resp = self
            .post(server, &headers, &body)
            .await
            .map_err(|e| McpError::CallFailed(e.to_string()))?;

        parse_tool_call_result(resp)
    }

    /// Templates only need a reachability probe (any
    /// non-404 status); operational servers must complete a full
    /// initialize + tool-list round-trip.
    pub async fn validate(&self, server: &McpServerRecord) -> Result<()> {
        self.guard_transport(server)?;

        match server.kind {
            ServerKind::Template => {
                let resp = self
                    .http
                    .get(&server.base_url)
                    .send()
                    .await
                    .map_err(|e| McpError::ProbeFailed(e.to_string()))?;
                if resp.status().as_u16() == 404 {
                    return Err(McpError::ProbeFailed(format!(
                        "server {} returned 404",
                        server.id
                    )));
                }
                Ok(())
            }
            ServerKind::Operational => {
                self.initialize_with_retry(server).await?;
                self.request_tool_list(server).await?;
                Ok(())
            }
        }
    }

    fn guard_transport(&self, server: &McpServerRecord) -> Result<()> {
        if server.base_url.starts_with("http://") && !self.allow_plaintext_http {
            return Err(McpError::PlaintextRejected(server.id.clone()));
        }
        Ok(())
    }

    async fn initialize_with_retry(&self, server: &McpServerRecord) -> Result<()> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
            }
        });

        let mut last_err = None;
        for attempt in 1..=INIT_RETRIES {
            match self.post(server, &server.headers, &body).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    let msg = e.to_string();
                    let transient = msg.contains("404") || msg.contains("session");
                    if !transient || attempt == INIT_RETRIES {
                        return Err(McpError::InitializeFailed(msg));
                    }
                    warn!(server = %server.id, attempt, error = %msg, "MCP initialize retrying");
                    last_err = Some(msg);
                    tokio::time::sleep(INIT_RETRY_DELAY).await;
                }
            }
        }
        Err(McpError::InitializeFailed(
            last_err.unwrap_or_else(|| "exhausted retries".to_string()),
        ))
    }

    async fn request_tool_list(&self, server: &McpServerRecord) -> Result<Vec<ToolSpec>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/list",
            "params": {}
        });
        let resp = self
            .post(server, &server.headers, &body)
            .await
            .map_err(|e| McpError::ListToolsFailed(e.to_string()))?;

        let tools = resp
            .get("result")
            .and_then(|r| r.get("tools"))
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        tools
            .into_iter()
            .map(|t| {
                Ok(ToolSpec {
                    name: t
                        .get("name")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| McpError::ListToolsFailed("tool missing name".into()))?
                        .to_string(),
                    description: t
                        .get("description")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    input_schema: t.get("inputSchema").cloned().unwrap_or(json!({})),
                })
            })
            .collect()
    }

    async fn post(
        &self,
        server: &McpServerRecord,
        headers: &HashMap<String, String>,
        body: &Value,
    ) -> std::result::Result<Value, reqwest::Error> {
        let mut req = self.http.post(&server.base_url).json(body);
        if server.connection_type == ConnectionType::Sse {
            req = req.header("accept", "text/event-stream");
        }
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        resp.error_for_status_ref()?;
        resp.json::<Value>().await
    }
}

fn parse_tool_call_result(resp: Value) -> Result<ToolCallResult> {
    let result = resp.get("result").cloned().unwrap_or(json!({}));
    let is_error = result
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let content = result
        .get("content")
        .and_then(|c| c.as_array())
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|part| ToolContentPart::Text {
            text: part
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    Ok(ToolCallResult { content, is_error })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(base_url: &str, connection_type: ConnectionType) -> McpServerRecord {
        McpServerRecord {
            id: "srv1".into(),
            name: "test".into(),
            base_url: base_url.into(),
            connection_type,
            kind: ServerKind::Operational,
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn plaintext_http_rejected_without_dev_override() {
        let client = McpClient::new(false);
        let server = server("http://example.test/mcp", ConnectionType::HttpStreaming);
        let err = client.list_tools(&server).await.unwrap_err();
        assert!(matches!(err, McpError::PlaintextRejected(_)));
    }

    #[tokio::test]
    async fn plaintext_http_allowed_with_dev_override() {
        let client = McpClient::new(true);
        let server = server("http://example.test/mcp", ConnectionType::HttpStreaming);
        // guard passes; the subsequent network call will fail since nothing
        // is listening, which is a different (non-plaintext) error kind.
        let err = client.list_tools(&server).await.unwrap_err();
        assert!(!matches!(err, McpError::PlaintextRejected(_)));
    }

    #[test]
    fn parses_tool_call_result_content() {
        let resp = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "isError": false,
                "content": [{"type": "text", "text": "shipped"}]
            }
        });
        let result = parse_tool_call_result(resp).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
        match &result.content[0] {
            ToolContentPart::Text { text } => assert_eq!(text, "shipped"),
        }
    }
}
