use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bot_core::types::Bot;
use bot_engine::ConfigStore;
use bot_mcp::McpServerRecord;
use bot_transport::error::TransportError;
use bot_transport::Transport;

/// In-memory `Transport` that records every send instead of talking to a
/// real chat network. Used by the gateway's own smoke tests to drive
/// `BotEngine::process` end to end — no production transport
/// ships in this crate.
pub struct StubTransport {
    id: String,
    sent_messages: Mutex<Vec<(String, String)>>,
    presence: Mutex<Vec<(String, bool)>>,
}

impl StubTransport {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            sent_messages: Mutex::new(Vec::new()),
            presence: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn presence_toggles(&self) -> Vec<(String, bool)> {
        self.presence.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        self.sent_messages
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_presence(&self, chat_id: &str, is_typing: bool) -> Result<(), TransportError> {
        self.presence.lock().unwrap().push((chat_id.to_string(), is_typing));
        Ok(())
    }
}

/// In-memory `ConfigStore` seeded at construction time. Stands in for a
/// real bot-definition database; the
/// gateway's `serve` command never registers a real one today, so this is
/// also what the binary runs against until a production store exists.
#[derive(Default)]
pub struct InMemoryConfigStore {
    bots: HashMap<String, Bot>,
    mcp_servers: HashMap<String, Vec<McpServerRecord>>,
    mcp_headers: HashMap<(String, String), HashMap<String, String>>,
    credentials: HashMap<String, String>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot(mut self, bot: Bot) -> Self {
        self.bots.insert(bot.id.clone(), bot);
        self
    }

    pub fn with_mcp_servers(mut self, bot_id: impl Into<String>, servers: Vec<McpServerRecord>) -> Self {
        self.mcp_servers.insert(bot_id.into(), servers);
        self
    }

    pub fn with_credential(mut self, credentials_ref: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials.insert(credentials_ref.into(), secret.into());
        self
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_bot(&self, bot_id: &str) -> Option<Bot> {
        self.bots.get(bot_id).cloned()
    }

    async fn mcp_servers_for_bot(&self, bot_id: &str) -> Vec<McpServerRecord> {
        self.mcp_servers.get(bot_id).cloned().unwrap_or_default()
    }

    async fn mcp_headers_for_bot(&self, bot_id: &str, server_id: &str) -> HashMap<String, String> {
        self.mcp_headers
            .get(&(bot_id.to_string(), server_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    async fn resolve_credential(&self, credentials_ref: &str) -> Option<String> {
        self.credentials.get(credentials_ref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::types::ModalityFlags;

    fn test_bot() -> Bot {
        Bot {
            id: "bot-1".into(),
            provider: "gemini".into(),
            credentials_ref: "cred-1".into(),
            model: "gemini-2.5-flash".into(),
            system_prompt: "be terse".into(),
            knowledge_base: String::new(),
            memory_enabled: true,
            modalities: ModalityFlags::default(),
            whitelist: vec![],
            timezone: "UTC".into(),
        }
    }

    #[tokio::test]
    async fn stub_transport_records_sends() {
        let transport = StubTransport::new("inst-1");
        transport.send_message("chat-1", "hi").await.unwrap();
        transport.send_presence("chat-1", true).await.unwrap();
        assert_eq!(transport.sent_messages(), vec![("chat-1".to_string(), "hi".to_string())]);
        assert_eq!(transport.presence_toggles(), vec![("chat-1".to_string(), true)]);
    }

    #[tokio::test]
    async fn config_store_returns_seeded_bot() {
        let store = InMemoryConfigStore::new().with_bot(test_bot());
        assert!(store.get_bot("bot-1").await.is_some());
        assert!(store.get_bot("missing").await.is_none());
    }

    #[tokio::test]
    async fn config_store_resolves_credential() {
        let store = InMemoryConfigStore::new().with_credential("cred-1", "sk-secret");
        assert_eq!(store.resolve_credential("cred-1").await, Some("sk-secret".to_string()));
        assert_eq!(store.resolve_credential("missing").await, None);
    }
}
