use std::sync::Arc;
use std::time::Duration;

use bot_core::types::{EntityType, HealthRecord, HealthStatus};
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::reporter::HealthReporter;
use crate::validators::{BotValidator, ChannelValidator, CredentialValidator, McpValidator, WorkspaceValidator};

/// Rate-limit pacing for `CheckAll`.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckIntervals {
    pub mcp_check_interval: Duration,
    pub credential_check_interval: Duration,
    pub periodic_check_interval: Duration,
}

impl Default for HealthCheckIntervals {
    fn default() -> Self {
        Self {
            mcp_check_interval: Duration::from_secs(2),
            credential_check_interval: Duration::from_millis(200),
            periodic_check_interval: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// Per-entity availability with dependency propagation. The
/// concrete MCP/credential/bot/workspace/channel validation logic is
/// injected via traits so this crate never depends on `bot-mcp` or
/// `bot-provider` directly.
pub struct HealthMonitor {
    records: DashMap<(EntityType, String), HealthRecord>,
    /// Reverse index: MCP server id -> bot ids that use it, so
    /// `ReportFailure`/`ReportSuccess` on an MCP can re-evaluate dependents
    ///.
    bot_mcp_index: DashMap<String, Vec<String>>,
    intervals: HealthCheckIntervals,
    mcp: Arc<dyn McpValidator>,
    credential: Arc<dyn CredentialValidator>,
    bot: Arc<dyn BotValidator>,
    workspace: Arc<dyn WorkspaceValidator>,
    channel: Arc<dyn ChannelValidator>,
}

impl HealthMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        intervals: HealthCheckIntervals,
        mcp: Arc<dyn McpValidator>,
        credential: Arc<dyn CredentialValidator>,
        bot: Arc<dyn BotValidator>,
        workspace: Arc<dyn WorkspaceValidator>,
        channel: Arc<dyn ChannelValidator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            records: DashMap::new(),
            bot_mcp_index: DashMap::new(),
            intervals,
            mcp,
            credential,
            bot,
            workspace,
            channel,
        })
    }

    /// Records which MCP servers a bot depends on, so MCP failures can
    /// fan out to the bots that use them.
    pub fn register_bot_mcp_usage(&self, bot_id: &str, mcp_server_ids: Vec<String>) {
        for server_id in &mcp_server_ids {
            self.bot_mcp_index
                .entry(server_id.clone())
                .or_default()
                .push(bot_id.to_string());
        }
    }

    pub fn get(&self, entity_type: EntityType, entity_id: &str) -> Option<HealthRecord> {
        self.records
            .get(&(entity_type, entity_id.to_string()))
            .map(|r| r.clone())
    }

    pub async fn check_mcp(self: &Arc<Self>, server_id: &str) {
        let result = self.mcp.validate(server_id).await;
        self.upsert_from_result(EntityType::Mcp, server_id, server_id, result);
    }

    pub async fn check_credential(self: &Arc<Self>, credential_id: &str) {
        let result = self.credential.validate(credential_id).await;
        self.upsert_from_result(EntityType::Credential, credential_id, credential_id, result);
    }

    /// Never triggers a network probe of its own dependencies; it only
    /// consults the already-cached MCP status to avoid probe storms
    ///.
    pub async fn check_bot(self: &Arc<Self>, bot_id: &str) {
        let result = self.bot.validate(bot_id).await;
        self.upsert_from_result(EntityType::Bot, bot_id, bot_id, result.clone());

        if let Some(servers) = self
            .bot_mcp_index
            .iter()
            .find(|entry| entry.value().iter().any(|b| b == bot_id))
        {
            for server_id in servers.value() {
                if let Some(cached) = self.get(EntityType::Mcp, server_id) {
                    if cached.status != HealthStatus::Ok {
                        debug!(bot_id, server_id, status = ?cached.status, "bot depends on unhealthy MCP (cached)");
                    }
                }
            }
        }
    }

    pub async fn check_workspace(self: &Arc<Self>, workspace_id: &str) {
        let result = self.workspace.validate(workspace_id).await;
        self.upsert_from_result(EntityType::Workspace, workspace_id, workspace_id, result);
    }

    pub async fn check_channel(self: &Arc<Self>, channel_id: &str) {
        let result = self.channel.validate(channel_id).await;
        self.upsert_from_result(EntityType::Channel, channel_id, channel_id, result);
    }

    /// Runs every check in order: MCP servers at a 2s rate-limit interval, then
    /// credentials at 200ms, then bots and workspaces (no network).
    pub async fn check_all(
        self: &Arc<Self>,
        mcp_server_ids: &[String],
        credential_ids: &[String],
        bot_ids: &[String],
        workspace_ids: &[String],
    ) {
        for (i, server_id) in mcp_server_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.intervals.mcp_check_interval).await;
            }
            self.check_mcp(server_id).await;
        }
        for (i, credential_id) in credential_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.intervals.credential_check_interval).await;
            }
            self.check_credential(credential_id).await;
        }
        for bot_id in bot_ids {
            self.check_bot(bot_id).await;
        }
        for workspace_id in workspace_ids {
            self.check_workspace(workspace_id).await;
        }
    }

    /// Mutates a record directly (used
    /// by components reporting outcomes from real traffic, not just
    /// dedicated checks). If `entity_type` is MCP, asynchronously
    /// re-evaluates every bot that depends on it.
    pub fn report_success(self: &Arc<Self>, entity_type: EntityType, entity_id: &str, message: &str) {
        self.upsert(entity_type, entity_id, HealthStatus::Ok, message);
        self.propagate_if_mcp(entity_type, entity_id);
    }

    pub fn report_failure(self: &Arc<Self>, entity_type: EntityType, entity_id: &str, message: &str) {
        self.upsert(entity_type, entity_id, HealthStatus::Error, message);
        self.propagate_if_mcp(entity_type, entity_id);
    }

    fn propagate_if_mcp(self: &Arc<Self>, entity_type: EntityType, entity_id: &str) {
        if entity_type != EntityType::Mcp {
            return;
        }
        if let Some(bots) = self.bot_mcp_index.get(entity_id) {
            let bots = bots.clone();
            let monitor = Arc::clone(self);
            tokio::spawn(async move {
                for bot_id in bots {
                    monitor.check_bot(&bot_id).await;
                }
            });
        }
    }

    /// Launch the periodic check loop: an immediate check, then every
    /// `periodic_check_interval` (default 12h).
    pub fn start_periodic_checks(
        self: &Arc<Self>,
        mcp_server_ids: Vec<String>,
        credential_ids: Vec<String>,
        bot_ids: Vec<String>,
        workspace_ids: Vec<String>,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                info!("running scheduled health check sweep");
                monitor
                    .check_all(&mcp_server_ids, &credential_ids, &bot_ids, &workspace_ids)
                    .await;
                tokio::time::sleep(monitor.intervals.periodic_check_interval).await;
            }
        })
    }

    fn upsert_from_result(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        name: &str,
        result: std::result::Result<(), String>,
    ) {
        match result {
            Ok(()) => self.upsert(entity_type, entity_id, HealthStatus::Ok, ""),
            Err(message) => {
                warn!(entity = %entity_id, kind = %entity_type, %message, "health check failed");
                self.upsert(entity_type, entity_id, HealthStatus::Error, &message)
            }
        }
        let _ = name;
    }

    /// `last_success` is monotone (never rewound);
    /// `last_checked` is always updated.
    fn upsert(&self, entity_type: EntityType, entity_id: &str, status: HealthStatus, message: &str) {
        let now = Utc::now();
        let key = (entity_type, entity_id.to_string());
        let mut entry = self
            .records
            .entry(key)
            .or_insert_with(|| HealthRecord::unknown(entity_type, entity_id, entity_id));
        entry.last_checked = now;
        entry.status = status;
        entry.last_message = message.to_string();
        if status == HealthStatus::Ok {
            entry.last_success = Some(now);
        }
    }
}

impl HealthReporter for HealthMonitor {
    fn report_success(&self, entity_type: EntityType, entity_id: &str, message: &str) {
        self.upsert(entity_type, entity_id, HealthStatus::Ok, message);
    }

    fn report_failure(&self, entity_type: EntityType, entity_id: &str, message: &str) {
        self.upsert(entity_type, entity_id, HealthStatus::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysOk;
    #[async_trait]
    impl McpValidator for AlwaysOk {
        async fn validate(&self, _server_id: &str) -> Result<(), String> {
            Ok(())
        }
    }
    #[async_trait]
    impl CredentialValidator for AlwaysOk {
        async fn validate(&self, _id: &str) -> Result<(), String> {
            Ok(())
        }
    }
    #[async_trait]
    impl BotValidator for AlwaysOk {
        async fn validate(&self, _id: &str) -> Result<(), String> {
            Ok(())
        }
    }
    #[async_trait]
    impl WorkspaceValidator for AlwaysOk {
        async fn validate(&self, _id: &str) -> Result<(), String> {
            Ok(())
        }
    }
    #[async_trait]
    impl ChannelValidator for AlwaysOk {
        async fn validate(&self, _id: &str) -> Result<(), String> {
            Ok(())
        }
    }

    struct AlwaysFail;
    #[async_trait]
    impl McpValidator for AlwaysFail {
        async fn validate(&self, _server_id: &str) -> Result<(), String> {
            Err("down".to_string())
        }
    }

    fn monitor(mcp: Arc<dyn McpValidator>) -> Arc<HealthMonitor> {
        HealthMonitor::new(
            HealthCheckIntervals {
                mcp_check_interval: Duration::from_millis(1),
                credential_check_interval: Duration::from_millis(1),
                periodic_check_interval: Duration::from_secs(3600),
            },
            mcp,
            Arc::new(AlwaysOk),
            Arc::new(AlwaysOk),
            Arc::new(AlwaysOk),
            Arc::new(AlwaysOk),
        )
    }

    #[tokio::test]
    async fn check_mcp_upserts_ok_record() {
        let monitor = monitor(Arc::new(AlwaysOk));
        monitor.check_mcp("srv1").await;
        let record = monitor.get(EntityType::Mcp, "srv1").unwrap();
        assert_eq!(record.status, HealthStatus::Ok);
        assert!(record.last_success.is_some());
    }

    #[tokio::test]
    async fn last_success_never_rewinds_on_subsequent_failure() {
        let monitor = monitor(Arc::new(AlwaysOk));
        monitor.check_mcp("srv1").await;
        let first_success = monitor.get(EntityType::Mcp, "srv1").unwrap().last_success;

        let monitor = monitor_with_failing_mcp(monitor);
        monitor.check_mcp("srv1").await;
        let record = monitor.get(EntityType::Mcp, "srv1").unwrap();
        assert_eq!(record.status, HealthStatus::Error);
        assert_eq!(record.last_success, first_success);
    }

    fn monitor_with_failing_mcp(existing: Arc<HealthMonitor>) -> Arc<HealthMonitor> {
        // Reuse the same underlying record map by swapping the validator
        // would require a mutable field; instead construct a fresh monitor
        // sharing no state is wrong for this test, so we directly exercise
        // upsert semantics through report_failure instead.
        existing.report_failure(EntityType::Mcp, "srv1", "down");
        existing
    }

    #[tokio::test]
    async fn mcp_failure_reevaluates_dependent_bots() {
        let monitor = monitor(Arc::new(AlwaysFail));
        monitor.register_bot_mcp_usage("bot1", vec!["srv1".to_string()]);
        monitor.report_failure(EntityType::Mcp, "srv1", "down");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(monitor.get(EntityType::Bot, "bot1").is_some());
    }
}
