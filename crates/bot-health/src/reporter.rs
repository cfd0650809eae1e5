/// Consumed by components (MCP facade, provider adapters, transports) that
/// want to report outcomes back to the health monitor without depending on
/// its concrete type.
pub trait HealthReporter: Send + Sync {
    fn report_success(&self, entity_type: bot_core::types::EntityType, entity_id: &str, message: &str);
    fn report_failure(&self, entity_type: bot_core::types::EntityType, entity_id: &str, message: &str);
}
