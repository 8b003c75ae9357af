//! Security-tool integrations and the gateway the playbook engine calls them through.

pub mod manager;
pub mod virustotal;

pub use manager::IntegrationManager;
pub use virustotal::VirusTotalIntegration;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};

/// Single entry point the engine uses for `external_call` actions.
///
/// Never fails: problems come back as `{"success": false, "error": ...}` values
/// that a playbook can store and branch on.
#[async_trait]
pub trait IntegrationGateway: Send + Sync {
    async fn execute_action(
        &self,
        integration: &str,
        action: &str,
        params: Map<String, JsonValue>,
    ) -> JsonValue;
}

/// A pluggable security-tool integration
#[async_trait]
pub trait Integration: Send + Sync + 'static {
    /// Registration name, e.g. `virustotal`
    fn name(&self) -> &str;

    /// Actions accepted by [`Integration::execute_action`]
    fn available_actions(&self) -> Vec<&'static str>;

    /// Whether live API credentials are configured
    fn has_credentials(&self) -> bool;

    async fn execute_action(&self, action: &str, params: &Map<String, JsonValue>) -> JsonValue;
}

/// Structured failure value returned by integrations
pub fn failure(error: impl Into<String>) -> JsonValue {
    json!({
        "success": false,
        "error": error.into(),
    })
}

/// Whether a result value reports success
pub fn is_success(result: &JsonValue) -> bool {
    result.get("success").and_then(JsonValue::as_bool).unwrap_or(false)
}
