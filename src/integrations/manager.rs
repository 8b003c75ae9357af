use crate::config::IntegrationConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{failure, Integration, IntegrationGateway, VirusTotalIntegration};

/// Registry of loaded integrations, exposed to the engine as a gateway
pub struct IntegrationManager {
    integrations: DashMap<String, Arc<dyn Integration>>,
}

impl IntegrationManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            integrations: DashMap::new(),
        }
    }

    /// Initialise every enabled integration with a known name.
    ///
    /// Unknown names are skipped with a warning; a constructor failure is an error.
    pub fn from_config(configs: &HashMap<String, IntegrationConfig>) -> Result<Self> {
        let manager = Self::new();

        let mut names: Vec<&String> = configs.keys().collect();
        names.sort();

        for name in names {
            let config = &configs[name];
            if !config.enabled {
                debug!(integration = %name, "Integration disabled, skipping");
                continue;
            }

            match name.as_str() {
                "virustotal" => {
                    let integration = VirusTotalIntegration::from_config(config)?;
                    manager.register(Arc::new(integration));
                }
                other => warn!(integration = %other, "Unknown integration, skipping"),
            }
        }

        Ok(manager)
    }

    /// Register (or replace) an integration under its own name
    pub fn register(&self, integration: Arc<dyn Integration>) {
        let name = integration.name().to_string();
        info!(
            integration = %name,
            credentials = integration.has_credentials(),
            "Loaded integration"
        );
        self.integrations.insert(name, integration);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Integration>> {
        self.integrations.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Get an integration or fail with NotFound
    pub fn require(&self, name: &str) -> Result<Arc<dyn Integration>> {
        self.get(name)
            .ok_or_else(|| AppError::NotFound(format!("Integration '{}'", name)))
    }

    /// Loaded integration names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.integrations.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

impl Default for IntegrationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationGateway for IntegrationManager {
    async fn execute_action(
        &self,
        integration: &str,
        action: &str,
        params: Map<String, JsonValue>,
    ) -> JsonValue {
        // Clone the Arc so no map guard is held across the call
        let Some(target) = self.get(integration) else {
            warn!(integration = %integration, action = %action, "Integration not available");
            return failure(format!(
                "Integration '{}' not found or not enabled",
                integration
            ));
        };

        debug!(integration = %integration, action = %action, "Dispatching integration action");
        target.execute_action(action, &params).await
    }
}
