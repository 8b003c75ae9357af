use crate::config::{CaseBackend, CaseStoreConfig};
use crate::error::Result;
use std::sync::Arc;

use super::{CaseStore, InMemoryCaseStore, SledCaseStore};

/// Create a case store based on configuration
pub fn create_store(config: &CaseStoreConfig) -> Result<Arc<dyn CaseStore>> {
    match config.backend {
        CaseBackend::Sled => {
            tracing::info!(path = ?config.path, "Initializing Sled case store");
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(SledCaseStore::new(&config.path)?))
        }
        CaseBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn CaseStore> {
    tracing::info!("Initializing in-memory case store");
    Arc::new(InMemoryCaseStore::new())
}
