//! Common test utilities for playbook and case tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use soar_engine::integrations::IntegrationGateway;
use soar_engine::models::{Case, Severity};
use soar_engine::playbooks::PlaybookLoader;
use soar_engine::Playbook;
use std::sync::Mutex;

/// A recorded gateway invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub integration: String,
    pub action: String,
    pub params: Map<String, JsonValue>,
}

/// Gateway that knows one integration (`stub`) and records every call
#[derive(Default)]
pub struct StubGateway {
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntegrationGateway for StubGateway {
    async fn execute_action(
        &self,
        integration: &str,
        action: &str,
        params: Map<String, JsonValue>,
    ) -> JsonValue {
        self.calls.lock().unwrap().push(RecordedCall {
            integration: integration.to_string(),
            action: action.to_string(),
            params: params.clone(),
        });

        if integration != "stub" {
            return json!({
                "success": false,
                "error": format!("Integration '{}' not found or not enabled", integration),
            });
        }

        json!({
            "success": true,
            "action": action,
            "echo": params,
            "malicious": 12,
        })
    }
}

/// Build an inputs map from a JSON object literal
pub fn inputs(value: JsonValue) -> Map<String, JsonValue> {
    value.as_object().cloned().unwrap_or_default()
}

/// Load a playbook from inline YAML
pub fn playbook(yaml: &str) -> Playbook {
    PlaybookLoader::from_yaml_str(yaml).expect("valid playbook")
}

pub fn create_test_case(title: &str, severity: Severity) -> Case {
    Case::new(
        title.to_string(),
        format!("{} description", title),
        severity,
        vec!["test".to_string()],
    )
}
