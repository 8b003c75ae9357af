use crate::models::{LogEntry, LogLevel};
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tracing::{error, info};

use super::template;

/// Name of the sub-mapping holding a run's inputs
pub const INPUTS_VARIABLE: &str = "inputs";

/// Execution context holds the variables and the ordered log of one run.
///
/// Owned by a single run and discarded when the report is built.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    playbook: String,

    variables: Map<String, JsonValue>,

    log: Vec<LogEntry>,
}

impl ExecutionContext {
    /// Create a context seeded with `{inputs: inputs}`
    pub fn new(playbook: impl Into<String>, inputs: Map<String, JsonValue>) -> Self {
        let mut variables = Map::new();
        variables.insert(INPUTS_VARIABLE.to_string(), JsonValue::Object(inputs));

        Self {
            playbook: playbook.into(),
            variables,
            log: Vec::new(),
        }
    }

    pub fn variables(&self) -> &Map<String, JsonValue> {
        &self.variables
    }

    pub fn get_variable(&self, name: &str) -> Option<&JsonValue> {
        self.variables.get(name)
    }

    /// Bind `name`, replacing any earlier value
    pub fn set_variable(&mut self, name: impl Into<String>, value: JsonValue) {
        self.variables.insert(name.into(), value);
    }

    /// Resolve `{{path}}` tokens against the current variables
    pub fn resolve(&self, template: &str) -> String {
        template::resolve(template, &self.variables)
    }

    pub fn resolve_value(&self, value: &JsonValue) -> JsonValue {
        template::resolve_value(value, &self.variables)
    }

    pub fn resolve_parameters(&self, params: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        template::resolve_parameters(params, &self.variables)
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(playbook = %self.playbook, "{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(playbook = %self.playbook, "{}", message);
        self.push(LogLevel::Error, message);
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Consume the context, yielding the final variables and the log
    pub fn into_parts(self) -> (Map<String, JsonValue>, Vec<LogEntry>) {
        (self.variables, self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs() -> Map<String, JsonValue> {
        json!({"ip_address": "8.8.8.8"}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_seeded_with_inputs() {
        let ctx = ExecutionContext::new("test", inputs());

        assert_eq!(ctx.variables().len(), 1);
        assert_eq!(ctx.get_variable("inputs").unwrap()["ip_address"], "8.8.8.8");
        assert_eq!(ctx.resolve("ip={{inputs.ip_address}}"), "ip=8.8.8.8");
    }

    #[test]
    fn test_set_variable_overwrites() {
        let mut ctx = ExecutionContext::new("test", Map::new());
        ctx.set_variable("risk", json!(10));
        ctx.set_variable("risk", json!("high"));

        assert_eq!(ctx.get_variable("risk"), Some(&json!("high")));
        assert_eq!(ctx.resolve_value(&json!("{{risk}}")), json!("high"));
    }

    #[test]
    fn test_log_is_ordered() {
        let mut ctx = ExecutionContext::new("test", Map::new());
        ctx.log_info("first");
        ctx.log_error("second");
        ctx.log_info("third");

        let (variables, log) = ctx.into_parts();
        assert!(variables.contains_key("inputs"));

        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(log[1].level, LogLevel::Error);
        assert!(log[0].timestamp <= log[2].timestamp);
    }
}
