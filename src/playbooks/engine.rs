use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::integrations::IntegrationGateway;
use crate::models::{Action, ActionKind, ExecutionReport, ExecutionStatus, Playbook};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::context::ExecutionContext;
use super::expression;
use super::script::{DisabledScriptEvaluator, RhaiScriptEvaluator, ScriptEvaluator};
use super::template::display_value;

/// Playbook engine - walks an action tree depth-first against a fresh context.
///
/// Actions run strictly one after another on the caller's task. The first
/// error stops the walk; it is recorded in the report rather than returned.
#[derive(Clone)]
pub struct PlaybookEngine {
    gateway: Option<Arc<dyn IntegrationGateway>>,
    scripts: Arc<dyn ScriptEvaluator>,
}

impl PlaybookEngine {
    /// Engine without a gateway, scripting through rhai
    pub fn new() -> Self {
        Self {
            gateway: None,
            scripts: Arc::new(RhaiScriptEvaluator::new()),
        }
    }

    /// Engine configured from the `engine` config section
    pub fn from_config(config: &EngineConfig) -> Self {
        let scripts: Arc<dyn ScriptEvaluator> = if config.code_eval_enabled {
            Arc::new(RhaiScriptEvaluator::new().with_max_operations(config.script_max_operations))
        } else {
            Arc::new(DisabledScriptEvaluator)
        };

        Self {
            gateway: None,
            scripts,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn IntegrationGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_script_evaluator(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn script_evaluator(&self) -> &str {
        self.scripts.name()
    }

    /// Run `playbook` to completion or first failure
    pub async fn execute(&self, playbook: &Playbook, inputs: Map<String, JsonValue>) -> ExecutionReport {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let mut ctx = ExecutionContext::new(playbook.name.clone(), inputs);
        ctx.log_info(format!("Starting playbook: {}", playbook.name));

        let (status, error) = match self.execute_actions(&playbook.actions, &mut ctx).await {
            Ok(()) => (ExecutionStatus::Success, None),
            Err(e) => {
                let message = e.to_string();
                ctx.log_error(format!("Playbook execution failed: {}", message));
                (ExecutionStatus::Failed, Some(message))
            }
        };

        let duration_seconds = start.elapsed().as_secs_f64();
        let (context, execution_log) = ctx.into_parts();

        info!(
            execution_id = %execution_id,
            playbook = %playbook.name,
            status = %status,
            duration_seconds,
            "Playbook execution finished"
        );

        ExecutionReport {
            id: execution_id,
            playbook: playbook.name.clone(),
            status,
            error,
            started_at,
            duration_seconds,
            execution_log,
            context,
        }
    }

    /// Execute a sequence in order, stopping at the first error.
    ///
    /// Boxed so condition branches can recurse.
    fn execute_actions<'a>(
        &'a self,
        actions: &'a [Action],
        ctx: &'a mut ExecutionContext,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            for action in actions {
                self.execute_action(action, ctx).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn execute_action(&self, action: &Action, ctx: &mut ExecutionContext) -> Result<()> {
        let action_type = action.kind.type_name();
        debug!(action_id = %action.id, action_type = %action_type, "Dispatching action");
        ctx.log_info(format!(
            "Executing action: {} (type: {})",
            action.id, action_type
        ));

        match &action.kind {
            ActionKind::Log { message } => {
                let message = display_value(&ctx.resolve_value(message));
                ctx.log_info(format!("LOG: {}", message));
            }

            ActionKind::SetVariable { name, value } => {
                let value = ctx.resolve_value(value);
                let shown = display_value(&value);
                ctx.set_variable(name.clone(), value);
                ctx.log_info(format!("Set variable '{}' = {}", name, shown));
            }

            ActionKind::Condition {
                condition,
                if_true,
                if_false,
            } => {
                let resolved = ctx.resolve(condition);
                let result = expression::evaluate_condition(&resolved, ctx.variables())?;
                ctx.log_info(format!(
                    "Condition '{}' evaluated to: {}",
                    resolved, result
                ));

                let branch = if result { if_true } else { if_false };
                if let Some(branch) = branch {
                    self.execute_actions(branch, ctx).await?;
                }
            }

            ActionKind::CodeEval { code } => {
                let captured = self.scripts.evaluate(code, ctx.variables())?;
                if let (Some(output), Some(value)) = (&action.output_variable, captured) {
                    ctx.set_variable(output.clone(), value);
                    ctx.log_info(format!("Stored result in variable: {}", output));
                }
            }

            ActionKind::ExternalCall {
                integration,
                method,
                parameters,
            } => {
                let gateway = self
                    .gateway
                    .as_ref()
                    .ok_or(AppError::IntegrationNotConfigured)?;

                let params = ctx.resolve_parameters(parameters);
                ctx.log_info(format!(
                    "Calling {}.{} with params: {}",
                    integration,
                    method,
                    JsonValue::Object(params.clone())
                ));

                let result = gateway.execute_action(integration, method, params).await;

                if let Some(output) = &action.output_variable {
                    ctx.set_variable(output.clone(), result);
                    ctx.log_info(format!("Stored API result in variable: {}", output));
                }
            }

            ActionKind::Unrecognized { kind } => {
                return Err(AppError::UnknownActionKind(kind.clone()));
            }
        }

        Ok(())
    }
}

impl Default for PlaybookEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogLevel, Trigger};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingGateway {
        calls: Mutex<Vec<(String, String, Map<String, JsonValue>)>>,
    }

    #[async_trait]
    impl IntegrationGateway for RecordingGateway {
        async fn execute_action(
            &self,
            integration: &str,
            action: &str,
            params: Map<String, JsonValue>,
        ) -> JsonValue {
            self.calls
                .lock()
                .unwrap()
                .push((integration.to_string(), action.to_string(), params));
            json!({"success": true, "malicious": 7})
        }
    }

    fn playbook(actions: Vec<Action>) -> Playbook {
        Playbook {
            name: "test".to_string(),
            description: String::new(),
            trigger: Trigger::Manual,
            inputs: vec![],
            actions,
        }
    }

    fn set(id: &str, name: &str, value: JsonValue) -> Action {
        Action::new(
            id,
            ActionKind::SetVariable {
                name: name.to_string(),
                value,
            },
        )
    }

    fn inputs(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_log_resolves_inputs() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![Action::new(
            "greet",
            ActionKind::Log {
                message: json!("hello {{inputs.name}}"),
            },
        )]);

        let report = engine.execute(&pb, inputs(json!({"name": "world"}))).await;

        assert!(report.is_success());
        assert!(report.error.is_none());
        assert!(report.duration_seconds >= 0.0);
        assert_eq!(
            report.messages().collect::<Vec<_>>(),
            vec![
                "Starting playbook: test",
                "Executing action: greet (type: log)",
                "LOG: hello world",
            ]
        );
        assert!(report.execution_log.iter().all(|e| e.level == LogLevel::Info));
    }

    #[tokio::test]
    async fn test_set_variable_keeps_non_string_values() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![
            set("n", "count", json!(3)),
            set("s", "label", json!("ip={{inputs.ip}}")),
            set("o", "raw", json!({"k": "{{inputs.ip}}"})),
        ]);

        let report = engine.execute(&pb, inputs(json!({"ip": "1.1.1.1"}))).await;

        assert_eq!(report.variable("count"), Some(&json!(3)));
        assert_eq!(report.variable("label"), Some(&json!("ip=1.1.1.1")));
        assert_eq!(report.variable("raw"), Some(&json!({"k": "{{inputs.ip}}"})));
        assert!(report.has_message("Set variable 'count' = 3"));
    }

    #[tokio::test]
    async fn test_condition_without_matching_branch() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![Action::new(
            "c",
            ActionKind::Condition {
                condition: "1 > 2".to_string(),
                if_true: Some(vec![set("t", "x", json!(1))]),
                if_false: None,
            },
        )]);

        let report = engine.execute(&pb, Map::new()).await;

        assert!(report.is_success());
        assert!(report.has_message("Condition '1 > 2' evaluated to: false"));
        assert!(report.variable("x").is_none());
    }

    #[tokio::test]
    async fn test_condition_error_fails_run() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![Action::new(
            "c",
            ActionKind::Condition {
                condition: "missing_var > 2".to_string(),
                if_true: None,
                if_false: None,
            },
        )]);

        let report = engine.execute(&pb, Map::new()).await;

        assert_eq!(report.status, ExecutionStatus::Failed);
        assert_eq!(
            report.error.as_deref(),
            Some("Condition evaluation failed: name 'missing_var' is not defined")
        );
        let last = report.execution_log.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.message.starts_with("Playbook execution failed: "));
    }

    #[tokio::test]
    async fn test_code_eval_captures_result_only() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![
            set("s", "score", json!(4)),
            Action::new(
                "calc",
                ActionKind::CodeEval {
                    code: "let scratch = 99; let result = score * 10;".to_string(),
                },
            )
            .with_output("risk"),
        ]);

        let report = engine.execute(&pb, Map::new()).await;

        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.variable("risk"), Some(&json!(40)));
        assert!(report.variable("scratch").is_none());
        assert!(report.has_message("Stored result in variable: risk"));
    }

    #[tokio::test]
    async fn test_code_eval_without_output_variable() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![Action::new(
            "calc",
            ActionKind::CodeEval {
                code: "let result = 1;".to_string(),
            },
        )]);

        let report = engine.execute(&pb, Map::new()).await;
        assert!(report.is_success());
        assert_eq!(report.context.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_scripting_fails_run() {
        let engine = PlaybookEngine::from_config(&EngineConfig {
            code_eval_enabled: false,
            script_max_operations: 0,
        });
        assert_eq!(engine.script_evaluator(), "disabled");

        let pb = playbook(vec![Action::new(
            "calc",
            ActionKind::CodeEval {
                code: "let result = 1;".to_string(),
            },
        )]);

        let report = engine.execute(&pb, Map::new()).await;
        assert_eq!(report.status, ExecutionStatus::Failed);
        assert!(report.error.unwrap().starts_with("Code execution failed:"));
    }

    #[tokio::test]
    async fn test_external_call_resolves_parameters() {
        let gateway = Arc::new(RecordingGateway {
            calls: Mutex::new(Vec::new()),
        });
        let engine = PlaybookEngine::new().with_gateway(gateway.clone());

        let mut parameters = Map::new();
        parameters.insert("ip".to_string(), json!("{{inputs.ip}}"));
        parameters.insert("limit".to_string(), json!(5));

        let pb = playbook(vec![Action::new(
            "lookup",
            ActionKind::ExternalCall {
                integration: "virustotal".to_string(),
                method: "check_ip".to_string(),
                parameters,
            },
        )
        .with_output("vt")]);

        let report = engine.execute(&pb, inputs(json!({"ip": "8.8.8.8"}))).await;

        assert!(report.is_success());
        assert_eq!(report.variable("vt").unwrap()["malicious"], 7);
        assert!(report.has_message(
            r#"Calling virustotal.check_ip with params: {"ip":"8.8.8.8","limit":5}"#
        ));
        assert!(report.has_message("Stored API result in variable: vt"));

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "virustotal");
        assert_eq!(calls[0].2["ip"], json!("8.8.8.8"));
    }

    #[tokio::test]
    async fn test_external_call_without_gateway() {
        let engine = PlaybookEngine::new();
        assert!(!engine.has_gateway());

        let pb = playbook(vec![
            set("a", "x", json!(1)),
            Action::new(
                "lookup",
                ActionKind::ExternalCall {
                    integration: "virustotal".to_string(),
                    method: "check_ip".to_string(),
                    parameters: Map::new(),
                },
            ),
        ]);

        let report = engine.execute(&pb, Map::new()).await;

        assert_eq!(report.status, ExecutionStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("Integration manager not configured"));
        assert_eq!(report.variable("x"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_unrecognized_kind_fails_at_node() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![
            set("a", "x", json!(1)),
            Action::new(
                "fax",
                ActionKind::Unrecognized {
                    kind: "send_fax".to_string(),
                },
            ),
            set("c", "x", json!(2)),
        ]);

        let report = engine.execute(&pb, Map::new()).await;

        assert_eq!(report.error.as_deref(), Some("Unknown action type: send_fax"));
        assert_eq!(report.variable("x"), Some(&json!(1)));
        assert!(report.has_message("Executing action: fax (type: send_fax)"));
        assert!(!report.has_message("Executing action: c (type: set_variable)"));
    }

    #[tokio::test]
    async fn test_nested_failure_stops_ancestors() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![
            Action::new(
                "outer",
                ActionKind::Condition {
                    condition: "true".to_string(),
                    if_true: Some(vec![
                        set("inner_ok", "a", json!(1)),
                        Action::new("inner_bad", ActionKind::Unrecognized { kind: "nope".to_string() }),
                        set("inner_after", "b", json!(2)),
                    ]),
                    if_false: None,
                },
            ),
            set("after_outer", "c", json!(3)),
        ]);

        let report = engine.execute(&pb, Map::new()).await;

        assert_eq!(report.status, ExecutionStatus::Failed);
        assert_eq!(report.variable("a"), Some(&json!(1)));
        assert!(report.variable("b").is_none());
        assert!(report.variable("c").is_none());
    }

    #[tokio::test]
    async fn test_engine_reusable_across_runs() {
        let engine = PlaybookEngine::new();
        let pb = playbook(vec![set("a", "seen", json!("{{inputs.v}}"))]);

        let first = engine.execute(&pb, inputs(json!({"v": "one"}))).await;
        let second = engine.execute(&pb, inputs(json!({"v": "two"}))).await;

        assert_eq!(first.variable("seen"), Some(&json!("one")));
        assert_eq!(second.variable("seen"), Some(&json!("two")));
        assert_ne!(first.id, second.id);
    }
}
