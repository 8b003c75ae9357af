//! Script evaluation for `code_eval` actions.
//!
//! Playbook authors are trusted: a script sees every context variable and may
//! compute anything the scripting engine allows. The evaluator is injected
//! into the engine so a deployment can switch scripting off entirely with
//! [`DisabledScriptEvaluator`].

use crate::error::{AppError, Result};
use rhai::{Dynamic, Engine, Scope};
use serde_json::{Map, Value as JsonValue};

/// Name of the binding captured after a script runs
pub const RESULT_BINDING: &str = "result";

/// Runs `code_eval` bodies against a snapshot of the context variables
pub trait ScriptEvaluator: Send + Sync {
    /// Evaluator name, for logs
    fn name(&self) -> &str;

    /// Run `code` and return the value of its top-level `result` binding, if any.
    ///
    /// Only the returned value may reach the context; other assignments made by
    /// the script are discarded.
    fn evaluate(&self, code: &str, variables: &Map<String, JsonValue>) -> Result<Option<JsonValue>>;
}

/// Rhai-backed evaluator
///
/// A fresh rhai engine is built for every call, so no state leaks between runs.
#[derive(Debug, Clone, Default)]
pub struct RhaiScriptEvaluator {
    max_operations: u64,
}

impl RhaiScriptEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of operations a script may perform (0 = unlimited)
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    fn build_engine(&self) -> Engine {
        let mut engine = Engine::new();
        if self.max_operations > 0 {
            engine.set_max_operations(self.max_operations);
        }
        engine
    }
}

impl ScriptEvaluator for RhaiScriptEvaluator {
    fn name(&self) -> &str {
        "rhai"
    }

    fn evaluate(&self, code: &str, variables: &Map<String, JsonValue>) -> Result<Option<JsonValue>> {
        let engine = self.build_engine();
        let mut scope = Scope::new();

        for (name, value) in variables {
            let dynamic: Dynamic = rhai::serde::to_dynamic(value).map_err(|e| {
                AppError::CodeExecution(format!("cannot bind variable '{}': {}", name, e))
            })?;
            scope.push_dynamic(name.clone(), dynamic);
        }

        engine
            .run_with_scope(&mut scope, code)
            .map_err(|e| AppError::CodeExecution(e.to_string()))?;

        match scope.get(RESULT_BINDING) {
            Some(result) => {
                let value: JsonValue = rhai::serde::from_dynamic(result).map_err(|e| {
                    AppError::CodeExecution(format!("cannot convert '{}': {}", RESULT_BINDING, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Evaluator used when scripting is switched off in configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScriptEvaluator;

impl ScriptEvaluator for DisabledScriptEvaluator {
    fn name(&self) -> &str {
        "disabled"
    }

    fn evaluate(&self, _code: &str, _variables: &Map<String, JsonValue>) -> Result<Option<JsonValue>> {
        Err(AppError::CodeExecution(
            "code_eval is disabled in this deployment".to_string(),
        ))
    }
}
