use crate::error::{AppError, Result};
use crate::models::{Action, ActionKind, Playbook, Trigger};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use tracing::debug;

use super::template::display_value;

const DEFAULT_NAME: &str = "Unnamed Playbook";

/// Document root: everything lives under a top-level `playbook` key
#[derive(Debug, Deserialize)]
struct RawDocument {
    playbook: Option<RawPlaybook>,
}

#[derive(Debug, Deserialize)]
struct RawPlaybook {
    name: Option<String>,
    description: Option<String>,
    trigger: Option<String>,
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    parameters: Option<Map<String, JsonValue>>,
    output_variable: Option<String>,
    condition: Option<JsonValue>,
    if_true: Option<Vec<RawAction>>,
    if_false: Option<Vec<RawAction>>,
}

/// Parses playbook documents into the action model.
///
/// Every structural problem is reported as [`AppError::Load`] before anything runs.
pub struct PlaybookLoader;

impl PlaybookLoader {
    /// Load a playbook from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Playbook> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading playbook");

        Self::from_yaml_str(&source)
            .map_err(|e| AppError::Load(format!("{}: {}", path.display(), strip_prefix(&e))))
    }

    pub fn from_yaml_str(source: &str) -> Result<Playbook> {
        let document: RawDocument = serde_yaml::from_str(source)
            .map_err(|e| AppError::Load(format!("invalid YAML: {}", e)))?;
        Self::from_document(document)
    }

    /// Build a playbook from an already-parsed JSON document
    pub fn from_json_value(value: JsonValue) -> Result<Playbook> {
        let document: RawDocument = serde_json::from_value(value)
            .map_err(|e| AppError::Load(format!("invalid document: {}", e)))?;
        Self::from_document(document)
    }

    fn from_document(document: RawDocument) -> Result<Playbook> {
        let raw = document
            .playbook
            .ok_or_else(|| AppError::Load("missing top-level 'playbook' object".to_string()))?;

        let trigger = match raw.trigger.as_deref() {
            None => Trigger::default(),
            Some(trigger) => trigger
                .parse()
                .map_err(|_| AppError::Load(format!("unknown trigger '{}'", trigger)))?,
        };

        Ok(Playbook {
            name: raw.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            description: raw.description.unwrap_or_default(),
            trigger,
            inputs: raw.inputs,
            actions: convert_actions(raw.actions, "actions")?,
        })
    }
}

fn strip_prefix(err: &AppError) -> String {
    match err {
        AppError::Load(detail) => detail.clone(),
        other => other.to_string(),
    }
}

fn convert_actions(raw: Vec<RawAction>, location: &str) -> Result<Vec<Action>> {
    raw.into_iter()
        .enumerate()
        .map(|(index, action)| convert_action(action, &format!("{}[{}]", location, index)))
        .collect()
}

fn convert_action(raw: RawAction, location: &str) -> Result<Action> {
    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Load(format!("{}: missing required field 'id'", location)))?;
    let kind = raw
        .kind
        .filter(|kind| !kind.is_empty())
        .ok_or_else(|| AppError::Load(format!("{} ('{}'): missing required field 'type'", location, id)))?;

    let mut params = raw.parameters.unwrap_or_default();
    let missing = |field: &str| {
        AppError::Load(format!(
            "{} ('{}'): {} action requires parameter '{}'",
            location, id, kind, field
        ))
    };

    let kind = match kind.as_str() {
        "log" => ActionKind::Log {
            message: params.remove("message").unwrap_or_else(|| JsonValue::String(String::new())),
        },
        "set_variable" => ActionKind::SetVariable {
            name: take_string(&mut params, "name").ok_or_else(|| missing("name"))?,
            value: params.remove("value").unwrap_or(JsonValue::Null),
        },
        "condition" => {
            let condition = match raw.condition {
                Some(JsonValue::String(s)) => s,
                Some(JsonValue::Null) | None => {
                    return Err(AppError::Load(format!(
                        "{} ('{}'): condition action requires a 'condition' field",
                        location, id
                    )))
                }
                Some(other) => display_value(&other),
            };

            ActionKind::Condition {
                condition,
                if_true: raw
                    .if_true
                    .map(|branch| convert_actions(branch, &format!("{}.if_true", location)))
                    .transpose()?,
                if_false: raw
                    .if_false
                    .map(|branch| convert_actions(branch, &format!("{}.if_false", location)))
                    .transpose()?,
            }
        }
        "code_eval" | "python_code" => ActionKind::CodeEval {
            code: take_string(&mut params, "code").unwrap_or_default(),
        },
        "external_call" | "api_call" => {
            let integration = take_string(&mut params, "integration").ok_or_else(|| missing("integration"))?;
            let method = take_string(&mut params, "method").ok_or_else(|| missing("method"))?;
            let parameters = match params.remove("parameters") {
                Some(JsonValue::Object(map)) => map,
                Some(JsonValue::Null) | None => Map::new(),
                Some(_) => {
                    return Err(AppError::Load(format!(
                        "{} ('{}'): 'parameters' must be a mapping",
                        location, id
                    )))
                }
            };

            ActionKind::ExternalCall {
                integration,
                method,
                parameters,
            }
        }
        other => ActionKind::Unrecognized {
            kind: other.to_string(),
        },
    };

    Ok(Action {
        id,
        output_variable: raw.output_variable,
        kind,
    })
}

fn take_string(params: &mut Map<String, JsonValue>, key: &str) -> Option<String> {
    match params.remove(key)? {
        JsonValue::String(s) if !s.is_empty() => Some(s),
        JsonValue::String(_) | JsonValue::Null => None,
        other => Some(display_value(&other)),
    }
}
