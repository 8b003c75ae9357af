use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use strum::{Display, EnumString};

/// A loaded playbook: a named, immutable action tree with declared inputs
#[derive(Debug, Clone, PartialEq)]
pub struct Playbook {
    pub name: String,
    pub description: String,

    /// How the playbook is meant to be started; informational only
    pub trigger: Trigger,

    /// Declared input names, documentation only
    pub inputs: Vec<String>,

    /// Root action sequence
    pub actions: Vec<Action>,
}

impl Playbook {
    /// Total number of actions in the tree, branches included
    pub fn action_count(&self) -> usize {
        count_actions(&self.actions)
    }

    /// Whether any action in the tree needs an integration gateway
    pub fn uses_integrations(&self) -> bool {
        any_action(&self.actions, &|action| {
            matches!(action.kind, ActionKind::ExternalCall { .. })
        })
    }
}

fn count_actions(actions: &[Action]) -> usize {
    actions
        .iter()
        .map(|action| 1 + action.children().map(count_actions).sum::<usize>())
        .sum()
}

fn any_action(actions: &[Action], pred: &dyn Fn(&Action) -> bool) -> bool {
    actions
        .iter()
        .any(|action| pred(action) || action.children().any(|branch| any_action(branch, pred)))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    #[default]
    Manual,
    ApiCall,
    Scheduled,
}

/// One step of a playbook
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Author-supplied identifier, used for logging only
    pub id: String,

    /// Variable receiving the action's output, when the kind produces one
    pub output_variable: Option<String>,

    pub kind: ActionKind,
}

impl Action {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            output_variable: None,
            kind,
        }
    }

    pub fn with_output(mut self, variable: impl Into<String>) -> Self {
        self.output_variable = Some(variable.into());
        self
    }

    /// Branches owned by this action (only conditions have any)
    pub fn children(&self) -> impl Iterator<Item = &[Action]> {
        let (if_true, if_false) = match &self.kind {
            ActionKind::Condition { if_true, if_false, .. } => {
                (if_true.as_deref(), if_false.as_deref())
            }
            _ => (None, None),
        };
        if_true.into_iter().chain(if_false)
    }
}

/// Closed set of action kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Append the resolved message to the execution log
    Log { message: JsonValue },

    /// Store the resolved value under `name`
    SetVariable { name: String, value: JsonValue },

    /// Evaluate `condition` and run one of the owned branches
    Condition {
        condition: String,
        if_true: Option<Vec<Action>>,
        if_false: Option<Vec<Action>>,
    },

    /// Run a script body against the context (trusted authors)
    CodeEval { code: String },

    /// Call an integration through the gateway
    ExternalCall {
        integration: String,
        method: String,
        parameters: Map<String, JsonValue>,
    },

    /// A `type` the loader did not recognise; fails the run when reached
    Unrecognized { kind: String },
}

impl ActionKind {
    /// Name used in documents and logs
    pub fn type_name(&self) -> &str {
        match self {
            ActionKind::Log { .. } => "log",
            ActionKind::SetVariable { .. } => "set_variable",
            ActionKind::Condition { .. } => "condition",
            ActionKind::CodeEval { .. } => "code_eval",
            ActionKind::ExternalCall { .. } => "external_call",
            ActionKind::Unrecognized { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(id: &str) -> Action {
        Action::new(id, ActionKind::Log { message: json!("hi") })
    }

    #[test]
    fn test_action_count_includes_branches() {
        let playbook = Playbook {
            name: "p".to_string(),
            description: String::new(),
            trigger: Trigger::Manual,
            inputs: vec![],
            actions: vec![
                log("a"),
                Action::new(
                    "c",
                    ActionKind::Condition {
                        condition: "true".to_string(),
                        if_true: Some(vec![log("t1"), log("t2")]),
                        if_false: None,
                    },
                ),
            ],
        };

        assert_eq!(playbook.action_count(), 4);
        assert!(!playbook.uses_integrations());
    }

    #[test]
    fn test_nested_external_call_detected() {
        let call = Action::new(
            "lookup",
            ActionKind::ExternalCall {
                integration: "virustotal".to_string(),
                method: "check_ip".to_string(),
                parameters: Map::new(),
            },
        );
        let playbook = Playbook {
            name: "p".to_string(),
            description: String::new(),
            trigger: Trigger::Scheduled,
            inputs: vec![],
            actions: vec![Action::new(
                "c",
                ActionKind::Condition {
                    condition: "x".to_string(),
                    if_true: None,
                    if_false: Some(vec![call]),
                },
            )],
        };

        assert!(playbook.uses_integrations());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(log("a").kind.type_name(), "log");
        assert_eq!(
            ActionKind::Unrecognized { kind: "send_fax".to_string() }.type_name(),
            "send_fax"
        );
        assert_eq!(Trigger::ApiCall.to_string(), "api_call");
        assert_eq!("scheduled".parse::<Trigger>().unwrap(), Trigger::Scheduled);
    }
}
