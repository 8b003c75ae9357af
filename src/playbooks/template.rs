//! `{{path}}` template resolution against a variable snapshot.
//!
//! Resolution is pure: every token of a template is looked up in the same
//! snapshot, and a token whose path does not resolve is left in place verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("valid token pattern"));

/// Substitute every `{{path}}` token in `template`
pub fn resolve(template: &str, variables: &Map<String, JsonValue>) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| {
            let path = caps[1].trim();
            match lookup_path(variables, path) {
                Some(value) => display_value(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve a template value: strings are scanned, anything else passes through unchanged
pub fn resolve_value(value: &JsonValue, variables: &Map<String, JsonValue>) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(resolve(s, variables)),
        other => other.clone(),
    }
}

/// Resolve every value of a parameter map
pub fn resolve_parameters(
    params: &Map<String, JsonValue>,
    variables: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, variables)))
        .collect()
}

/// Walk a dot-separated path through nested objects.
///
/// Yields `None` when a segment is missing, when an intermediate value is not
/// an object, or when the value found is `null`.
pub fn lookup_path<'a>(variables: &'a Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = variables.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Display-string form of a value
pub fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
