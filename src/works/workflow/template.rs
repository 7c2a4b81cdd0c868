// SPDX-License-Identifier: MIT

//! `{{ path }}` placeholder rendering against run variables

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::state::Variables;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*\}\}")
        .expect("placeholder regex is valid")
});

/// Replace every `{{ path }}` with the value at that variable path.
///
/// Strings are inserted verbatim, other values as compact JSON, missing
/// paths as the empty string.
pub fn render(template: &str, vars: &Variables) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let path = &caps[1];
            match vars.get_path(path) {
                Some(value) => value_to_text(value),
                None => {
                    log::debug!("Template variable '{}' is not set", path);
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Render every string inside a JSON value.
///
/// A string that is exactly one placeholder is replaced by the referenced
/// value itself, so `"{{ nodes.a.data }}"` keeps its JSON type. If that path
/// is missing the result is `null`, unlike [`render`] which inserts `""`.
pub fn render_value(value: &Value, vars: &Variables) -> Value {
    match value {
        Value::String(s) => {
            if let Some(caps) = PLACEHOLDER.captures(s) {
                if caps[0].len() == s.trim().len() {
                    return vars.get_path(&caps[1]).cloned().unwrap_or(Value::Null);
                }
            }
            Value::String(render(s, vars))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, vars)).collect()),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Text form of a JSON value: strings unquoted, everything else as JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
