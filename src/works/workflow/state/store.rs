// SPDX-License-Identifier: MIT

//! Runtime variable storage for workflow execution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::schema::{ReducerType, VariableSchema, VariableType};

/// Key under which each node's output is stored, as `nodes.<node_id>`
pub const NODES_KEY: &str = "nodes";
/// Key holding the run input
pub const INPUT_KEY: &str = "input";

/// Runtime variables with reducer support
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Variables {
    fields: BTreeMap<String, Value>,
    #[serde(skip)]
    declared: HashMap<String, (VariableType, ReducerType)>,
}

impl Variables {
    /// Create variables seeded with the schema's defaults
    pub fn new(schema: &VariableSchema) -> Self {
        let mut vars = Self::default();

        for (name, def) in &schema.fields {
            if let Some(default) = &def.default {
                vars.fields.insert(name.clone(), default.clone());
            }
            vars.declared
                .insert(name.clone(), (def.var_type, def.reducer));
        }

        vars
    }

    /// Update a variable using its reducer (undeclared variables overwrite)
    pub fn update(&mut self, key: &str, value: Value) {
        let (var_type, reducer) = match self.declared.get(key) {
            Some((t, r)) => (Some(*t), *r),
            None => (None, ReducerType::Overwrite),
        };

        if let Some(t) = var_type {
            // Append takes single items, so only the final value is checked there
            if reducer != ReducerType::Append && !t.accepts(&value) {
                log::warn!(
                    "Variable '{}' declared as {:?} received {}",
                    key,
                    t,
                    value
                );
            }
        }

        match reducer {
            ReducerType::Overwrite => {
                self.fields.insert(key.to_string(), value);
            }
            ReducerType::Append => {
                let current = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                if !current.is_array() {
                    let previous = current.take();
                    *current = Value::Array(if previous.is_null() {
                        vec![]
                    } else {
                        vec![previous]
                    });
                }
                if let Value::Array(a) = current {
                    match value {
                        Value::Array(new_items) => a.extend(new_items),
                        other => a.push(other),
                    }
                }
            }
            ReducerType::Max | ReducerType::Min => {
                let Some(new) = value.as_f64() else {
                    log::warn!("Variable '{}' ignored non-numeric value {}", key, value);
                    return;
                };
                let replace = match self.fields.get(key).and_then(|v| v.as_f64()) {
                    None => true,
                    Some(current) if reducer == ReducerType::Max => new > current,
                    Some(current) => new < current,
                };
                if replace {
                    self.fields.insert(key.to_string(), value);
                }
            }
            ReducerType::Merge => merge_into(&mut self.fields, key, value),
        }
    }

    /// Record a node's output under `nodes.<node_id>`
    pub fn set_node_output(&mut self, node_id: &str, output: Value) {
        let mut entry = Map::new();
        entry.insert(node_id.to_string(), output);
        merge_into(&mut self.fields, NODES_KEY, Value::Object(entry));
    }

    pub fn node_output(&self, node_id: &str) -> Option<&Value> {
        self.fields.get(NODES_KEY)?.get(node_id)
    }

    /// Get a variable value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested value using dot notation (e.g., "nodes.fetch.data.items.0")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = lookup(current, part)?;
        }
        Some(current)
    }

    /// Convert variables to a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Get all variable names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

/// Step into an object key or an array index
pub(crate) fn lookup<'a>(value: &'a Value, part: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items.get(part.parse::<usize>().ok()?),
        _ => value.get(part),
    }
}

fn merge_into(fields: &mut BTreeMap<String, Value>, key: &str, value: Value) {
    let current = fields
        .entry(key.to_string())
        .or_insert(Value::Object(Map::new()));
    match (current, value) {
        (Value::Object(current_obj), Value::Object(new_obj)) => {
            for (k, v) in new_obj {
                current_obj.insert(k, v);
            }
        }
        (current, other) => {
            log::warn!("Merge into '{}' replaced a non-object value", key);
            *current = other;
        }
    }
}
