// SPDX-License-Identifier: MIT

//! Workflow variable declarations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Variables declared by a workflow, keyed by name
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct VariableSchema {
    #[serde(flatten)]
    pub fields: BTreeMap<String, VariableDef>,
}

impl VariableSchema {
    pub fn declare(mut self, name: impl Into<String>, def: VariableDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Declaration of one variable
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VariableDef {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    /// How later writes combine with the current value
    #[serde(default)]
    pub reducer: ReducerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableDef {
    pub fn new(var_type: VariableType) -> Self {
        Self {
            var_type,
            reducer: ReducerType::default(),
            default: None,
            description: None,
        }
    }

    pub fn with_reducer(mut self, reducer: ReducerType) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl VariableType {
    /// Null is accepted for every type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (VariableType::String, Value::String(_)) => true,
            (VariableType::Number, Value::Number(_)) => true,
            (VariableType::Boolean, Value::Bool(_)) => true,
            (VariableType::Array, Value::Array(_)) => true,
            (VariableType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to array
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow merge objects
    Merge,
}
