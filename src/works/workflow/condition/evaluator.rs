// SPDX-License-Identifier: MIT

//! Condition expression evaluator

use super::ast::{CompareOp, Expression, Literal};
use crate::works::workflow::state::Variables;
use serde_json::Value;

/// Evaluate a condition expression against the run variables
pub fn evaluate(expr: &Expression, vars: &Variables) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { left, op, right } => evaluate_compare(left, op, right, vars),
        Expression::And(left, right) => evaluate(left, vars) && evaluate(right, vars),
        Expression::Or(left, right) => evaluate(left, vars) || evaluate(right, vars),
        Expression::Not(inner) => !evaluate(inner, vars),
    }
}

fn evaluate_compare(left: &str, op: &CompareOp, right: &Literal, vars: &Variables) -> bool {
    let left_value = vars.get_path(left);

    match op {
        CompareOp::Eq => values_equal(left_value, right),
        CompareOp::NotEq => !values_equal(left_value, right),
        CompareOp::Gt => compare_numbers(left_value, right, |a, b| a > b),
        CompareOp::Gte => compare_numbers(left_value, right, |a, b| a >= b),
        CompareOp::Lt => compare_numbers(left_value, right, |a, b| a < b),
        CompareOp::Lte => compare_numbers(left_value, right, |a, b| a <= b),
        CompareOp::Contains => check_contains(left_value, right),
    }
}

fn numbers_equal(n: &serde_json::Number, rn: f64) -> bool {
    n.as_f64()
        .map(|f| (f - rn).abs() < f64::EPSILON)
        .unwrap_or(false)
}

fn values_equal(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (None, Literal::Null) | (Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::String(rs)) => s == rs,
        (Some(Value::Number(n)), Literal::Number(rn)) => numbers_equal(n, *rn),
        (Some(Value::Bool(b)), Literal::Boolean(rb)) => b == rb,
        _ => false,
    }
}

fn compare_numbers<F>(left: Option<&Value>, right: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (left, right) {
        (Some(Value::Number(n)), Literal::Number(rn)) => {
            n.as_f64().map(|f| cmp(f, *rn)).unwrap_or(false)
        }
        _ => false,
    }
}

fn check_contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(substr)) => s.contains(substr.as_str()),
        (Some(Value::Array(arr)), Literal::String(val)) => {
            arr.iter().any(|v| v.as_str() == Some(val.as_str()))
        }
        (Some(Value::Array(arr)), Literal::Number(val)) => arr.iter().any(|v| match v {
            Value::Number(n) => numbers_equal(n, *val),
            _ => false,
        }),
        (Some(Value::Array(arr)), Literal::Boolean(val)) => {
            arr.iter().any(|v| v.as_bool() == Some(*val))
        }
        // Object has key
        (Some(Value::Object(obj)), Literal::String(key)) => obj.contains_key(key),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::works::workflow::condition::parser::parse;
    use serde_json::json;

    fn vars_with(pairs: Vec<(&str, Value)>) -> Variables {
        let mut vars = Variables::default();
        for (k, v) in pairs {
            vars.update(k, v);
        }
        vars
    }

    fn check(expr: &str, vars: &Variables) -> bool {
        evaluate(&parse(expr).unwrap(), vars)
    }

    #[test]
    fn test_string_equality() {
        let vars = vars_with(vec![("intent", json!("search"))]);
        assert!(check("intent == 'search'", &vars));
        assert!(!check("intent == 'code'", &vars));
        assert!(check("intent != 'code'", &vars));
    }

    #[test]
    fn test_number_comparison() {
        let vars = vars_with(vec![("score", json!(7.5))]);

        assert!(check("score > 5", &vars));
        assert!(!check("score > 10", &vars));
        assert!(check("score >= 7.5", &vars));
        assert!(check("score < 10", &vars));
        assert!(check("score <= 7.5", &vars));
        assert!(!check("score <= 7", &vars));
    }

    #[test]
    fn test_ordering_on_non_numbers_is_false() {
        let vars = vars_with(vec![("name", json!("zeta"))]);
        assert!(!check("name > 1", &vars));
        assert!(!check("name < 1", &vars));
        assert!(!check("missing > 0", &vars));
    }

    #[test]
    fn test_boolean_and_null() {
        let vars = vars_with(vec![("is_draft", json!(true)), ("result", json!(null))]);

        assert!(check("is_draft == true", &vars));
        assert!(!check("is_draft == false", &vars));
        assert!(check("result == null", &vars));
        assert!(!check("result != null", &vars));
        // Missing paths compare equal to null
        assert!(check("nonexistent == null", &vars));
        assert!(!check("nonexistent == 'value'", &vars));
    }

    #[test]
    fn test_contains() {
        let vars = vars_with(vec![
            ("message", json!("hello world")),
            ("tags", json!(["bug", "urgent"])),
            ("codes", json!([200, 201])),
            ("headers", json!({"content-type": "json"})),
        ]);

        assert!(check("message contains 'world'", &vars));
        assert!(!check("message contains 'foo'", &vars));
        assert!(check("tags contains 'bug'", &vars));
        assert!(!check("tags contains 'frontend'", &vars));
        assert!(check("codes contains 201", &vars));
        assert!(check("headers contains 'content-type'", &vars));
    }

    #[test]
    fn test_logical_operators() {
        let vars = vars_with(vec![("type", json!("feature")), ("priority", json!(5))]);

        assert!(check("type == 'bug' or priority > 3", &vars));
        assert!(!check("type == 'bug' or priority > 10", &vars));
        assert!(check("type == 'feature' and priority > 3", &vars));
        assert!(!check("type == 'feature' and priority > 10", &vars));
        assert!(check("not type == 'bug'", &vars));
        assert!(check(
            "priority > 10 or (type == 'feature' and not priority == 4)",
            &vars
        ));
    }

    #[test]
    fn test_node_output_paths() {
        let mut vars = Variables::default();
        vars.set_node_output("fetch", json!({"status": 503, "ok": false}));

        assert!(check("nodes.fetch.status >= 500", &vars));
        assert!(check("nodes.fetch.ok == false", &vars));
    }
}
