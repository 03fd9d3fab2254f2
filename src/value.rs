//! Dynamic configuration values.
//!
//! Parameters and variables in the config document may be plain strings or
//! arbitrarily nested lists/maps. This module provides the tagged variant
//! type used for all of them, together with the coercion rules applied when
//! a value is handed to Terraform as a string.
//!
//! Coercion rules (`to_var_string`):
//! - a top-level string is passed through verbatim
//! - numbers and booleans use their `Display` form
//! - lists and maps are rendered as HCL, so structured values survive the
//!   trip through a `TF_VAR_*` environment variable

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A dynamically typed configuration value.
///
/// Deserialized untagged, so YAML scalars, sequences, and mappings all map
/// onto the natural variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Coerce this value into the string handed to Terraform.
    pub fn to_var_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => self.to_hcl(0),
            Value::List(_) | Value::Map(_) => self.to_hcl(0),
        }
    }

    /// Render this value as an HCL expression. Strings are quoted, maps
    /// become indented blocks matching what `terraform console` prints.
    fn to_hcl(&self, indent: usize) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("{:?}", s),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_hcl(indent)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Map(entries) => {
                let pad = "  ".repeat(indent + 1);
                let mut out = String::from("{\n");
                for (k, v) in entries {
                    out.push_str(&format!("{}{} = {}\n", pad, k, v.to_hcl(indent + 1)));
                }
                out.push_str(&"  ".repeat(indent));
                out.push('}');
                out
            }
        }
    }

    /// Apply a fallible transformation to every string leaf, preserving
    /// structure. Used to run template rendering over nested values.
    pub fn try_map_strings<F>(&self, f: &F) -> Result<Value>
    where
        F: Fn(&str) -> Result<String>,
    {
        Ok(match self {
            Value::String(s) => Value::String(f(s)?),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| v.try_map_strings(f))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(entries) => {
                let mut mapped = IndexMap::with_capacity(entries.len());
                for (k, v) in entries {
                    mapped.insert(k.clone(), v.try_map_strings(f)?);
                }
                Value::Map(mapped)
            }
            other => other.clone(),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_string_passes_through_unquoted() {
        assert_eq!(Value::from("plain value").to_var_string(), "plain value");
    }

    #[test]
    fn test_scalars_use_display_form() {
        assert_eq!(Value::Int(42).to_var_string(), "42");
        assert_eq!(Value::Bool(true).to_var_string(), "true");
        assert_eq!(Value::Float(1.5).to_var_string(), "1.5");
    }

    #[test]
    fn test_map_renders_as_hcl_block() {
        let v = map(&[
            ("value1", Value::from("testvalue")),
            ("value2", Value::Bool(true)),
        ]);
        assert_eq!(
            v.to_var_string(),
            "{\n  value1 = \"testvalue\"\n  value2 = true\n}"
        );
    }

    #[test]
    fn test_nested_map_indents() {
        let v = map(&[("outer", map(&[("inner", Value::Int(1))]))]);
        assert_eq!(
            v.to_var_string(),
            "{\n  outer = {\n    inner = 1\n  }\n}"
        );
    }

    #[test]
    fn test_list_renders_inline() {
        let v = Value::List(vec![Value::from("a"), Value::Int(2)]);
        assert_eq!(v.to_var_string(), "[\"a\", 2]");
    }

    #[test]
    fn test_untagged_yaml_deserialization() {
        let v: Value = serde_yaml::from_str("42").unwrap();
        assert_eq!(v, Value::Int(42));
        let v: Value = serde_yaml::from_str("plain").unwrap();
        assert_eq!(v, Value::String("plain".to_string()));
        let v: Value = serde_yaml::from_str("{a: 1, b: two}").unwrap();
        assert_eq!(
            v,
            map(&[("a", Value::Int(1)), ("b", Value::from("two"))])
        );
    }

    #[test]
    fn test_try_map_strings_reaches_leaves() {
        let v = map(&[("k", Value::List(vec![Value::from("x")]))]);
        let mapped = v
            .try_map_strings(&|s| Ok(format!("{}!", s)))
            .unwrap();
        assert_eq!(
            mapped,
            map(&[("k", Value::List(vec![Value::from("x!")]))])
        );
    }
}
