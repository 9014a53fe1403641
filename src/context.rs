//! Typed variable values and the immutable generation context built from them.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

/// A validated variable value.
///
/// Raw caller input is converted into this form once, at validation time.
/// Nothing downstream looks at raw input again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    /// A single selection from a declared choice set
    Choice(String),
    /// Selections from a multi-choice variable, in declaration order
    Choices(Vec<String>),
}

impl Value {
    /// Human readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Choice(_) => "choice",
            Value::Choices(_) => "list",
        }
    }

    /// Returns the textual value for string-like variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) | Value::Choice(s) => !s.is_empty(),
            Value::Integer(i) => *i != 0,
            Value::Boolean(b) => *b,
            Value::Choices(items) => !items.is_empty(),
        }
    }

    /// Converts into the JSON representation handed to templates and hooks.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) | Value::Choice(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Choices(items) => serde_json::Value::Array(
                items.iter().cloned().map(serde_json::Value::String).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Choice(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Choices(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) | Value::Choice(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Choices(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Resolved variable values of one generation run.
///
/// Only the validator constructs it; afterwards it is read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    values: IndexMap<String, Value>,
}

impl GenerationContext {
    pub(crate) fn from_values(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over variables in declaration order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.values.iter()
    }

    /// JSON object view of the context, in declaration order.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Serialize for GenerationContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Choice("jwt".into()).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(!Value::Choices(vec![]).is_truthy());
    }

    #[test]
    fn test_serialize_keeps_declaration_order() {
        let mut values = IndexMap::new();
        values.insert("Zeta".to_string(), Value::Integer(1));
        values.insert("Alpha".to_string(), Value::Choices(vec!["a".into(), "b".into()]));
        let context = GenerationContext::from_values(values);

        let serialized = serde_json::to_string(&context).unwrap();
        assert_eq!(serialized, r#"{"Zeta":1,"Alpha":["a","b"]}"#);
    }
}
