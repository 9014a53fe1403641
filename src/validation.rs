//! Validation of caller-supplied variable values against the blueprint's
//! declarations, producing the immutable [`GenerationContext`].
//!
//! Validation is all-or-nothing: every declared variable is checked, every
//! failure is collected, and a context is only returned when none failed.

use crate::blueprint::{Blueprint, VariableDefinition, VariableType};
use crate::context::{GenerationContext, Value};
use crate::error::{Error, Result, ValidationError, ValidationErrors, ValidationReason};
use indexmap::IndexMap;
use log::{debug, warn};

/// Raw caller input: variable name to untyped value.
pub type RawInput = IndexMap<String, serde_json::Value>;

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}

/// Parses the textual boolean spellings accepted from command lines.
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl VariableDefinition {
    /// Value used when the variable is optional, absent and has no default.
    pub fn zero_value(&self) -> Value {
        match self.var_type {
            VariableType::String => Value::String(String::new()),
            VariableType::Integer => Value::Integer(0),
            VariableType::Boolean => Value::Boolean(false),
            VariableType::Choice if self.multiselect => Value::Choices(Vec::new()),
            VariableType::Choice => {
                Value::Choice(self.choices.first().cloned().unwrap_or_default())
            }
        }
    }

    /// Converts a raw value into the declared type and checks choices and pattern.
    pub fn check(&self, raw: &serde_json::Value) -> std::result::Result<Value, ValidationReason> {
        let value = self.coerce(raw)?;
        self.check_choices(&value)?;
        self.check_pattern(&value)?;
        Ok(value)
    }

    fn coerce(&self, raw: &serde_json::Value) -> std::result::Result<Value, ValidationReason> {
        let mismatch = || ValidationReason::TypeMismatch {
            expected: if self.multiselect {
                "list of choices".to_string()
            } else {
                self.var_type.as_str().to_string()
            },
            found: json_type_name(raw).to_string(),
        };

        match (self.var_type, raw) {
            (VariableType::String, serde_json::Value::String(s)) => Ok(Value::String(s.clone())),
            (VariableType::Integer, serde_json::Value::Number(n)) => {
                n.as_i64().map(Value::Integer).ok_or_else(mismatch)
            }
            (VariableType::Integer, serde_json::Value::String(s)) => {
                s.trim().parse::<i64>().map(Value::Integer).map_err(|_| mismatch())
            }
            (VariableType::Boolean, serde_json::Value::Bool(b)) => Ok(Value::Boolean(*b)),
            (VariableType::Boolean, serde_json::Value::String(s)) => {
                parse_bool(s).map(Value::Boolean).ok_or_else(mismatch)
            }
            (VariableType::Choice, serde_json::Value::String(s)) if self.multiselect => {
                Ok(Value::Choices(
                    s.split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(String::from)
                        .collect(),
                ))
            }
            (VariableType::Choice, serde_json::Value::Array(items)) if self.multiselect => items
                .iter()
                .map(|item| item.as_str().map(String::from).ok_or_else(mismatch))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Choices),
            (VariableType::Choice, serde_json::Value::String(s)) => Ok(Value::Choice(s.clone())),
            _ => Err(mismatch()),
        }
    }

    fn check_choices(&self, value: &Value) -> std::result::Result<(), ValidationReason> {
        if self.choices.is_empty() {
            return Ok(());
        }
        let invalid = |v: &str| ValidationReason::InvalidChoice {
            value: v.to_string(),
            choices: self.choices.clone(),
        };
        match value {
            Value::String(s) | Value::Choice(s) if !self.choices.contains(s) => Err(invalid(s)),
            Value::Choices(items) => match items.iter().find(|i| !self.choices.contains(i)) {
                Some(item) => Err(invalid(item)),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn check_pattern(&self, value: &Value) -> std::result::Result<(), ValidationReason> {
        let (Some(pattern), Some(text)) = (&self.pattern, value.as_str()) else {
            return Ok(());
        };
        if pattern.is_match(text) {
            Ok(())
        } else {
            Err(ValidationReason::PatternMismatch {
                value: text.to_string(),
                pattern: pattern.as_str().to_string(),
            })
        }
    }

    /// Resolves this variable from caller input, falling back to the default
    /// and then to the zero value.
    fn resolve(&self, input: &RawInput) -> std::result::Result<Value, ValidationReason> {
        match input.get(&self.name).filter(|v| !v.is_null()) {
            Some(raw) => self.check(raw),
            None => match &self.default {
                Some(default) => self.check(default),
                None if self.required => Err(ValidationReason::MissingRequired),
                None => Ok(self.zero_value()),
            },
        }
    }
}

/// Validates `input` against every variable the blueprint declares.
///
/// # Arguments
/// * `blueprint` - Loaded blueprint
/// * `input` - Flat map of caller-supplied values
///
/// # Returns
/// * `Result<GenerationContext>` - The typed, immutable context
///
/// # Errors
/// * `Error::ValidationErrors` listing one entry per offending variable
pub fn validate(blueprint: &Blueprint, input: &RawInput) -> Result<GenerationContext> {
    for key in input.keys() {
        if blueprint.variable(key).is_none() {
            warn!("Ignoring value for undeclared variable '{key}'");
        }
    }

    let mut values = IndexMap::with_capacity(blueprint.variables.len());
    let mut errors = ValidationErrors::new();

    for definition in &blueprint.variables {
        match definition.resolve(input) {
            Ok(value) => {
                debug!("Resolved variable {} = {}", definition.name, value);
                values.insert(definition.name.clone(), value);
            }
            Err(reason) => {
                errors.push(ValidationError { variable: definition.name.clone(), reason })
            }
        }
    }

    if !errors.is_empty() {
        return Err(Error::ValidationErrors(errors));
    }

    Ok(GenerationContext::from_values(values))
}
