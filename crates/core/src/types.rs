//! Shared value types: attribute scalars, user records, and three-valued logic.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A typed scalar attribute value. The closed set of types a user attribute
/// or rule literal may carry; arrays and objects are rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Number(_) => "number",
            AttributeValue::String(_) => "string",
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl TryFrom<&serde_json::Value> for AttributeValue {
    type Error = ValidationError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(AttributeValue::Null),
            serde_json::Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                let n = n.as_f64().ok_or_else(|| ValidationError {
                    field: String::new(),
                    reason: format!("number {n} is not representable as f64"),
                })?;
                Ok(AttributeValue::Number(n))
            }
            serde_json::Value::String(s) => Ok(AttributeValue::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(ValidationError {
                field: String::new(),
                reason: "attribute values must be scalar (string, number, bool, or null)"
                    .to_string(),
            }),
        }
    }
}

/// A flat attribute record for a single user. Absent keys are distinct from
/// explicit `Null` values at this level; the evaluator treats both as NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord {
    attributes: HashMap<String, AttributeValue>,
}

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable insert, mainly for tests and fixtures.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Build a record from a decoded JSON object, rejecting nested values.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let map = value.as_object().ok_or_else(|| ValidationError {
            field: String::new(),
            reason: "user record must be a JSON object".to_string(),
        })?;

        let mut record = UserRecord::new();
        for (key, raw) in map {
            let value = AttributeValue::try_from(raw).map_err(|e| ValidationError {
                field: key.clone(),
                reason: e.reason,
            })?;
            record.attributes.insert(key.clone(), value);
        }
        Ok(record)
    }
}

/// SQL three-valued logic. `Unknown` models comparisons that touched NULL
/// and collapses to non-match at the system boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub fn negate(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }

    pub fn is_true(self) -> bool {
        self == Truth::True
    }

    /// Collapse to a boolean match result. Unknown never authorizes a match.
    pub fn to_bool(self) -> bool {
        self == Truth::True
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
}
