//! Attribute schema — the declared attribute universe for rule authoring and
//! user-record validation.

use segment_core::error::{SegmentError, ValidationError};
use segment_core::types::{AttributeValue, UserRecord};
use segment_rules::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Bool,
}

impl FieldType {
    fn describes(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (FieldType::String, AttributeValue::String(_))
                | (FieldType::Number, AttributeValue::Number(_))
                | (FieldType::Bool, AttributeValue::Bool(_))
        )
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub required: bool,
}

/// Declared attribute fields. Declared strings must be non-empty and declared
/// numbers finite and non-negative; attributes outside the schema pass
/// through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required field.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                field_type,
                required: true,
            },
        );
        self
    }

    /// Declare an optional field.
    pub fn optional_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                field_type,
                required: false,
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a user record against the schema: required fields present,
    /// no explicit nulls for declared fields, values typed as declared.
    pub fn validate_record(&self, record: &UserRecord) -> Result<(), ValidationError> {
        for (name, spec) in &self.fields {
            if spec.required && !record.contains(name) {
                return Err(ValidationError {
                    field: name.clone(),
                    reason: "missing required field".to_string(),
                });
            }
        }

        for (name, value) in record.iter() {
            let Some(spec) = self.fields.get(name) else {
                continue;
            };
            match value {
                AttributeValue::Null => {
                    return Err(ValidationError {
                        field: name.clone(),
                        reason: "field cannot be null".to_string(),
                    });
                }
                AttributeValue::String(s) if spec.field_type == FieldType::String => {
                    if s.is_empty() {
                        return Err(ValidationError {
                            field: name.clone(),
                            reason: "field cannot be empty".to_string(),
                        });
                    }
                }
                AttributeValue::Number(n) if spec.field_type == FieldType::Number => {
                    if !n.is_finite() || *n < 0.0 {
                        return Err(ValidationError {
                            field: name.clone(),
                            reason: "field must be a non-negative number".to_string(),
                        });
                    }
                }
                other if !spec.field_type.describes(other) => {
                    return Err(ValidationError {
                        field: name.clone(),
                        reason: format!("field must be a {}", spec.field_type.name()),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject rules referencing columns outside the schema.
    pub fn validate_rule(&self, rule: &Rule) -> Result<(), SegmentError> {
        let unknown: Vec<String> = rule
            .referenced_columns()
            .into_iter()
            .filter(|name| !self.fields.contains_key(name))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SegmentError::UnknownFields(unknown.join(", ")))
        }
    }
}
