//! Core segmentation engine — registers segments and classifies user
//! records against them.

use crate::schema::AttributeSchema;
use chrono::{DateTime, Utc};
use segment_cache::RuleCache;
use segment_core::config::AppConfig;
use segment_core::error::{SegmentError, SegmentResult, ValidationError};
use segment_core::types::UserRecord;
use segment_rules::Rule;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// A registered segment: a named, compiled rule.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    pub rule: Arc<Rule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Errors surfaced by batch evaluation, carrying the offending segment name
/// for client-facing diagnostics.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid user record: {0}")]
    InvalidRecord(#[from] ValidationError),

    #[error("error in segment '{segment}': {source}")]
    Segment {
        segment: String,
        source: SegmentError,
    },
}

pub struct SegmentationEngine {
    segments: dashmap::DashMap<Uuid, Segment>,
    cache: RuleCache,
    schema: Option<AttributeSchema>,
}

impl SegmentationEngine {
    pub fn new() -> Self {
        Self::with_config(&AppConfig::default())
    }

    pub fn with_config(config: &AppConfig) -> Self {
        Self {
            segments: dashmap::DashMap::new(),
            cache: RuleCache::from_config(&config.cache)
                .with_max_nesting_depth(config.rules.max_nesting_depth),
            schema: None,
        }
    }

    /// Restrict rules and records to a declared attribute universe.
    pub fn with_schema(mut self, schema: AttributeSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Parse, validate, and register a named segment rule. Authoring errors
    /// (lex, syntax, unknown fields) surface here.
    pub fn register_segment(&self, name: impl Into<String>, rule_text: &str) -> SegmentResult<Segment> {
        let rule = self.compile(rule_text)?;
        let now = Utc::now();
        let segment = Segment {
            id: Uuid::new_v4(),
            name: name.into(),
            rule,
            created_at: now,
            updated_at: now,
        };
        self.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    /// Replace a registered segment's rule, bumping `updated_at`.
    pub fn update_rule(&self, id: Uuid, rule_text: &str) -> SegmentResult<bool> {
        let rule = self.compile(rule_text)?;
        match self.segments.get_mut(&id) {
            Some(mut entry) => {
                entry.rule = rule;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_segment(&self, id: &Uuid) -> bool {
        self.segments.remove(id).is_some()
    }

    pub fn get_segment(&self, id: &Uuid) -> Option<Segment> {
        self.segments.get(id).map(|s| s.clone())
    }

    pub fn list_segments(&self) -> Vec<Segment> {
        self.segments.iter().map(|s| s.value().clone()).collect()
    }

    /// Ids of every registered segment the record matches. Evaluation is
    /// fail-closed per segment: a per-rule evaluation error logs a warning
    /// and counts as non-match without aborting the sweep.
    pub fn evaluate_user(&self, record: &UserRecord) -> Vec<Uuid> {
        let mut memberships = Vec::new();
        for entry in self.segments.iter() {
            let segment = entry.value();
            match segment.rule.matches(record) {
                Ok(true) => memberships.push(segment.id),
                Ok(false) => {}
                Err(e) => {
                    warn!(segment = %segment.name, error = %e, "segment evaluation failed, treating as non-match");
                }
            }
        }
        memberships
    }

    /// Evaluate a batch of ad-hoc named rules against one record, the
    /// rule-authoring surface's preview contract. The record is validated
    /// once up front; the first rule error aborts with the segment name.
    pub fn evaluate_segments(
        &self,
        record: &UserRecord,
        segments: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, bool>, EngineError> {
        if let Some(schema) = &self.schema {
            schema.validate_record(record)?;
        }

        let mut results = BTreeMap::new();
        for (name, rule_text) in segments {
            let rule = self
                .compile(rule_text)
                .map_err(|source| EngineError::Segment {
                    segment: name.clone(),
                    source,
                })?;
            let matched = rule
                .matches(record)
                .map_err(|e| EngineError::Segment {
                    segment: name.clone(),
                    source: e.into(),
                })?;
            results.insert(name.clone(), matched);
        }
        Ok(results)
    }

    /// Parse through the cache and check the schema, if one is declared.
    fn compile(&self, rule_text: &str) -> SegmentResult<Arc<Rule>> {
        let rule = self.cache.get_or_parse(rule_text)?;
        if let Some(schema) = &self.schema {
            schema.validate_rule(&rule)?;
        }
        Ok(rule)
    }
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn engine() -> SegmentationEngine {
        SegmentationEngine::new()
    }

    #[test]
    fn test_register_and_evaluate_user() {
        let engine = engine();
        let adults = engine.register_segment("adults", "age >= 18").unwrap();
        let us = engine.register_segment("us_users", "country = 'US'").unwrap();

        let record = UserRecord::new().with("age", 30.0).with("country", "DE");
        let memberships = engine.evaluate_user(&record);

        assert!(memberships.contains(&adults.id));
        assert!(!memberships.contains(&us.id));
    }

    #[test]
    fn test_register_rejects_bad_rule() {
        let engine = engine();
        assert!(engine.register_segment("broken", "age >").is_err());
        assert!(engine.list_segments().is_empty());
    }

    #[test]
    fn test_schema_rejects_unknown_rule_fields() {
        let engine = SegmentationEngine::new()
            .with_schema(AttributeSchema::new().field("age", FieldType::Number));
        assert!(engine.register_segment("ok", "age > 18").is_ok());

        let err = engine.register_segment("bad", "agee > 18").unwrap_err();
        assert!(matches!(err, SegmentError::UnknownFields(_)));
    }

    #[test]
    fn test_update_rule() {
        let engine = engine();
        let segment = engine.register_segment("vip", "level > 50").unwrap();

        assert!(engine.update_rule(segment.id, "level > 10").unwrap());
        let updated = engine.get_segment(&segment.id).unwrap();
        assert_eq!(updated.rule.text(), "level > 10");
        assert!(updated.updated_at >= segment.updated_at);

        assert!(!engine.update_rule(Uuid::new_v4(), "level > 1").unwrap());
    }

    #[test]
    fn test_evaluation_error_is_scoped_to_one_segment() {
        let engine = engine();
        engine.register_segment("numeric", "level * 2 > 10").unwrap();
        let ok = engine.register_segment("country", "country = 'US'").unwrap();

        // `level` is a string here, so the first segment errors out; the
        // sweep still reports the second.
        let record = UserRecord::new().with("level", "high").with("country", "US");
        let memberships = engine.evaluate_user(&record);
        assert_eq!(memberships, vec![ok.id]);
    }

    #[test]
    fn test_batch_evaluation() {
        let engine = engine();
        let record = UserRecord::new()
            .with("level", 12.0)
            .with("country", "US");

        let mut segments = BTreeMap::new();
        segments.insert("high_level".to_string(), "level >= 10".to_string());
        segments.insert("eu".to_string(), "country IN ('DE','FR')".to_string());

        let results = engine.evaluate_segments(&record, &segments).unwrap();
        assert_eq!(results["high_level"], true);
        assert_eq!(results["eu"], false);
    }

    #[test]
    fn test_batch_evaluation_names_broken_segment() {
        let engine = engine();
        let mut segments = BTreeMap::new();
        segments.insert("fine".to_string(), "level > 1".to_string());
        segments.insert("broken".to_string(), "level >".to_string());

        let err = engine
            .evaluate_segments(&UserRecord::new().with("level", 2.0), &segments)
            .unwrap_err();
        assert!(matches!(err, EngineError::Segment { ref segment, .. } if segment == "broken"));
    }
}
