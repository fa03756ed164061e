//! Parsed, immutable segment rules.

use crate::ast::Expr;
use crate::eval;
use crate::parser::{Parser, DEFAULT_MAX_DEPTH};
use segment_core::error::{EvalError, SegmentResult};
use segment_core::types::{Truth, UserRecord};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// A parsed segment rule: the original text, a SHA-256 content hash used as
/// cache identity, and the root of the immutable expression tree. Once built
/// a rule is never mutated and may be shared (`Arc<Rule>`) across concurrent
/// evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    text: String,
    hash: String,
    root: Expr,
}

impl Rule {
    /// Parse rule text with the default nesting limit.
    pub fn parse(text: &str) -> SegmentResult<Rule> {
        Self::parse_with_max_depth(text, DEFAULT_MAX_DEPTH)
    }

    pub fn parse_with_max_depth(text: &str, max_depth: usize) -> SegmentResult<Rule> {
        let root = Parser::with_max_depth(text, max_depth).parse()?;
        let hash = content_hash(text);
        tracing::debug!(hash = %hash, "parsed segment rule");
        Ok(Rule {
            text: text.to_string(),
            hash,
            root,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hex-encoded SHA-256 of the rule text.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Every column name the rule references, for authoring-time validation
    /// against an attribute schema.
    pub fn referenced_columns(&self) -> BTreeSet<String> {
        let mut columns = BTreeSet::new();
        self.root.collect_columns(&mut columns);
        columns
    }

    /// Three-valued evaluation against a record.
    pub fn evaluate(&self, record: &UserRecord) -> Result<Truth, EvalError> {
        eval::evaluate(self, record)
    }

    /// Boundary result: does the record match this rule.
    pub fn matches(&self, record: &UserRecord) -> Result<bool, EvalError> {
        eval::matches(self, record)
    }
}

/// Content hash used as the rule cache key.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
