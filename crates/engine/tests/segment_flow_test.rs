//! Integration test for the full segmentation flow: schema validation,
//! rule authoring, and high-volume classification of user records.

use segment_core::error::SegmentError;
use segment_core::types::UserRecord;
use segment_engine::{AttributeSchema, EngineError, FieldType, SegmentationEngine};
use std::collections::BTreeMap;

/// The player-profile attribute universe used by the rule-authoring surface.
fn player_schema() -> AttributeSchema {
    AttributeSchema::new()
        .field("id", FieldType::String)
        .field("level", FieldType::Number)
        .field("country", FieldType::String)
        .field("first_session", FieldType::Number)
        .field("last_session", FieldType::Number)
        .field("purchase_amount", FieldType::Number)
        .field("last_purchase_at", FieldType::Number)
        .optional_field("email", FieldType::String)
}

fn sample_player() -> UserRecord {
    UserRecord::new()
        .with("id", "player-001")
        .with("level", 27.0)
        .with("country", "US")
        .with("first_session", 1_690_000_000.0)
        .with("last_session", 1_699_990_000.0)
        .with("purchase_amount", 129.0)
        .with("last_purchase_at", 1_699_900_000.0)
        .with("email", "player@example.com")
}

#[test]
fn test_register_and_classify_players() {
    let engine = SegmentationEngine::new().with_schema(player_schema());

    let payers = engine
        .register_segment("payers", "purchase_amount > 0")
        .unwrap();
    let us_veterans = engine
        .register_segment("us_veterans", "country IN ('US','CA') AND level BETWEEN 20 AND 60")
        .unwrap();
    let lapsed = engine
        .register_segment("lapsed", "last_session < first_session + 86400")
        .unwrap();

    let memberships = engine.evaluate_user(&sample_player());
    assert!(memberships.contains(&payers.id));
    assert!(memberships.contains(&us_veterans.id));
    assert!(!memberships.contains(&lapsed.id));
}

#[test]
fn test_authoring_errors_are_client_visible() {
    let engine = SegmentationEngine::new().with_schema(player_schema());

    // Unknown column, caught at registration, not at evaluation.
    let err = engine
        .register_segment("typo", "levell > 10")
        .unwrap_err();
    assert!(matches!(err, SegmentError::UnknownFields(ref f) if f == "levell"));

    // Syntax error carries a source position for the diagnostic.
    let err = engine
        .register_segment("broken", "level > > 10")
        .unwrap_err();
    assert!(matches!(err, SegmentError::Syntax(_)));
}

#[test]
fn test_batch_preview_contract() {
    let engine = SegmentationEngine::new().with_schema(player_schema());

    let mut segments = BTreeMap::new();
    segments.insert(
        "whales".to_string(),
        "purchase_amount BETWEEN 100 AND 10000".to_string(),
    );
    segments.insert(
        "reachable".to_string(),
        "email IS NOT NULL AND email LIKE '%@example.com'".to_string(),
    );
    segments.insert("newcomers".to_string(), "level < 5".to_string());

    let results = engine
        .evaluate_segments(&sample_player(), &segments)
        .unwrap();
    assert_eq!(results["whales"], true);
    assert_eq!(results["reachable"], true);
    assert_eq!(results["newcomers"], false);
}

#[test]
fn test_batch_rejects_invalid_record() {
    let engine = SegmentationEngine::new().with_schema(player_schema());

    // purchase_amount missing entirely.
    let record = UserRecord::new()
        .with("id", "player-002")
        .with("level", 3.0)
        .with("country", "DE")
        .with("first_session", 1.0)
        .with("last_session", 2.0)
        .with("last_purchase_at", 3.0);

    let mut segments = BTreeMap::new();
    segments.insert("any".to_string(), "level > 0".to_string());

    let err = engine.evaluate_segments(&record, &segments).unwrap_err();
    assert!(
        matches!(err, EngineError::InvalidRecord(ref v) if v.field == "purchase_amount"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_unknown_is_never_a_match() {
    let engine = SegmentationEngine::new();
    let segment = engine
        .register_segment("engaged", "last_session > 1000")
        .unwrap();

    // No attributes at all: every comparison is UNKNOWN, which the boundary
    // collapses to non-match.
    assert!(engine.evaluate_user(&UserRecord::new()).is_empty());

    // IS NULL is the one form that observes the absence directly.
    let null_checked = engine
        .register_segment("dormant", "last_session IS NULL")
        .unwrap();
    let memberships = engine.evaluate_user(&UserRecord::new());
    assert!(!memberships.contains(&segment.id));
    assert!(memberships.contains(&null_checked.id));
}

#[test]
fn test_adversarial_rules_stay_inside_the_interpreter() {
    // Every crafted input must resolve to a parse error, an evaluation
    // error, or a boolean. The operator set is the AST enum; there is no
    // code-execution path to escape to.
    let engine = SegmentationEngine::new();
    let record = sample_player();

    let hostile = [
        "__import__('os') = 1",
        "exec('echo') = 1",
        "level; DROP TABLE users",
        "level > 18 OR system('reboot')",
        "eval(level) = 1",
        "'%s' LIKE '%s'",
        "((((((((((((((((((((level))))))))))))))))))))",
        "level / 0 > 1",
        "level + country > 2",
        "NOT NOT NOT NOT level > 1",
        "_now() = _now()",
        "-- comment",
        "1e309 > 0",
    ];

    for text in hostile {
        let mut segments = BTreeMap::new();
        segments.insert("probe".to_string(), text.to_string());
        match engine.evaluate_segments(&record, &segments) {
            Ok(results) => {
                // A definite boolean is the only successful outcome.
                assert!(results["probe"] == true || results["probe"] == false);
            }
            Err(EngineError::Segment { segment, .. }) => assert_eq!(segment, "probe"),
            Err(other) => panic!("unexpected error class for {text:?}: {other}"),
        }
    }
}

#[test]
fn test_rule_reuse_across_many_records() {
    let engine = SegmentationEngine::new();
    engine
        .register_segment("mid_level", "level BETWEEN 10 AND 50")
        .unwrap();

    let mut matched = 0;
    for level in 0..100 {
        let record = UserRecord::new().with("level", level as f64);
        if !engine.evaluate_user(&record).is_empty() {
            matched += 1;
        }
    }
    // Levels 10..=50 inclusive.
    assert_eq!(matched, 41);
}
