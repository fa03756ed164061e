//! Segmentation engine — registry, validation, and batch evaluation of
//! SQL-like segment rules over user attribute records.

pub mod engine;
pub mod schema;

pub use engine::{EngineError, Segment, SegmentationEngine};
pub use schema::{AttributeSchema, FieldSpec, FieldType};
