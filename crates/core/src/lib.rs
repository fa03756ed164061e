pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{SegmentError, SegmentResult};
pub use types::{AttributeValue, Truth, UserRecord};
