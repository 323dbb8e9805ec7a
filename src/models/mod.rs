//! Core data models for changeslog
//!
//! Record-side types: what an audited record exposes to the recorder and
//! the identifiers used by log entries.

pub mod ids;
pub mod record;
pub mod value;

pub use ids::LogEntryId;
pub use record::{Auditable, DynamicRecord, RecordStore, RelatedKeys};
pub use value::{AttributeValue, Attributes, PrimaryKey};
