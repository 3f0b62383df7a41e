pub mod commands;
pub mod pdf_import;
pub mod snapshot;

pub use pdf_import::{ImportLimits, StatementError};
pub use snapshot::{AggregateSnapshot, SnapshotStore};
