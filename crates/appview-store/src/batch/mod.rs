//! Batch engine
//!
//! Splits large write workloads into ordered chunks, runs each chunk as one
//! transaction-manager unit and reports per-item outcomes by input ordinal.

pub mod chunking;
pub mod engine;

pub use chunking::{chunk_ranges, ChunkRange};
pub use engine::BatchEngine;

use crate::db::SqlValue;
use appview_core::model::RecordUri;

/// New value for one column of one record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub key: RecordUri,
    pub value: SqlValue,
}

impl FieldUpdate {
    pub fn new(key: RecordUri, value: impl Into<SqlValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}
