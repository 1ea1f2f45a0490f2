//! Core types shared across the AppView indexer crates
//!
//! - **Correlation ids**: `RequestId` for a caller operation, `BatchId` for
//!   one batch-engine invocation
//! - **Schema constants**: canonical structured-log field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{BatchId, RequestId};
