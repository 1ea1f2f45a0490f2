//! AppView Core - domain model and ambient facilities for the indexer
//!
//! This crate provides:
//! - Indexed record models (`Preprint`, `Review`) and their structured parts
//! - Batch outcome types shared by the batch engine and its callers
//! - The structured error facility (`ExError`, `ExErrorKind`, `RecordError`)
//! - The logging facility (`OpLogger`, subscriber profiles, test capture)
//! - Layered configuration (`IndexerConfig` and the options it carries)
//!
//! Nothing here touches the database; see `appview-store`.

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;

pub use config::{BatchConfig, IndexerConfig, IsolationLevel, RetryPolicy, TransactionOptions};
pub use errors::{ExError, ExErrorKind, RecordError, Result};
pub use logging_facility::OpLogger;
pub use model::{BatchFailure, BatchOutcome, Preprint, RecordUri, Review};
