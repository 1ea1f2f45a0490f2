//! Repository layer
//!
//! Bridges domain records to rows: `IndexedEntity` describes how one record
//! kind maps onto its table, and `RecordRepository` issues the idempotent
//! upserts, point reads, sparse updates and listings against it.

pub mod entity;
pub mod preprint_row;
pub mod record_repo;
pub mod review_row;

pub use entity::IndexedEntity;
pub use record_repo::{
    PreprintRepository, RecordRepository, ReviewRepository, UriPage, MAX_PAGE_SIZE,
};
