//! Canonical schema constants for structured logging
//!
//! Every component logs with these keys so operation boundaries can be
//! filtered and asserted on uniformly.

// Canonical field keys
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_BATCH_ID: &str = "batch_id";

// Indexing context
pub const FIELD_URI: &str = "uri";
pub const FIELD_TABLE: &str = "table";
pub const FIELD_CHUNK_INDEX: &str = "chunk_index";
pub const FIELD_ATTEMPT: &str = "attempt";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_RETRY: &str = "retry";
pub const EVENT_PROGRESS: &str = "progress";
