//! Structured logging facility
//!
//! - Process-wide subscriber setup via `init(profile)` (binaries only)
//! - `OpLogger`, the logger handle injected into every component; it emits
//!   `start`/`end`/`end_error` boundary events with canonical fields
//! - `TestCapture`, an in-memory subscriber handed to an `OpLogger` as a
//!   `Dispatch`, so tests assert on events without global state
//!
//! # Usage
//!
//! ```rust
//! use appview_core::logging_facility::OpLogger;
//!
//! let logger = OpLogger::new("repository");
//! logger.op_start("store");
//! logger.op_end("store", 3);
//! ```

pub mod init;
pub mod logger;
pub mod test_capture;

pub use init::{init, Profile};
pub use logger::{elapsed_ms, OpLogger};
pub use test_capture::{CapturedEvent, TestCapture};
