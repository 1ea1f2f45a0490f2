//! Transaction management
//!
//! - `TransactionManager::run` executes a unit of work inside
//!   BEGIN/COMMIT/ROLLBACK and retries it on deadlock
//! - `TransactionManager::with_savepoint` scopes a partial rollback inside
//!   a running transaction
//! - `Session` is the handle a unit of work issues statements through

pub mod manager;
pub mod session;

pub use manager::TransactionManager;
pub use session::Session;
