//! Database access seam
//!
//! Everything above this module talks to the store through the async
//! `Connection`/`Connector` traits and a bounded `ConnectionPool`; the
//! SQLite backend is one implementation of them.

pub mod connection;
pub mod pool;
pub mod sqlite;
pub mod value;

pub use connection::{Connection, Connector, Dialect};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use sqlite::{SqliteConnection, SqliteConnector};
pub use value::{Row, SqlValue};
