//! Data access layer.
//!
//! - `session`: the connector/session seam and the sqlx `Any` implementation
//! - `connection`: the single-session lifecycle manager
//! - `executor`: bounded-retry statement execution
//! - `schema`: chip table bootstrap
//! - `chips`: simple chip reads and deletes through the executor

pub mod chips;
pub mod connection;
pub mod executor;
pub mod schema;
pub mod session;

pub(crate) mod test_helpers;

pub use chips::{delete_chip, get_chip, list_chips, Chip};
pub use connection::{ConnectionManager, ConnectionSettings, SessionHandle};
pub use executor::{is_read_only, ExecutorSettings, QueryExecutor, RowOf};
pub use schema::ensure_chip_table;
pub use session::{Connector, Param, Session, SqlConnector};

/// Manager over the production driver.
pub type SqlConnectionManager = ConnectionManager<SqlConnector>;
/// Executor over the production driver.
pub type SqlQueryExecutor = QueryExecutor<SqlConnector>;
