//! chipflow library: resilient data access and bulk import for a chip inventory
//!
//! The process keeps exactly one session to the store. Around it:
//!
//! - [`ConnectionManager`] opens it lazily, probes it at most once per
//!   reconnect interval, and replaces it when it is found dead.
//! - [`QueryExecutor`] runs single statements with a bounded retry budget on
//!   transient connection errors, never repeating a write that may have
//!   reached the server.
//! - [`BulkImporter`] imports a batch of loosely-shaped rows in one
//!   transaction: rows that fail validation or collide with an existing
//!   number are reported, the rest are committed, and nothing is committed if
//!   every row fails.
//!
//! # Example
//!
//! ```no_run
//! use chipflow::{init_context, rows_from_json, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     database_url: Some("sqlite::memory:".into()),
//!     create_tables: true,
//!     ..Default::default()
//! };
//! let ctx = init_context(&config).await?;
//!
//! let rows = rows_from_json(&serde_json::json!([
//!     {"Telefone": "(11) 98888-7777", "Operadora": "claro"}
//! ]))?;
//! let outcome = ctx.importer.import_batch(&rows).await?;
//! println!("imported {:?}, skipped {}", outcome.imported_ids, outcome.errors.len());
//!
//! ctx.manager.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! All database operations are async and need a Tokio runtime.

pub mod config;
pub mod error_handling;
pub mod import;
pub mod initialization;
pub mod server;
pub mod storage;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{DatabaseError, ImportError, InitializationError, RowRejection};
pub use import::{
    normalize, rows_from_csv, rows_from_json, rows_from_upload, BulkImporter, ImportOutcome,
    ImportRow, ImportSettings, RawRow, RowError,
};
pub use initialization::{init_context, init_logger_with, AppContext};
pub use storage::{
    ConnectionManager, ConnectionSettings, Connector, ExecutorSettings, Param, QueryExecutor,
    Session, SessionHandle, SqlConnector,
};
