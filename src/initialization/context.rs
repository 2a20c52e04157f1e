//! Shared data-access context.
//!
//! One `AppContext` per process. It owns the singleton connection manager and
//! hands the executor and importer built on top of it to whoever needs them;
//! nothing reaches the session through globals.

use std::sync::Arc;

use log::info;

use crate::config::Config;
use crate::error_handling::InitializationError;
use crate::import::BulkImporter;
use crate::storage::{ensure_chip_table, SqlConnectionManager, SqlConnector, SqlQueryExecutor};

/// The data-access collaborators, all sharing one session.
#[derive(Clone)]
pub struct AppContext {
    pub manager: Arc<SqlConnectionManager>,
    pub executor: SqlQueryExecutor,
    pub importer: BulkImporter<SqlConnector>,
}

impl AppContext {
    /// Wires the executor and importer onto `manager`.
    pub fn new(manager: Arc<SqlConnectionManager>, config: &Config) -> Self {
        Self {
            executor: SqlQueryExecutor::new(Arc::clone(&manager), config.executor_settings()),
            importer: BulkImporter::new(Arc::clone(&manager), config.import_settings()),
            manager,
        }
    }
}

/// Builds the context from `config`.
///
/// No session is opened here unless `create_tables` is set; the first
/// request connects lazily.
pub async fn init_context(config: &Config) -> Result<AppContext, InitializationError> {
    let connector = SqlConnector::new(config.database_url()?);
    info!("Using {} database backend", connector.backend());

    let manager = Arc::new(SqlConnectionManager::new(
        connector,
        config.connection_settings(),
    ));
    let context = AppContext::new(manager, config);

    if config.create_tables {
        ensure_chip_table(&context.executor).await?;
    }

    Ok(context)
}
