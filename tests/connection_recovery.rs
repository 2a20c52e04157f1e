//! Recovery through the public connector seam.
//!
//! Wraps the real SQLite connector with one that drops the first few connect
//! attempts, then checks how the executor and importer react.

mod helpers;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chipflow::storage::{ensure_chip_table, list_chips};
use chipflow::{
    rows_from_json, BulkImporter, ConnectionManager, ConnectionSettings, Connector,
    DatabaseError, ExecutorSettings, ImportError, ImportSettings, QueryExecutor, SqlConnector,
};
use serde_json::json;
use sqlx::AnyConnection;
use tempfile::TempDir;

struct FlakyConnector {
    inner: SqlConnector,
    failures_left: AtomicUsize,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for FlakyConnector {
    type Session = AnyConnection;

    async fn connect(&self) -> Result<AnyConnection, sqlx::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "reset during handshake",
            )));
        }
        self.inner.connect().await
    }
}

struct Setup {
    _dir: TempDir,
    manager: Arc<ConnectionManager<FlakyConnector>>,
    attempts: Arc<AtomicUsize>,
}

/// Database with the table already created, behind a connector that fails
/// its first `failures` connects.
async fn setup(failures: usize) -> Setup {
    let (dir, ctx) = helpers::create_test_context().await;
    ctx.manager.shutdown().await;

    let path = dir.path().join("chips.db");
    let attempts = Arc::new(AtomicUsize::new(0));
    let connector = FlakyConnector {
        inner: SqlConnector::new(format!("sqlite:{}?mode=rwc", path.display())),
        failures_left: AtomicUsize::new(failures),
        attempts: Arc::clone(&attempts),
    };
    Setup {
        _dir: dir,
        manager: Arc::new(ConnectionManager::new(
            connector,
            ConnectionSettings::default(),
        )),
        attempts,
    }
}

#[tokio::test]
async fn test_executor_retries_failed_connects() {
    let setup = setup(2).await;
    let executor = QueryExecutor::new(Arc::clone(&setup.manager), ExecutorSettings::default());

    let chips = list_chips(&executor).await.expect("third attempt connects");

    assert!(chips.is_empty());
    assert_eq!(setup.attempts.load(Ordering::SeqCst), 3);
    assert!(setup.manager.is_connected().await);
}

#[tokio::test]
async fn test_executor_budget_is_bounded() {
    let setup = setup(5).await;
    let executor = QueryExecutor::new(Arc::clone(&setup.manager), ExecutorSettings::default());

    let err = list_chips(&executor).await.expect_err("budget exhausted");

    assert!(matches!(err, DatabaseError::SqlError(sqlx::Error::Io(_))));
    assert_eq!(setup.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_importer_does_not_retry() {
    let setup = setup(1).await;
    let importer = BulkImporter::new(Arc::clone(&setup.manager), ImportSettings::default());
    let rows = rows_from_json(&json!([{"number": "11988887777"}])).expect("rows");

    let err = importer.import_batch(&rows).await.expect_err("connect failed");
    assert!(matches!(err, ImportError::Database(_)));
    assert_eq!(setup.attempts.load(Ordering::SeqCst), 1);

    // The caller decides to try again; the next call reconnects.
    let outcome = importer.import_batch(&rows).await.expect("second call");
    assert_eq!(outcome.imported_ids, vec![1]);
}

#[tokio::test]
async fn test_schema_bootstrap_through_flaky_connector() {
    let setup = setup(1).await;
    let executor = QueryExecutor::new(Arc::clone(&setup.manager), ExecutorSettings::default());

    // Acquisition failures are safe to retry even for DDL.
    ensure_chip_table(&executor).await.expect("bootstrap");
    assert_eq!(setup.attempts.load(Ordering::SeqCst), 2);
}
