// Shared test helpers for database setup and import data.
//
// Integration tests use on-disk SQLite through the same `Any` driver as
// production, so a session can be released and reopened without losing data.

use serde_json::Value;
use sqlx::Row;
use tempfile::TempDir;

use chipflow::{init_context, rows_from_json, AppContext, Config, ImportOutcome, Param};

/// A context over a fresh on-disk database with the chip table created.
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub async fn create_test_context() -> (TempDir, AppContext) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let ctx = create_test_context_at(&dir).await;
    (dir, ctx)
}

/// A second, independent context over the database in `dir`.
pub async fn create_test_context_at(dir: &TempDir) -> AppContext {
    let path = dir.path().join("chips.db");
    let config = Config {
        database_url: Some(format!("sqlite:{}?mode=rwc", path.display())),
        create_tables: true,
        ..Default::default()
    };
    init_context(&config)
        .await
        .expect("Failed to initialize test context")
}

/// Imports a JSON array through the importer.
#[allow(dead_code)] // Not every test file uses every helper
pub async fn import_json(ctx: &AppContext, payload: Value) -> ImportOutcome {
    let rows = rows_from_json(&payload).expect("Failed to decode rows");
    ctx.importer
        .import_batch(&rows)
        .await
        .expect("Import failed")
}

/// Number of stored chips.
#[allow(dead_code)]
pub async fn count_chips(ctx: &AppContext) -> i64 {
    let rows = ctx
        .executor
        .execute("SELECT COUNT(*) AS n FROM Chip", &[])
        .await
        .expect("Failed to count chips");
    rows[0].get::<i64, _>("n")
}

/// Ids stored for `number`.
#[allow(dead_code)]
pub async fn ids_for_number(ctx: &AppContext, number: &str) -> Vec<i64> {
    ctx.executor
        .execute(
            "SELECT id FROM Chip WHERE number = ? ORDER BY id",
            &[Param::from(number)],
        )
        .await
        .expect("Failed to query chip")
        .iter()
        .map(|row| row.get::<i64, _>("id"))
        .collect()
}
