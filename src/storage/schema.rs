//! Chip table bootstrap.
//!
//! One portable `CREATE TABLE IF NOT EXISTS`, valid for both MySQL and SQLite.
//! This is not a migration system: an existing table is left untouched.

use log::info;

use crate::error_handling::DatabaseError;
use crate::storage::executor::QueryExecutor;
use crate::storage::session::Connector;

pub(crate) const CREATE_CHIP_TABLE: &str = "CREATE TABLE IF NOT EXISTS Chip (
    id BIGINT PRIMARY KEY,
    number VARCHAR(11) NOT NULL UNIQUE,
    status VARCHAR(16) NOT NULL,
    operator VARCHAR(16) NOT NULL,
    category VARCHAR(32) NOT NULL,
    cid VARCHAR(32) NOT NULL DEFAULT '',
    createdAt TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updatedAt TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// Creates the `Chip` table if it does not exist.
pub async fn ensure_chip_table<C: Connector>(
    executor: &QueryExecutor<C>,
) -> Result<(), DatabaseError> {
    executor.execute(CREATE_CHIP_TABLE, &[]).await?;
    info!("Chip table ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::executor::ExecutorSettings;
    use crate::storage::test_helpers::sqlite_memory_manager;
    use crate::storage::Param;
    use sqlx::Row;

    #[tokio::test]
    async fn test_ensure_chip_table_is_repeatable() {
        let executor = QueryExecutor::new(sqlite_memory_manager(), ExecutorSettings::default());

        ensure_chip_table(&executor).await.expect("first create");
        ensure_chip_table(&executor).await.expect("second create");

        executor
            .execute(
                "INSERT INTO Chip (id, number, status, operator, category) VALUES (?, ?, ?, ?, ?)",
                &[
                    Param::Int(1),
                    Param::from("11988887777"),
                    Param::from("inactive"),
                    Param::from("VIVO"),
                    Param::from("FOR_DELIVERY"),
                ],
            )
            .await
            .expect("insert");

        let rows = executor
            .execute("SELECT cid FROM Chip WHERE id = ?", &[Param::Int(1)])
            .await
            .expect("select");
        assert_eq!(rows[0].get::<String, _>("cid"), "");
    }

    #[tokio::test]
    async fn test_number_is_unique() {
        let executor = QueryExecutor::new(sqlite_memory_manager(), ExecutorSettings::default());
        ensure_chip_table(&executor).await.expect("create");

        let insert = "INSERT INTO Chip (id, number, status, operator, category) VALUES (?, '1133334444', 'inactive', 'VIVO', 'FOR_DELIVERY')";
        executor.execute(insert, &[Param::Int(1)]).await.expect("first insert");
        let result = executor.execute(insert, &[Param::Int(2)]).await;
        assert!(matches!(
            result,
            Err(DatabaseError::SqlError(sqlx::Error::Database(_)))
        ));
    }
}
