//! Single-row chip operations.
//!
//! These go through the bounded-retry executor, one statement per call, with
//! no transaction. Reads are retried on transient errors; the delete is only
//! retried when it never reached the server.

use serde::Serialize;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

use crate::error_handling::DatabaseError;
use crate::storage::executor::QueryExecutor;
use crate::storage::session::{Connector, Param};

const SELECT_CHIP_COLUMNS: &str = "SELECT id, number, status, operator, category, cid, \
     CAST(createdAt AS CHAR) AS createdAt, CAST(updatedAt AS CHAR) AS updatedAt FROM Chip";

/// A stored chip as returned by the read endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chip {
    pub id: i64,
    pub number: String,
    pub status: String,
    pub operator: String,
    pub category: String,
    pub cid: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Chip {
    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            number: row.try_get("number")?,
            status: row.try_get("status")?,
            operator: row.try_get("operator")?,
            category: row.try_get("category")?,
            cid: row.try_get("cid")?,
            created_at: row.try_get("createdAt")?,
            updated_at: row.try_get("updatedAt")?,
        })
    }
}

fn map_rows(rows: &[AnyRow]) -> Result<Vec<Chip>, DatabaseError> {
    rows.iter()
        .map(|row| Chip::from_row(row).map_err(DatabaseError::SqlError))
        .collect()
}

/// All chips ordered by id.
pub async fn list_chips<C>(executor: &QueryExecutor<C>) -> Result<Vec<Chip>, DatabaseError>
where
    C: Connector<Session = AnyConnection>,
{
    let statement = format!("{SELECT_CHIP_COLUMNS} ORDER BY id");
    let rows = executor.execute(&statement, &[]).await?;
    map_rows(&rows)
}

/// The chip with `id`, if any.
pub async fn get_chip<C>(executor: &QueryExecutor<C>, id: i64) -> Result<Option<Chip>, DatabaseError>
where
    C: Connector<Session = AnyConnection>,
{
    let statement = format!("{SELECT_CHIP_COLUMNS} WHERE id = ?");
    let rows = executor.execute(&statement, &[Param::Int(id)]).await?;
    Ok(map_rows(&rows)?.into_iter().next())
}

/// Deletes the chip with `id` and returns it, or `None` if there was none.
pub async fn delete_chip<C>(
    executor: &QueryExecutor<C>,
    id: i64,
) -> Result<Option<Chip>, DatabaseError>
where
    C: Connector<Session = AnyConnection>,
{
    let Some(chip) = get_chip(executor, id).await? else {
        return Ok(None);
    };
    executor
        .execute("DELETE FROM Chip WHERE id = ?", &[Param::Int(id)])
        .await?;
    Ok(Some(chip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::executor::ExecutorSettings;
    use crate::storage::schema::ensure_chip_table;
    use crate::storage::test_helpers::sqlite_memory_manager;
    use crate::storage::SqlConnector;

    async fn seeded() -> QueryExecutor<SqlConnector> {
        let executor = QueryExecutor::new(sqlite_memory_manager(), ExecutorSettings::default());
        ensure_chip_table(&executor).await.expect("create");
        for (id, number) in [(1, "11988887777"), (2, "21977776666")] {
            executor
                .execute(
                    "INSERT INTO Chip (id, number, status, operator, category, cid) \
                     VALUES (?, ?, 'active', 'CLARO', 'BANNED', '8955')",
                    &[Param::Int(id), Param::from(number)],
                )
                .await
                .expect("seed");
        }
        executor
    }

    #[tokio::test]
    async fn test_list_chips_in_id_order() {
        let executor = seeded().await;
        let chips = list_chips(&executor).await.expect("list");

        assert_eq!(chips.len(), 2);
        assert_eq!(chips[0].id, 1);
        assert_eq!(chips[0].number, "11988887777");
        assert_eq!(chips[1].operator, "CLARO");
        assert!(!chips[1].created_at.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_chip() {
        let executor = seeded().await;
        assert!(get_chip(&executor, 42).await.expect("get").is_none());
        let chip = get_chip(&executor, 2).await.expect("get").expect("present");
        assert_eq!(chip.cid, "8955");
    }

    #[tokio::test]
    async fn test_delete_chip() {
        let executor = seeded().await;

        let deleted = delete_chip(&executor, 1).await.expect("delete");
        assert_eq!(deleted.map(|c| c.number), Some("11988887777".to_string()));
        assert!(delete_chip(&executor, 1).await.expect("second delete").is_none());
        assert_eq!(list_chips(&executor).await.expect("list").len(), 1);
    }

    #[test]
    fn test_chip_serializes_camel_case() {
        let chip = Chip {
            id: 7,
            number: "11988887777".into(),
            status: "inactive".into(),
            operator: "VIVO".into(),
            category: "FOR_DELIVERY".into(),
            cid: String::new(),
            created_at: "2024-01-01 00:00:00".into(),
            updated_at: "2024-01-01 00:00:00".into(),
        };
        let json = serde_json::to_value(&chip).expect("serialize");
        assert_eq!(json["createdAt"], "2024-01-01 00:00:00");
        assert_eq!(json["operator"], "VIVO");
    }
}
