//! Transactional bulk import.
//!
//! A batch runs as one transaction on the manager's current session:
//!
//! 1. `BEGIN`, then read `MAX(id)` once as the id cursor.
//! 2. Per row, in input order: normalize, check the number is not already
//!    stored (the check runs inside the transaction, so it also sees rows
//!    inserted earlier in the batch), insert with the cursor id, advance the
//!    cursor. Rejected rows are recorded and do not consume an id.
//! 3. Commit if at least one row was inserted, otherwise roll back.
//!
//! Nothing here is retried. A transaction cannot be resumed on another
//! session, so a lost connection or a statement timeout aborts the batch:
//! the transaction is dropped, the session discarded, and the error returned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use sqlx::{Any, AnyConnection, Connection, Row, Transaction};

use crate::config::STATEMENT_TIMEOUT;
use crate::error_handling::{is_unique_violation_on, DatabaseError, ImportError, RowRejection};
use crate::import::normalize::{normalize, ImportRow};
use crate::import::outcome::{ImportOutcome, RowError, RowOutcome};
use crate::import::source::SourceRow;
use crate::storage::{ConnectionManager, Connector};

const SELECT_CURSOR: &str = "SELECT COALESCE(MAX(id), 0) AS maxId FROM Chip";
const SELECT_BY_NUMBER: &str = "SELECT id FROM Chip WHERE number = ?";
const INSERT_CHIP: &str = "INSERT INTO Chip (id, number, status, operator, category, cid, createdAt, updatedAt) \
     VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)";

/// Bounds for statements inside an import transaction.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub statement_timeout: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            statement_timeout: STATEMENT_TIMEOUT,
        }
    }
}

/// Imports batches of chips over the manager's session.
pub struct BulkImporter<C: Connector<Session = AnyConnection>> {
    manager: Arc<ConnectionManager<C>>,
    settings: ImportSettings,
}

impl<C: Connector<Session = AnyConnection>> Clone for BulkImporter<C> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            settings: self.settings.clone(),
        }
    }
}

impl<C: Connector<Session = AnyConnection>> BulkImporter<C> {
    pub fn new(manager: Arc<ConnectionManager<C>>, settings: ImportSettings) -> Self {
        Self { manager, settings }
    }

    /// Imports `rows` as one all-or-nothing transaction with per-row reporting.
    ///
    /// Returns `ImportError::EmptyBatch` before touching the store when
    /// `rows` is empty. An outcome with no imported ids was rolled back.
    pub async fn import_batch(&self, rows: &[SourceRow]) -> Result<ImportOutcome, ImportError> {
        if rows.is_empty() {
            return Err(ImportError::EmptyBatch);
        }

        let handle = self.manager.acquire().await?;

        let result = {
            let mut session = handle.lock().await;
            self.run_transaction(&mut session, rows).await
        };

        if let Err(e) = &result {
            error!("Bulk import aborted: {e}");
            match e {
                DatabaseError::StatementTimeout(_) => self.manager.discard(handle).await,
                other => self.manager.observe_error(handle, other).await,
            }
        }

        result.map_err(ImportError::from)
    }

    async fn run_transaction(
        &self,
        conn: &mut AnyConnection,
        rows: &[SourceRow],
    ) -> Result<ImportOutcome, DatabaseError> {
        let mut tx = self.bounded(conn.begin()).await?;

        let max_id: i64 = self
            .bounded(sqlx::query(SELECT_CURSOR).fetch_one(&mut *tx))
            .await?
            .try_get("maxId")?;
        let mut cursor = max_id + 1;

        let mut outcome = ImportOutcome::default();
        for (origin, raw) in rows {
            let row_outcome = match normalize(raw, *origin) {
                Ok(row) => self.insert_row(&mut tx, &row, cursor).await?,
                Err(rejected) => RowOutcome::Rejected(rejected),
            };
            match &row_outcome {
                RowOutcome::Inserted(id) => {
                    debug!("Row {origin}: inserted chip {id}");
                    cursor += 1;
                }
                RowOutcome::Rejected(e) => warn!("Row {}: {}", e.row, e.message),
            }
            outcome.record(row_outcome);
        }

        if outcome.committed() {
            self.bounded(tx.commit()).await?;
            info!(
                "Imported {} chips ({} rows rejected)",
                outcome.imported_count,
                outcome.errors.len()
            );
        } else {
            self.bounded(tx.rollback()).await?;
            info!(
                "No chips imported, rolled back ({} rows rejected)",
                outcome.errors.len()
            );
        }

        Ok(outcome)
    }

    async fn insert_row(
        &self,
        tx: &mut Transaction<'_, Any>,
        row: &ImportRow,
        id: i64,
    ) -> Result<RowOutcome, DatabaseError> {
        let duplicate = || {
            RowOutcome::Rejected(RowError::new(
                row.raw_index,
                RowRejection::DuplicateNumber(row.number.clone()),
            ))
        };

        let existing = self
            .bounded(
                sqlx::query(SELECT_BY_NUMBER)
                    .bind(row.number.clone())
                    .fetch_optional(&mut **tx),
            )
            .await?;
        if existing.is_some() {
            return Ok(duplicate());
        }

        let inserted = self
            .bounded(
                sqlx::query(INSERT_CHIP)
                    .bind(id)
                    .bind(row.number.clone())
                    .bind(row.status.to_string())
                    .bind(row.operator.to_string())
                    .bind(row.category.to_string())
                    .bind(row.external_id.clone())
                    .execute(&mut **tx),
            )
            .await;

        match inserted {
            Ok(_) => Ok(RowOutcome::Inserted(id)),
            // Another writer took the number between the check and the insert.
            Err(e) if is_unique_violation_on(&e, "number") => Ok(duplicate()),
            // Any other clash (the cursor id taken by another writer) aborts
            // the batch: every later row would collide the same way.
            Err(e) => Err(e),
        }
    }

    async fn bounded<T, F>(&self, statement: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let limit = self.settings.statement_timeout;
        tokio::time::timeout(limit, statement)
            .await
            .map_err(|_| DatabaseError::StatementTimeout(limit))?
            .map_err(DatabaseError::SqlError)
    }
}
