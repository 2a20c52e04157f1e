//! Resilient query execution.
//!
//! Runs one statement through the lifecycle manager with a bounded retry
//! budget for transient connection errors.
//!
//! # Retry boundary
//!
//! A statement is only repeated when repeating it cannot apply its effects
//! twice:
//! - the attempt failed while acquiring a session (nothing was sent), or
//! - the server refused the session on a connection limit, or
//! - the statement is read-only.
//!
//! A write that fails on a lost connection after being sent may already have
//! committed on the server. That error is returned to the caller after the
//! session is discarded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use tokio_retry::RetryIf;

use crate::config::{QUERY_MAX_RETRIES, RETRY_INITIAL_DELAY_MS};
use crate::error_handling::{get_retry_strategy, is_session_refused, is_transient_error, DatabaseError};
use crate::storage::connection::ConnectionManager;
use crate::storage::session::{Connector, Param, Session};

/// Rows produced by a connector's sessions.
pub type RowOf<C> = <<C as Connector>::Session as Session>::Row;

/// Retry knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Additional attempts after the first one.
    pub max_retries: usize,
    /// Base of the exponential backoff between attempts, in milliseconds.
    pub retry_initial_delay_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_retries: QUERY_MAX_RETRIES,
            retry_initial_delay_ms: RETRY_INITIAL_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptPhase {
    Acquire,
    Execute,
}

struct AttemptFailure {
    error: DatabaseError,
    retriable: bool,
}

/// Executes single statements outside of any transaction.
pub struct QueryExecutor<C: Connector> {
    manager: Arc<ConnectionManager<C>>,
    settings: ExecutorSettings,
}

impl<C: Connector> Clone for QueryExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            settings: self.settings.clone(),
        }
    }
}

impl<C: Connector> QueryExecutor<C> {
    pub fn new(manager: Arc<ConnectionManager<C>>, settings: ExecutorSettings) -> Self {
        Self { manager, settings }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<C>> {
        &self.manager
    }

    /// Runs `statement` with `params` and returns its rows.
    ///
    /// Makes at most `max_retries + 1` physical attempts. Non-transient errors
    /// are returned from the first attempt that hits them.
    pub async fn execute(
        &self,
        statement: &str,
        params: &[Param],
    ) -> Result<Vec<RowOf<C>>, DatabaseError> {
        let read_only = is_read_only(statement);
        let attempts = AtomicUsize::new(0);
        let strategy = get_retry_strategy(
            self.settings.retry_initial_delay_ms,
            self.settings.max_retries,
        );

        RetryIf::start(
            strategy,
            || self.attempt(statement, params, read_only, &attempts),
            |failure: &AttemptFailure| failure.retriable,
        )
        .await
        .map_err(|failure| {
            error!("Database query failed: {}", failure.error);
            failure.error
        })
    }

    async fn attempt(
        &self,
        statement: &str,
        params: &[Param],
        read_only: bool,
        attempts: &AtomicUsize,
    ) -> Result<Vec<RowOf<C>>, AttemptFailure> {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let handle = match self.manager.acquire().await {
            Ok(handle) => handle,
            Err(error) => {
                if is_transient_error(&error) {
                    self.manager.release().await;
                }
                return Err(self.classify(AttemptPhase::Acquire, error, read_only, attempt));
            }
        };

        let result = {
            let mut session = handle.lock().await;
            session.fetch_all(statement, params).await
        };

        match result {
            Ok(rows) => {
                if attempt > 1 {
                    debug!("Query succeeded on attempt {attempt}");
                }
                Ok(rows)
            }
            Err(e) => {
                let error = DatabaseError::SqlError(e);
                if is_transient_error(&error) {
                    self.manager.discard(handle).await;
                }
                Err(self.classify(AttemptPhase::Execute, error, read_only, attempt))
            }
        }
    }

    fn classify(
        &self,
        phase: AttemptPhase,
        error: DatabaseError,
        read_only: bool,
        attempt: usize,
    ) -> AttemptFailure {
        if !is_transient_error(&error) {
            return AttemptFailure {
                error,
                retriable: false,
            };
        }

        let retries_left = (self.settings.max_retries + 1).saturating_sub(attempt);
        let repeatable = phase == AttemptPhase::Acquire || read_only || is_session_refused(&error);

        if !repeatable {
            warn!("Connection lost after a write was sent; not retrying: {error}");
        } else if retries_left > 0 {
            warn!("Database query error ({retries_left} retries left): {error}");
            warn!("Retrying query after connection error...");
        }

        AttemptFailure {
            error,
            retriable: repeatable,
        }
    }
}

/// True for statements that cannot change data when repeated.
pub fn is_read_only(statement: &str) -> bool {
    let keyword = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN"
    )
}
