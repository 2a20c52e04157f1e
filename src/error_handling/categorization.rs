//! Error categorization and retry strategy.
//!
//! Decides which database failures mean "the session is unusable, reconnect"
//! and builds the delay schedule used between query attempts.

use std::io::ErrorKind;
use std::time::Duration;

use sqlx::mysql::MySqlDatabaseError;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::DatabaseError;

/// ER_CON_COUNT_ERROR: server-wide connection limit reached.
const MYSQL_TOO_MANY_CONNECTIONS: u16 = 1040;
/// ER_TOO_MANY_USER_CONNECTIONS: per-account connection limit reached.
const MYSQL_TOO_MANY_USER_CONNECTIONS: u16 = 1203;
/// CR_SERVER_GONE_ERROR, reported by proxies that speak the client codes.
const MYSQL_SERVER_GONE: u16 = 2006;
/// CR_SERVER_LOST
const MYSQL_SERVER_LOST: u16 = 2013;

/// Creates the backoff schedule between query attempts.
///
/// Yields exactly `max_retries` delays, so a caller driving
/// `tokio_retry::RetryIf` performs at most `max_retries + 1` attempts.
pub fn get_retry_strategy(
    initial_delay_ms: u64,
    max_retries: usize,
) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(initial_delay_ms)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_millis(crate::config::RETRY_MAX_DELAY_MS))
        .take(max_retries)
}

/// Returns the MySQL server error number carried by a driver error, if any.
fn mysql_error_number(error: &sqlx::Error) -> Option<u16> {
    match error {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

/// The session was dropped by the server or the transport.
///
/// These are the conditions on which the cached handle must be discarded:
/// reset, aborted and broken-pipe sockets, EOF in the middle of the protocol,
/// and the "server gone / lost" codes.
pub fn is_connection_lost(error: &DatabaseError) -> bool {
    let Some(error) = error.as_sqlx() else {
        return false;
    };

    match error {
        sqlx::Error::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
                | ErrorKind::NotConnected
        ),
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => true,
        _ => matches!(
            mysql_error_number(error),
            Some(MYSQL_SERVER_GONE) | Some(MYSQL_SERVER_LOST)
        ),
    }
}

/// The server refused the session because of a connection limit.
///
/// A refused session never ran a statement, so retrying it cannot duplicate
/// a write.
pub fn is_session_refused(error: &DatabaseError) -> bool {
    error.as_sqlx().is_some_and(|e| {
        matches!(
            mysql_error_number(e),
            Some(MYSQL_TOO_MANY_CONNECTIONS) | Some(MYSQL_TOO_MANY_USER_CONNECTIONS)
        )
    })
}

/// Determines if an error is a transient connection error.
///
/// Transient errors are recovered by discarding the session and opening a new
/// one. Everything else (constraint violations, syntax errors, decode errors,
/// timeouts) is permanent from the caller's point of view.
pub fn is_transient_error(error: &DatabaseError) -> bool {
    is_connection_lost(error) || is_session_refused(error)
}

/// A unique-key violation on the index covering `column`.
///
/// Neither backend reports the constraint name through `constraint()`, so the
/// server message is matched as well: SQLite says `UNIQUE constraint failed:
/// Chip.number`, MySQL says `Duplicate entry '...' for key 'Chip.number'`.
/// A primary-key clash names `Chip.id` / `PRIMARY` and does not match
/// `number`.
pub fn is_unique_violation_on(error: &DatabaseError, column: &str) -> bool {
    match error.as_sqlx() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            db.constraint().is_some_and(|c| c.contains(column))
                || db.message().contains(column)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error(kind: ErrorKind) -> DatabaseError {
        DatabaseError::SqlError(sqlx::Error::Io(io::Error::new(kind, "socket")))
    }

    #[test]
    fn test_connection_lost_io_kinds() {
        for kind in [
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionAborted,
            ErrorKind::BrokenPipe,
            ErrorKind::UnexpectedEof,
            ErrorKind::NotConnected,
        ] {
            assert!(is_connection_lost(&io_error(kind)), "{kind:?}");
            assert!(is_transient_error(&io_error(kind)), "{kind:?}");
        }
    }

    #[test]
    fn test_connection_refused_is_not_transient() {
        // Nothing was listening; reconnecting immediately will not help.
        let err = io_error(ErrorKind::ConnectionRefused);
        assert!(!is_connection_lost(&err));
        assert!(!is_transient_error(&err));
    }

    #[test]
    fn test_worker_crash_is_connection_lost() {
        let err = DatabaseError::SqlError(sqlx::Error::WorkerCrashed);
        assert!(is_connection_lost(&err));
    }

    #[test]
    fn test_permanent_errors() {
        let row_not_found = DatabaseError::SqlError(sqlx::Error::RowNotFound);
        assert!(!is_transient_error(&row_not_found));

        let protocol = DatabaseError::SqlError(sqlx::Error::Protocol("bad packet".into()));
        assert!(!is_transient_error(&protocol));

        let timeout = DatabaseError::StatementTimeout(Duration::from_secs(1));
        assert!(!is_transient_error(&timeout));
        assert!(!is_session_refused(&timeout));

        let connect_timeout = DatabaseError::ConnectTimeout(Duration::from_secs(10));
        assert!(!is_transient_error(&connect_timeout));
    }

    #[test]
    fn test_unique_violation_needs_a_database_error() {
        let io = io_error(ErrorKind::ConnectionReset);
        assert!(!is_unique_violation_on(&io, "number"));

        let timeout = DatabaseError::StatementTimeout(Duration::from_secs(1));
        assert!(!is_unique_violation_on(&timeout, "number"));
    }

    #[test]
    fn test_retry_strategy_respects_budget() {
        let delays: Vec<Duration> = get_retry_strategy(10, 2).collect();
        assert_eq!(delays.len(), 2);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(1_000)));

        assert_eq!(get_retry_strategy(10, 0).count(), 0);
    }
}
