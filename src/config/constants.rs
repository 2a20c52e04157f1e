//! Configuration constants.
//!
//! Defaults for the connection lifecycle, the query retry budget, the import
//! transaction and the HTTP surface.

use std::time::Duration;

// Connection lifecycle
/// Minimum time between liveness probes of the singleton session.
///
/// Within this window `acquire()` hands back the cached session without
/// touching the network.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound on opening a new session (TCP connect + handshake + auth).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Query retry budget
/// Additional attempts after the first one (3 physical attempts in total).
pub const QUERY_MAX_RETRIES: usize = 2;
/// Base of the exponential backoff between query attempts, in milliseconds.
/// Delays grow as `base^n * RETRY_FACTOR`: 100ms, then 1s.
pub const RETRY_INITIAL_DELAY_MS: u64 = 10;
/// Multiplier applied to every backoff step.
pub const RETRY_FACTOR: u64 = 10;
/// Cap on a single delay between attempts.
pub const RETRY_MAX_DELAY_MS: u64 = 1_000;

// Bulk import
/// Per-statement bound inside the import transaction.
pub const STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum accepted upload size for spreadsheet imports (10MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// Store defaults
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_DB_NAME: &str = "chipflow";

// HTTP defaults
pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
