//! Connection lifecycle management.
//!
//! The process talks to the store over exactly one session. This module owns
//! it: created lazily on first `acquire()`, probed at most once per reconnect
//! interval, replaced when a probe or a statement shows it is dead, and closed
//! on shutdown.
//!
//! All state sits behind one async mutex that is held across the connect
//! call, so concurrent callers that find no session wait for a single connect
//! attempt and then share its result.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::config::{CONNECT_TIMEOUT, RECONNECT_INTERVAL};
use crate::error_handling::{is_connection_lost, DatabaseError};
use crate::storage::session::{Connector, Session};

/// Timing knobs for the lifecycle manager.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Minimum time between liveness probes of a cached session.
    pub reconnect_interval: Duration,
    /// Upper bound on opening a new session.
    pub connect_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_interval: RECONNECT_INTERVAL,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// A shared reference to the current session.
///
/// Cloning is cheap. The `generation` identifies which session this is: two
/// handles with the same generation refer to the same underlying session.
pub struct SessionHandle<S> {
    generation: u64,
    session: Arc<Mutex<S>>,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            session: Arc::clone(&self.session),
        }
    }
}

impl<S> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<S: Session> SessionHandle<S> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if both handles point at the same session instance.
    pub fn same_session(&self, other: &SessionHandle<S>) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Exclusive access to the session for the duration of the guard.
    ///
    /// Statements on one session never run in parallel; a transaction holds
    /// this guard from BEGIN to COMMIT/ROLLBACK.
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.session.lock().await
    }

    /// Closes the session if this is the last handle to it, waiting at most
    /// `limit` for the driver.
    async fn close(self, limit: Duration) {
        match Arc::try_unwrap(self.session) {
            Ok(session) => match tokio::time::timeout(limit, session.into_inner().close()).await {
                Ok(Ok(())) => info!("Database connection {} closed", self.generation),
                Ok(Err(e)) => warn!("Error closing database connection {}: {e}", self.generation),
                Err(_) => warn!(
                    "Closing database connection {} timed out after {limit:?}; dropped",
                    self.generation
                ),
            },
            Err(_) => debug!(
                "Database connection {} still in use; it closes when the last user drops it",
                self.generation
            ),
        }
    }
}

/// Process-wide connection state. Only touched with the manager's lock held.
struct ConnectionState<S> {
    handle: Option<SessionHandle<S>>,
    last_attempt: Option<Instant>,
}

/// Owns the single live session to the store.
///
/// Create one per process and pass it (in an `Arc`) to the collaborators that
/// need it; there is no ambient global.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    settings: ConnectionSettings,
    state: Mutex<ConnectionState<C::Session>>,
    generations: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, settings: ConnectionSettings) -> Self {
        Self {
            connector,
            settings,
            state: Mutex::new(ConnectionState {
                handle: None,
                last_attempt: None,
            }),
            generations: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Returns a usable session handle.
    ///
    /// Within the reconnect interval the cached handle is returned as is.
    /// Past it, an idle cached session is pinged and dropped if the ping fails;
    /// a session currently locked by another task is in use and counts as
    /// alive. When no session remains a new one is opened, bounded by the
    /// connect timeout. Connect failures are returned to the caller; this
    /// method never retries.
    pub async fn acquire(&self) -> Result<SessionHandle<C::Session>, DatabaseError> {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let interval_elapsed = state
            .last_attempt
            .map_or(true, |last| now.duration_since(last) > self.settings.reconnect_interval);

        if !interval_elapsed {
            if let Some(handle) = &state.handle {
                return Ok(handle.clone());
            }
        }

        state.last_attempt = Some(now);

        if let Some(handle) = state.handle.clone() {
            if self.probe(&handle).await {
                return Ok(handle);
            }
            warn!(
                "Database connection {} failed ping, creating new connection...",
                handle.generation
            );
            state.handle = None;
        }

        let handle = self.open().await?;
        state.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Closes and clears the current session. Safe to call with none open.
    pub async fn release(&self) {
        let handle = self.state.lock().await.handle.take();
        if let Some(handle) = handle {
            handle.close(self.settings.connect_timeout).await;
        }
    }

    /// Closes `handle`'s session if it is still the current one.
    ///
    /// Like `release()`, but a session opened by another task in the meantime
    /// is left alone. The caller hands its handle over so the session can be
    /// closed once the manager's own reference is taken out; any clones still
    /// held elsewhere keep it open until they drop.
    pub async fn discard(&self, handle: SessionHandle<C::Session>) {
        let taken = self.take_if_current(&handle).await;
        drop(handle);
        if let Some(taken) = taken {
            taken.close(self.settings.connect_timeout).await;
        }
    }

    /// Teardown at process shutdown.
    pub async fn shutdown(&self) {
        info!("Shutting down database connection manager");
        self.release().await;
    }

    /// Reports an error seen while using `handle`.
    ///
    /// Connection-lost errors discard the handle if it is still the current
    /// one, so the next `acquire()` reconnects. Callers must not hold the
    /// handle's session lock when calling this.
    pub async fn observe_error(&self, handle: SessionHandle<C::Session>, error: &DatabaseError) {
        if !is_connection_lost(error) {
            return;
        }
        warn!(
            "Database connection {} lost ({error}), will reconnect on next query...",
            handle.generation
        );
        self.discard(handle).await;
    }

    /// Whether a session is currently cached.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.handle.is_some()
    }

    async fn take_if_current(
        &self,
        handle: &SessionHandle<C::Session>,
    ) -> Option<SessionHandle<C::Session>> {
        let mut state = self.state.lock().await;
        let is_current = state
            .handle
            .as_ref()
            .is_some_and(|current| current.generation == handle.generation);
        if is_current {
            state.handle.take()
        } else {
            None
        }
    }

    /// Pings an idle session, bounded by the connect timeout. A session
    /// locked by another task is in use and counts as alive.
    async fn probe(&self, handle: &SessionHandle<C::Session>) -> bool {
        let Ok(mut session) = handle.session.try_lock() else {
            return true;
        };
        match tokio::time::timeout(self.settings.connect_timeout, session.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("Ping failed on connection {}: {e}", handle.generation);
                false
            }
            Err(_) => {
                debug!(
                    "Ping on connection {} timed out after {:?}",
                    handle.generation, self.settings.connect_timeout
                );
                false
            }
        }
    }

    async fn open(&self) -> Result<SessionHandle<C::Session>, DatabaseError> {
        info!("Creating new database connection...");

        let session = tokio::time::timeout(self.settings.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| {
                error!(
                    "Database connection attempt timed out after {:?}",
                    self.settings.connect_timeout
                );
                DatabaseError::ConnectTimeout(self.settings.connect_timeout)
            })?
            .map_err(|e| {
                error!("Failed to get database connection: {e}");
                DatabaseError::SqlError(e)
            })?;

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        info!("New database connection {generation} established");

        Ok(SessionHandle {
            generation,
            session: Arc::new(Mutex::new(session)),
        })
    }
}
