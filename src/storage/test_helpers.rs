//! Shared test helpers for storage module tests.
//!
//! Provides a scripted in-process `Connector`/`Session` pair that counts
//! connects, pings, statements and closes, and an in-memory SQLite manager for
//! tests that need real SQL.

#![cfg(test)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::storage::session::{Connector, Param, Session};
use crate::storage::{ConnectionManager, ConnectionSettings, SqlConnector};

/// Failure a fake session or connector can be scripted to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    /// Socket reset by peer (transient).
    ConnectionReset,
    /// Nothing listening (not transient).
    ConnectionRefused,
    /// A permanent statement error.
    RowNotFound,
}

impl FakeFailure {
    fn to_error(self) -> sqlx::Error {
        match self {
            FakeFailure::ConnectionReset => sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
            FakeFailure::ConnectionRefused => sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            FakeFailure::RowNotFound => sqlx::Error::RowNotFound,
        }
    }
}

#[derive(Default)]
struct Script {
    connect_failures: VecDeque<FakeFailure>,
    ping_failures: usize,
    statement_failures: VecDeque<Option<FakeFailure>>,
    connect_delay: Duration,
    ping_delay: Duration,
}

/// Counters and scripted behaviour shared by a fake connector and its sessions.
#[derive(Clone, Default)]
pub struct FakeControl {
    connects: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
    statements: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    script: Arc<Mutex<Script>>,
}

impl FakeControl {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.script.lock().unwrap().connect_delay = delay;
    }

    /// Makes every later ping take `delay` before answering.
    pub fn set_ping_delay(&self, delay: Duration) {
        self.script.lock().unwrap().ping_delay = delay;
    }

    pub fn fail_next_connects(&self, n: usize) {
        self.fail_next_connects_with(n, FakeFailure::ConnectionRefused);
    }

    pub fn fail_next_connects_with(&self, n: usize, failure: FakeFailure) {
        let mut script = self.script.lock().unwrap();
        script
            .connect_failures
            .extend(std::iter::repeat(failure).take(n));
    }

    pub fn fail_next_pings(&self, n: usize) {
        self.script.lock().unwrap().ping_failures += n;
    }

    /// Scripts the next statement attempts in order; `None` succeeds.
    /// Unscripted attempts succeed.
    pub fn script_statements(&self, outcomes: impl IntoIterator<Item = Option<FakeFailure>>) {
        self.script
            .lock()
            .unwrap()
            .statement_failures
            .extend(outcomes);
    }
}

pub struct FakeConnector {
    control: FakeControl,
}

impl FakeConnector {
    pub fn new(control: FakeControl) -> Self {
        Self { control }
    }
}

pub struct FakeSession {
    id: usize,
    control: FakeControl,
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession, sqlx::Error> {
        let id = self.control.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let (delay, failure) = {
            let mut script = self.control.script.lock().unwrap();
            (script.connect_delay, script.connect_failures.pop_front())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(FakeSession {
                id,
                control: self.control.clone(),
            }),
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    /// Each row is `"<session id>:<statement>"`.
    type Row = String;

    async fn ping(&mut self) -> Result<(), sqlx::Error> {
        self.control.pings.fetch_add(1, Ordering::SeqCst);
        let delay = self.control.script.lock().unwrap().ping_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.control.script.lock().unwrap();
        if script.ping_failures > 0 {
            script.ping_failures -= 1;
            return Err(FakeFailure::ConnectionReset.to_error());
        }
        Ok(())
    }

    async fn fetch_all(
        &mut self,
        statement: &str,
        _params: &[Param],
    ) -> Result<Vec<String>, sqlx::Error> {
        self.control.statements.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .control
            .script
            .lock()
            .unwrap()
            .statement_failures
            .pop_front()
            .flatten();
        match outcome {
            Some(failure) => Err(failure.to_error()),
            None => Ok(vec![format!("{}:{}", self.id, statement)]),
        }
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.control.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A manager over a private in-memory SQLite database.
///
/// Each new session to `sqlite::memory:` is a fresh database, so tests using
/// this must not force a reconnect.
pub fn sqlite_memory_manager() -> Arc<ConnectionManager<SqlConnector>> {
    Arc::new(ConnectionManager::new(
        SqlConnector::new("sqlite::memory:"),
        ConnectionSettings::default(),
    ))
}
