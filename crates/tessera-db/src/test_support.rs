//! Shared fixtures for unit tests: sample entities and a fault-injecting
//! driver that records every statement it receives.

#![allow(dead_code)]

use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use tessera_config::ConnectionSettings;
use tracing::Level;
use tracing_subscriber::{fmt::MakeWriter, util::SubscriberInitExt};

use crate::{
    define_entity,
    driver::{Connection, ConnectionSource, Driver},
    error::{DbError, Result},
    value::{Json, Row, Value},
};

define_entity!(
    /// A guild member.
    pub struct Member in members {
        table: "members",
        columns: {
            NAME => name: String,
            GROUP => group: String,
            SCORE => score: i64,
            NICKNAME => nickname: Option<String>
        }
    }
);

define_entity!(
    pub struct Guild in guilds {
        table: "guilds",
        columns: {
            NAME => name: String,
            ROLES => roles: Json<Vec<String>>,
            ACTIVE => active: bool,
            RATING => rating: f64,
        }
    }
);

define_entity!(
    pub struct Stray in strays {
        table: "strays",
        columns: {
            LABEL => label: String
        }
    }
);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Formatted log output collected on the current thread.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Runs `work` with every event on this thread written to the capture.
    pub fn during<R>(work: impl FnOnce() -> R) -> (R, Self) {
        let capture = Self::default();
        let _guard = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(Level::TRACE)
            .finish()
            .set_default();
        (work(), capture)
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).lines().map(str::to_string).collect()
    }

    /// Lines logged under `target`.
    pub fn lines_for(&self, target: &str) -> Vec<String> {
        let prefix = format!(" {target}: ");
        self.lines()
            .into_iter()
            .filter(|line| line.contains(&prefix))
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub statements: Vec<String>,
    pub connects: usize,
    pub acquired: usize,
    pub released: usize,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

/// Records statements instead of running them. Registered as `postgres`.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

pub const FAKE_URL: &str = "jdbc:postgresql://fake/bot";

impl FakeDriver {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings() -> ConnectionSettings {
        ConnectionSettings::new(FAKE_URL, "bot", "secret").with_debug(true)
    }

    /// Statements recorded so far, then forgets them.
    pub fn take_statements(&self) -> Vec<String> {
        std::mem::take(&mut self.state().statements)
    }
}

impl Driver for FakeDriver {
    fn connect(&self, _: &ConnectionSettings) -> Result<Box<dyn ConnectionSource>> {
        self.state().connects += 1;
        Ok(Box::new(self.clone()))
    }
}

impl ConnectionSource for FakeDriver {
    fn acquire(&self) -> Result<Box<dyn Connection + '_>> {
        self.state().acquired += 1;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnection {
    fn record(&self, sql: &str) -> MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.statements.push(sql.to_string());
        state
    }
}

impl Connection for FakeConnection {
    fn execute(&mut self, sql: &str, _: &[Value]) -> Result<usize> {
        self.record(sql);
        Ok(1)
    }

    fn query(&mut self, sql: &str, _: &[Value]) -> Result<Vec<Row>> {
        self.record(sql);
        if sql.starts_with("SELECT COUNT(*)") {
            return Ok(vec![Row::new(vec!["count".into()], vec![Value::Integer(0)])]);
        }
        Ok(Vec::new())
    }

    fn table_columns(&mut self, _: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn begin(&mut self) -> Result<()> {
        self.record("BEGIN");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.record("COMMIT").fail_commit {
            return Err(DbError::Query("commit failed".into()));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.record("ROLLBACK").fail_rollback {
            return Err(DbError::Query("rollback failed".into()));
        }
        Ok(())
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .released += 1;
    }
}
