//! The built-in embedded engine, served under the `h2` engine name.
//!
//! Accepted locations, after the `h2:` marker:
//!
//! - `mem:<name>`: a private in-process database
//! - `file:<path>` or a bare `<path>`: a database file, created on first use
//!
//! Anything after the first `;` is an engine option and is ignored. All
//! sessions share one underlying connection and are serialized on it.

use std::{
    fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
};

use rusqlite::{params_from_iter, types::ValueRef};
use tessera_config::ConnectionSettings;
use tracing::{debug, warn};

use crate::{
    driver::{Connection, ConnectionSource, Driver},
    error::{DbError, Result},
    value::{Row, Value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Memory,
    File(PathBuf),
}

fn parse_location(url: &str) -> Result<Location> {
    let invalid = |reason: &str| {
        DbError::Configuration(format!("Unsupported embedded database URL '{url}': {reason}"))
    };

    let (_, rest) = url
        .split_once("h2:")
        .ok_or_else(|| invalid("missing 'h2:' marker"))?;
    let rest = rest.split(';').next().unwrap_or_default();

    if rest == "mem" || rest.starts_with("mem:") {
        return Ok(Location::Memory);
    }
    if rest.starts_with("tcp:") || rest.starts_with("ssl:") {
        return Err(invalid("remote servers are not supported"));
    }

    let path = rest.strip_prefix("file:").unwrap_or(rest);
    if path.is_empty() {
        return Err(invalid("no database path"));
    }
    Ok(Location::File(PathBuf::from(path)))
}

/// Driver for the in-process engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedDriver;

impl Driver for EmbeddedDriver {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ConnectionSource>> {
        let conn = match parse_location(settings.url())? {
            Location::Memory => rusqlite::Connection::open_in_memory()
                .map_err(|e| DbError::Connection(format!("in-memory database: {e}")))?,
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| {
                        DbError::Connection(format!("{}: {e}", parent.display()))
                    })?;
                }
                let conn = rusqlite::Connection::open(&path)
                    .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;

                // WAL mode for better concurrent access
                let mode: String = conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                    .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;
                debug!("Opened {} (journal_mode={mode})", path.display());
                conn
            }
        };

        if !settings.user().is_empty() {
            debug!("Embedded engine ignores credentials for user '{}'", settings.user());
        }

        Ok(Box::new(EmbeddedSource {
            conn: Mutex::new(conn),
        }))
    }
}

struct EmbeddedSource {
    conn: Mutex<rusqlite::Connection>,
}

impl ConnectionSource for EmbeddedSource {
    fn acquire(&self) -> Result<Box<dyn Connection + '_>> {
        // A session that panicked still rolled back on drop; the connection
        // itself is intact.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        if !conn.is_autocommit() {
            warn!("Discarding a transaction left open by a previous session");
            conn.execute_batch("ROLLBACK")?;
        }

        Ok(Box::new(EmbeddedConnection { conn }))
    }
}

struct EmbeddedConnection<'a> {
    conn: MutexGuard<'a, rusqlite::Connection>,
}

fn to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Integer(v) => Sql::Integer(*v),
        Value::Real(v) => Sql::Real(*v),
        Value::Text(v) => Sql::Text(v.clone()),
        Value::Bool(v) => Sql::Integer(i64::from(*v)),
    }
}

fn from_sql(column: &str, value: ValueRef<'_>) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Integer(v)),
        ValueRef::Real(v) => Ok(Value::Real(v)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|e| DbError::Decode {
                column: column.to_string(),
                message: e.to_string(),
            }),
        ValueRef::Blob(_) => Err(DbError::Decode {
            column: column.to_string(),
            message: "binary values are not supported".to_string(),
        }),
    }
}

impl Connection for EmbeddedConnection<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let changed = stmt.execute(params_from_iter(params.iter().map(to_sql)))?;
        Ok(changed)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let values = columns
                .iter()
                .enumerate()
                .map(|(i, column)| from_sql(column, row.get_ref(i)?))
                .collect::<Result<Vec<_>>>()?;
            result.push(Row::new(columns.clone(), values));
        }

        Ok(result)
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
