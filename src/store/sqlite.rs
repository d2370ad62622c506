//! SQLite-backed executor.
//!
//! The connection lives behind a mutex and every statement runs on the
//! blocking pool. Booleans are stored as 0/1, UUIDs and timestamps as TEXT.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};

use super::executor::{Executor, Row};
use super::{StoreError, StoreResult};
use crate::catalog::Catalog;
use crate::sql::value::TIMESTAMP_FORMAT;
use crate::sql::{Dialect, Statement, Value};

/// Executor over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create every table and index that does not exist yet.
    pub async fn bootstrap(&self) -> StoreResult<()> {
        let script = Catalog::create_statements()
            .iter()
            .map(|stmt| format!("{};", stmt.to_sql(Dialect::Sqlite)))
            .collect::<Vec<_>>()
            .join("\n");
        self.execute_batch(script).await
    }

    /// Run a semicolon-separated script without parameters.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> StoreResult<()> {
        let sql = sql.into();
        self.run(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(&self, statement: &Statement) -> StoreResult<Vec<Row>> {
        let statement = statement.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&statement.sql)?;
            let width = stmt.column_count();
            let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(from_sqlite(row.get_ref(idx)?));
                }
                out.push(values);
            }
            Ok(out)
        })
        .await
    }

    async fn execute(&self, statement: &Statement) -> StoreResult<u64> {
        let statement = statement.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&statement.sql)?;
            let changed = stmt.execute(params_from_iter(statement.params.iter()))?;
            Ok(changed as u64)
        })
        .await
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Int(n) => ToSqlOutput::from(*n),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Bool(b) => ToSqlOutput::from(i64::from(*b)),
            Value::Uuid(u) => ToSqlOutput::from(u.to_string()),
            Value::Timestamp(ts) => ToSqlOutput::from(ts.format(TIMESTAMP_FORMAT).to_string()),
        })
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
