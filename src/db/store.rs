//! sqlx-backed query function.
//!
//! Provides the `SqlStore` struct that implements the `QueryFn` trait for
//! SQLite and MySQL databases. Every call opens its own connection, runs one
//! statement and closes the connection again.

use super::{check_call, Call, DatabaseBackend, QueryFn, QueryOutput, Record, Value};
use crate::config::DatabaseConfig;
use crate::error::{GameSearchError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::types::chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::types::BigDecimal;
use sqlx::{Column, ColumnIndex, Connection, Decode, MySql, Row, Sqlite, Type, TypeInfo, ValueRef};
use std::time::{Duration, Instant};
use tracing::debug;

/// Statement timeout in seconds.
const STATEMENT_TIMEOUT_SECS: u64 = 30;

/// Connection timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Declared parameters: `run_query(query, params=None, fetch=True)`.
const PARAMETERS: [&str; 3] = ["query", "params", "fetch"];

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;
type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Query function backed by a SQLite or MySQL database.
#[derive(Debug, Clone)]
pub struct SqlStore {
    backend: DatabaseBackend,
    conn_str: String,
    config: DatabaseConfig,
}

impl SqlStore {
    /// Creates a store for the configured database. No connection is opened yet.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let backend = config.backend()?;
        let conn_str = config.to_connection_string()?;
        Ok(Self {
            backend,
            conn_str,
            config: config.clone(),
        })
    }

    /// The backend this store talks to.
    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Display-safe description of the target database.
    pub fn display_string(&self) -> String {
        self.config.display_string()
    }

    async fn run(&self, sql: &str, params: &[Value], fetch: bool) -> Result<QueryOutput> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_secs(STATEMENT_TIMEOUT_SECS), async {
            match self.backend {
                DatabaseBackend::Sqlite => self.run_sqlite(sql, params, fetch).await,
                DatabaseBackend::MySql => self.run_mysql(sql, params, fetch).await,
            }
        })
        .await
        .map_err(|_| {
            GameSearchError::query(format!(
                "Statement timed out after {STATEMENT_TIMEOUT_SECS} seconds"
            ))
        })?;

        debug!(
            backend = self.backend.as_str(),
            fetch,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Statement finished"
        );
        result
    }

    async fn run_sqlite(&self, sql: &str, params: &[Value], fetch: bool) -> Result<QueryOutput> {
        let mut conn = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            SqliteConnection::connect(&self.conn_str),
        )
        .await
        .map_err(|_| self.connect_timeout())?
        .map_err(|e| map_connection_error(e, &self.config))?;
        debug!("Opened sqlite connection");

        let result = execute_sqlite(&mut conn, sql, params, fetch).await;

        if let Err(e) = conn.close().await {
            debug!("Closing sqlite connection failed: {e}");
        }
        result
    }

    async fn run_mysql(&self, sql: &str, params: &[Value], fetch: bool) -> Result<QueryOutput> {
        let mut conn = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            MySqlConnection::connect(&self.conn_str),
        )
        .await
        .map_err(|_| self.connect_timeout())?
        .map_err(|e| map_connection_error(e, &self.config))?;
        debug!("Opened mysql connection");

        let result = execute_mysql(&mut conn, sql, params, fetch).await;

        if let Err(e) = conn.close().await {
            debug!("Closing mysql connection failed: {e}");
        }
        result
    }

    fn connect_timeout(&self) -> GameSearchError {
        GameSearchError::connection(format!(
            "Connection to {} timed out. The server may be overloaded or unreachable.",
            self.config.display_string()
        ))
    }
}

#[async_trait]
impl QueryFn for SqlStore {
    fn parameters(&self) -> Vec<String> {
        PARAMETERS.iter().map(|p| p.to_string()).collect()
    }

    async fn call(&self, call: Call<'_>) -> Result<QueryOutput> {
        check_call("run_query", &self.parameters(), &call)?;
        self.run(call.sql(), call.params(), call.wants_rows()).await
    }
}

async fn execute_sqlite(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
    fetch: bool,
) -> Result<QueryOutput> {
    let query = params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_sqlite(query, value));

    if fetch {
        let rows = query.fetch_all(&mut *conn).await.map_err(query_error)?;
        return Ok(QueryOutput::Records(rows.iter().map(sqlite_record).collect()));
    }

    let mut tx = conn.begin().await.map_err(query_error)?;
    let done = query.execute(&mut *tx).await.map_err(query_error)?;
    tx.commit().await.map_err(query_error)?;
    debug!(rows_affected = done.rows_affected(), "Statement committed");
    Ok(QueryOutput::Null)
}

async fn execute_mysql(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[Value],
    fetch: bool,
) -> Result<QueryOutput> {
    let query = params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_mysql(query, value));

    if fetch {
        let rows = query.fetch_all(&mut *conn).await.map_err(query_error)?;
        return Ok(QueryOutput::Records(rows.iter().map(mysql_record).collect()));
    }

    let mut tx = conn.begin().await.map_err(query_error)?;
    let done = query.execute(&mut *tx).await.map_err(query_error)?;
    tx.commit().await.map_err(query_error)?;
    debug!(rows_affected = done.rows_affected(), "Statement committed");
    Ok(QueryOutput::Null)
}

fn bind_sqlite<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

fn bind_mysql<'q>(query: MySqlQuery<'q>, value: &Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

/// Converts a SqliteRow to a record keyed by column name.
fn sqlite_record(row: &SqliteRow) -> Record {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), sqlite_value(row, col.ordinal())))
        .collect()
}

/// Converts a MySqlRow to a record keyed by column name.
fn mysql_record(row: &MySqlRow) -> Record {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), mysql_value(row, col.ordinal())))
        .collect()
}

fn decode<'r, R, T>(row: &'r R, index: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<T, _>(index).ok()
}

/// Returns the upper-cased runtime type name, or `None` for SQL NULL.
fn runtime_type<R>(row: &R, index: usize) -> Option<String>
where
    R: Row,
    usize: ColumnIndex<R>,
{
    let raw = row.try_get_raw(index).ok()?;
    if raw.is_null() {
        return None;
    }
    Some(raw.type_info().name().to_uppercase())
}

/// Converts a single column value from a SqliteRow to our Value type.
fn sqlite_value(row: &SqliteRow, index: usize) -> Value {
    let Some(type_name) = runtime_type(row, index) else {
        return Value::Null;
    };

    let value = match type_name.as_str() {
        "BOOL" | "BOOLEAN" => decode::<_, bool>(row, index).map(Value::Bool),
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => {
            decode::<_, i64>(row, index).map(Value::Int)
        }
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => decode::<_, f64>(row, index).map(Value::Float),
        "BLOB" => decode::<_, Vec<u8>>(row, index).map(Value::Bytes),
        _ => decode::<_, String>(row, index).map(Value::String),
    };

    value
        .or_else(|| decode::<_, i64>(row, index).map(Value::Int))
        .or_else(|| decode::<_, f64>(row, index).map(Value::Float))
        .or_else(|| decode::<_, String>(row, index).map(Value::String))
        .or_else(|| decode::<_, Vec<u8>>(row, index).map(Value::Bytes))
        .unwrap_or(Value::Null)
}

/// Converts a single column value from a MySqlRow to our Value type.
fn mysql_value(row: &MySqlRow, index: usize) -> Value {
    let Some(type_name) = runtime_type(row, index) else {
        return Value::Null;
    };

    let value = match type_name.as_str() {
        "BOOLEAN" => decode::<_, bool>(row, index).map(Value::Bool),
        t if t.ends_with(" UNSIGNED") => decode::<_, u64>(row, index)
            .and_then(|v| i64::try_from(v).ok())
            .map(Value::Int),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            decode::<_, i64>(row, index).map(Value::Int)
        }
        "FLOAT" => decode::<_, f32>(row, index).map(|v| Value::Float(v as f64)),
        "DOUBLE" => decode::<_, f64>(row, index).map(Value::Float),
        "DECIMAL" => decode::<_, BigDecimal>(row, index).map(|d| {
            let text = d.to_string();
            text.parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::String(text))
        }),
        "DATETIME" | "TIMESTAMP" => {
            decode::<_, NaiveDateTime>(row, index).map(|v| Value::String(v.to_string()))
        }
        "DATE" => decode::<_, NaiveDate>(row, index).map(|v| Value::String(v.to_string())),
        "TIME" => decode::<_, NaiveTime>(row, index).map(|v| Value::String(v.to_string())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            decode::<_, Vec<u8>>(row, index).map(Value::Bytes)
        }
        _ => decode::<_, String>(row, index).map(Value::String),
    };

    value
        .or_else(|| decode::<_, String>(row, index).map(Value::String))
        .or_else(|| decode::<_, Vec<u8>>(row, index).map(Value::Bytes))
        .unwrap_or_else(|| Value::String(format!("<{type_name}>")))
}

fn query_error(error: sqlx::Error) -> GameSearchError {
    GameSearchError::query(format_query_error(error))
}

/// Formats a query error, keeping the driver's own message.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = db_error.message().to_string();

    if let Some(code) = db_error.code() {
        result.push_str(" (code ");
        result.push_str(&code);
        result.push(')');
    }

    if let Some(constraint) = db_error.constraint() {
        result.push_str("\n  CONSTRAINT: ");
        result.push_str(constraint);
    }

    result
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &DatabaseConfig) -> GameSearchError {
    let target = config.display_string();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        GameSearchError::connection(format!(
            "Cannot connect to {target}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        GameSearchError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database") {
        GameSearchError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("unable to open database file") {
        GameSearchError::connection(format!(
            "Cannot open {target}. Check that the file exists and is readable."
        ))
    } else {
        GameSearchError::connection(error.to_string())
    }
}
