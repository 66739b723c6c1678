//! SQLite backend for the student query service.
//!
//! File-based or in-memory storage through rusqlite. Registers a `regexp`
//! SQL function so `REGEXP` predicates run inside the engine.

use crate::core::criteria::{RenderedQuery, Row, SelectQuery, SqlValue};
use crate::domain::model::{NewStudent, Student, STUDENT_TABLE};
use crate::domain::ports::{ConfigProvider, QueryBackend};
use crate::utils::error::{QueryError, Result};
use async_trait::async_trait;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the database file at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        tracing::debug!("Opening SQLite database: {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// Open the configured database. A configured seed CSV is imported only
    /// while the table is empty, so repeated runs never append it twice.
    pub async fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let backend = Self::open(config.database_path())?;
        if let Some(seed) = config.seed_csv() {
            backend.seed_if_empty(seed).await?;
        }
        Ok(backend)
    }

    /// In-memory database, mainly for tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_regexp(&conn)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn insert(&self, student: &NewStudent) -> Result<Student> {
        let conn = self.conn.lock().await;
        insert_student(&conn, student)
    }

    pub async fn insert_many(&self, students: &[NewStudent]) -> Result<Vec<Student>> {
        let conn = self.conn.lock().await;
        students
            .iter()
            .map(|student| insert_student(&conn, student))
            .collect()
    }

    pub async fn row_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", STUDENT_TABLE),
            [],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| QueryError::row_mapping(format!("negative row count {}", count)))
    }

    /// Import `path` unless the table already holds rows. Returns how many
    /// students were imported.
    pub async fn seed_if_empty(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let existing = self.row_count().await?;
        if existing > 0 {
            tracing::info!(
                "⏭️ Skipping seed {}: table already holds {} students",
                path.display(),
                existing
            );
            return Ok(0);
        }
        Ok(self.import_csv(path).await?.len())
    }

    /// Load rows from a CSV file with `name,age,address,phone` headers.
    /// Empty fields are stored as `NULL`.
    pub async fn import_csv(&self, path: impl AsRef<Path>) -> Result<Vec<Student>> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let students = reader
            .deserialize::<NewStudent>()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
        tracing::info!(
            "📥 Importing {} students from {}",
            students.len(),
            path.display()
        );
        self.insert_many(&students).await
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    async fn query(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let rendered = query.to_sql();
        let conn = self.conn.lock().await;
        run_query(&conn, &rendered)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                age INTEGER,
                address TEXT,
                phone TEXT
            )",
            STUDENT_TABLE
        ),
        [],
    )?;
    Ok(())
}

/// `text REGEXP pattern` calls `regexp(pattern, text)`; the compiled pattern is
/// cached per statement.
fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: Arc<Regex> =
                ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                    Ok(Regex::new(vr.as_str()?)?)
                })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Null => false,
                value => {
                    let text = value
                        .as_str()
                        .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
                    pattern.is_match(text)
                }
            };
            Ok(is_match)
        },
    )?;
    Ok(())
}

fn insert_student(conn: &Connection, student: &NewStudent) -> Result<Student> {
    conn.execute(
        &format!(
            "INSERT INTO {} (name, age, address, phone) VALUES (?1, ?2, ?3, ?4)",
            STUDENT_TABLE
        ),
        params![student.name, student.age, student.address, student.phone],
    )?;
    Ok(student.clone().with_id(conn.last_insert_rowid()))
}

fn run_query(conn: &Connection, rendered: &RenderedQuery) -> Result<Vec<Row>> {
    tracing::debug!(
        "SQL: {} ({} params)",
        rendered.sql,
        rendered.params.len()
    );
    let mut stmt = conn.prepare(&rendered.sql)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(rendered.params.iter().map(to_sql_value)))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(from_value_ref(row.get_ref(idx)?)?);
        }
        out.push(values);
    }
    tracing::debug!("SQL returned {} rows", out.len());
    Ok(out)
}

fn to_sql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Result<SqlValue> {
    match value {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Integer(v) => Ok(SqlValue::Integer(v)),
        ValueRef::Real(v) => Ok(SqlValue::Real(v)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| SqlValue::Text(s.to_string()))
            .map_err(|e| QueryError::row_mapping(format!("invalid UTF-8 text: {}", e))),
        ValueRef::Blob(_) => Err(QueryError::row_mapping("unexpected BLOB value")),
    }
}
