use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode, params_from_iter};

use super::{Dialect, RelationalBackend, StoreConfig};
use crate::core::{DATETIME_FORMAT, DbError, ExecutionErrorKind, Result, Value};
use crate::query::BuiltQuery;
use crate::result::ResultCursor;

/// SQLite backend.
///
/// The connection is opened on first use. Each logical database is an
/// ATTACHed schema backed by the configured file, so statements qualified
/// with a database that has not been selected yet fail with
/// [`ExecutionErrorKind::UnknownDatabase`].
pub struct SqliteBackend {
    path: String,
    connection: RefCell<Option<Connection>>,
    attached: RefCell<HashSet<String>>,
    last_error: RefCell<Option<String>>,
    queries: Cell<u64>,
}

impl SqliteBackend {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            connection: RefCell::new(None),
            attached: RefCell::new(HashSet::new()),
            last_error: RefCell::new(None),
            queries: Cell::new(0),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub(crate) fn boxed(config: &StoreConfig) -> Result<Box<dyn RelationalBackend>> {
        Ok(Box::new(Self::from_config(config)))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut slot = self.connection.borrow_mut();
        if slot.is_none() {
            tracing::debug!("opening sqlite connection");
            let connection = Connection::open_in_memory()
                .map_err(|err| DbError::Connection(format!("Failed to open sqlite: {}", err)))?;
            *slot = Some(connection);
        }
        match slot.as_ref() {
            Some(connection) => f(connection),
            None => Err(DbError::Connection("sqlite connection unavailable".into())),
        }
    }

    fn is_attached(&self, name: &str) -> bool {
        matches!(name, "main" | "temp") || self.attached.borrow().contains(name)
    }

    fn attach(&self, connection: &Connection, name: &str) -> Result<()> {
        let sql = format!("ATTACH DATABASE ? AS {}", Dialect::Sqlite.quote_ident(name));
        self.queries.set(self.queries.get() + 1);
        connection
            .execute(&sql, [self.path.as_str()])
            .map_err(|err| self.fail(err, &sql))?;
        self.attached.borrow_mut().insert(name.to_string());
        tracing::debug!(database = name, path = %self.path, "attached sqlite database");
        Ok(())
    }

    fn run(&self, connection: &Connection, query: &BuiltQuery) -> rusqlite::Result<ResultCursor> {
        let mut statement = connection.prepare(&query.sql)?;
        let params = params_from_iter(query.params.iter().map(to_sql));

        if statement.column_count() == 0 {
            let affected = statement.execute(params)?;
            // last_insert_rowid belongs to the connection, not the statement
            let last_id = (affected > 0 && inserts_rows(&query.sql)).then(|| connection.last_insert_rowid());
            return Ok(ResultCursor::affected(affected, last_id.filter(|id| *id > 0)));
        }

        let columns: Vec<String> = statement.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut rows = statement.query(params)?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for i in 0..width {
                record.push(from_sql(row.get_ref(i)?));
            }
            values.push(record);
        }
        Ok(ResultCursor::new(columns, values))
    }

    fn fail(&self, err: rusqlite::Error, sql: &str) -> DbError {
        let error = classify(err, sql, |database| self.is_attached(database));
        *self.last_error.borrow_mut() = Some(error.to_string());
        error
    }
}

impl RelationalBackend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, query: &BuiltQuery) -> Result<ResultCursor> {
        self.queries.set(self.queries.get() + 1);
        tracing::debug!(sql = %query.sql, params = query.params.len(), "executing statement");
        self.with_connection(|connection| self.run(connection, query).map_err(|err| self.fail(err, &query.sql)))
    }

    fn select_database(&self, name: &str) -> Result<()> {
        if self.is_attached(name) {
            return Ok(());
        }
        self.with_connection(|connection| self.attach(connection, name))
    }

    fn database_exists(&self, name: &str) -> Result<bool> {
        if self.path != ":memory:" && !self.path.is_empty() && std::path::Path::new(&self.path).exists() {
            return Ok(true);
        }
        Ok(self.is_attached(name))
    }

    fn create_database(&self, name: &str) -> Result<()> {
        self.select_database(name)
    }

    fn table_exists(&self, database: &str, table: &str) -> Result<bool> {
        let query = BuiltQuery::with_params(
            format!(
                "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?",
                Dialect::Sqlite.quote_ident(database)
            ),
            vec![Value::from(table)],
        );
        let mut cursor = self.execute(&query)?;
        Ok(cursor.fetch_scalar().and_then(|v| v.as_i64()).unwrap_or(0) > 0)
    }

    fn begin(&self) -> Result<()> {
        self.execute(&BuiltQuery::new("BEGIN")).map(|_| ())
    }

    fn commit(&self) -> Result<()> {
        self.execute(&BuiltQuery::new("COMMIT")).map(|_| ())
    }

    fn rollback(&self) -> Result<()> {
        self.execute(&BuiltQuery::new("ROLLBACK")).map(|_| ())
    }

    fn last_error_message(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    fn query_count(&self) -> u64 {
        self.queries.get()
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(DATETIME_FORMAT).to_string()),
        Value::Blob(bytes) => SqlValue::Blob(bytes.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn inserts_rows(sql: &str) -> bool {
    let head = sql.trim_start();
    ["INSERT", "REPLACE"]
        .iter()
        .any(|keyword| head.get(..keyword.len()).is_some_and(|word| word.eq_ignore_ascii_case(keyword)))
}

/// Map a driver error onto the portable execution kinds.
///
/// SQLite reports a table qualified with a schema that is not attached as
/// `no such table: db.table`; that case is an unknown database.
fn classify(err: rusqlite::Error, sql: &str, is_attached: impl Fn(&str) -> bool) -> DbError {
    let (kind, code) = match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.as_deref().unwrap_or_default();
            let kind = if failure.code == ErrorCode::ConstraintViolation {
                ExecutionErrorKind::Constraint
            } else if message.starts_with("unknown database") {
                ExecutionErrorKind::UnknownDatabase
            } else if let Some(table) = message.strip_prefix("no such table: ") {
                match table.split_once('.') {
                    Some((database, _)) if !is_attached(database) => ExecutionErrorKind::UnknownDatabase,
                    _ => ExecutionErrorKind::MissingTable,
                }
            } else {
                ExecutionErrorKind::Other
            };
            (kind, Some(failure.extended_code))
        }
        _ => (ExecutionErrorKind::Other, None),
    };

    DbError::QueryExecution {
        kind,
        code,
        message: err.to_string(),
        sql: sql.to_string(),
    }
}
