use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};

use crate::config::SeedAdmin;
use crate::error::{Result, StoreError};
use crate::schema;
use crate::traits::{BackendConnection, BackendKind, StoreBackend};
use crate::types::{MutationOutcome, RowSet, SqlValue, WireValue};

/// Embedded SQLite file store.
///
/// Each acquire opens a fresh connection to the same file, so concurrent
/// sessions never share a handle; SQLite's file locking serializes writers.
pub struct EmbeddedStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl EmbeddedStore {
    /// Open the store at `path`, creating the file and schema if missing,
    /// and seeding `admin` when given.
    pub async fn open(
        path: impl Into<PathBuf>,
        busy_timeout: Duration,
        admin: Option<SeedAdmin>,
    ) -> Result<Self> {
        let path = path.into();
        let store = Self { path, busy_timeout };

        let path = store.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Connection(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            let mut conn = open_connection(&path, busy_timeout)?;
            schema::bootstrap(&mut conn).map_err(map_sqlite_error)?;
            if let Some(admin) = &admin {
                schema::seed(&mut conn, admin).map_err(map_sqlite_error)?;
                tracing::info!(email = %admin.email, "seed administrator ensured");
            }
            conn.close().map_err(|(_, e)| map_sqlite_error(e))
        })
        .await
        .map_err(|e| StoreError::Connection(format!("schema bootstrap task failed: {}", e)))??;

        tracing::info!(path = %store.path.display(), "embedded store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreBackend for EmbeddedStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn acquire(&self) -> Result<Box<dyn BackendConnection>> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let conn = tokio::task::spawn_blocking(move || open_connection(&path, busy_timeout))
            .await
            .map_err(|e| StoreError::Connection(format!("open task failed: {}", e)))??;

        Ok(Box::new(EmbeddedConnection { conn: Some(conn) }))
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let conn = Connection::open_with_flags(path, flags).map_err(map_sqlite_error)?;
    conn.busy_timeout(busy_timeout).map_err(map_sqlite_error)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(map_sqlite_error)?;
    Ok(conn)
}

/// A connection handle to the embedded store.
///
/// The first write after a commit or rollback opens a deferred transaction,
/// so pending writes are only kept by an explicit `commit`. Dropping the
/// handle closes the connection and discards uncommitted writes.
struct EmbeddedConnection {
    conn: Option<Connection>,
}

impl EmbeddedConnection {
    /// Run `f` against the connection on the blocking pool.
    ///
    /// The connection moves into the task and comes back with the result; if
    /// this future is dropped mid-call the task still owns and closes it.
    async fn with_conn<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| StoreError::Unavailable("connection already lost".to_string()))?;

        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut conn);
            (conn, result)
        })
        .await
        .map_err(|e| StoreError::Connection(format!("sqlite task failed: {}", e)))?;

        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl BackendConnection for EmbeddedConnection {
    async fn execute(&mut self, sql: &str, params: &[WireValue]) -> Result<MutationOutcome> {
        let sql = sql.to_string();
        let params = to_sqlite_values(params);
        self.with_conn(move |conn| {
            if conn.is_autocommit() {
                conn.execute_batch("BEGIN DEFERRED")
                    .map_err(map_sqlite_error)?;
            }
            let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
            let changed = if params.is_empty() {
                stmt.execute([])
            } else {
                stmt.execute(params_from_iter(params.iter()))
            }
            .map_err(map_sqlite_error)?;
            drop(stmt);

            Ok(MutationOutcome::new(
                Some(changed as u64),
                Some(conn.last_insert_rowid()),
            ))
        })
        .await
    }

    async fn query(&mut self, sql: &str, params: &[WireValue]) -> Result<RowSet> {
        let sql = sql.to_string();
        let params = to_sqlite_values(params);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();

            let mut rows = if params.is_empty() {
                stmt.query([])
            } else {
                stmt.query(params_from_iter(params.iter()))
            }
            .map_err(map_sqlite_error)?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(map_sqlite_error)? {
                let values = (0..width)
                    .map(|i| row.get_ref(i).and_then(from_value_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_sqlite_error)?;
                out.push(values);
            }

            Ok(RowSet::new(columns, out))
        })
        .await
    }

    async fn commit(&mut self) -> Result<()> {
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT").map_err(map_sqlite_error)?;
            }
            Ok(())
        })
        .await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK").map_err(map_sqlite_error)?;
            }
            Ok(())
        })
        .await
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || conn.close().map_err(|(_, e)| map_sqlite_error(e)))
            .await
            .map_err(|e| StoreError::Connection(format!("close task failed: {}", e)))?
    }
}

fn to_sqlite_values(params: &[WireValue]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            WireValue::Null => Value::Null,
            WireValue::Integer(i) => Value::Integer(*i),
            WireValue::Real(f) => Value::Real(*f),
            WireValue::Text(s) => Value::Text(s.clone()),
            WireValue::Blob(b) => Value::Blob(b.clone()),
        })
        .collect()
}

/// Text that is not valid UTF-8 is an error, never replaced.
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> rusqlite::Result<SqlValue> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(t) => SqlValue::Text(
            std::str::from_utf8(t)
                .map_err(rusqlite::Error::Utf8Error)?
                .to_string(),
        ),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    })
}

/// Lock contention means the store is temporarily unavailable, other
/// I/O-class failures are connection errors, and everything else is the
/// statement's fault.
pub(crate) fn map_sqlite_error(e: rusqlite::Error) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StoreError::Unavailable(e.to_string())
        }
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::NotADatabase
            | ErrorCode::DiskFull
            | ErrorCode::PermissionDenied
            | ErrorCode::FileLockingProtocolFailed,
        ) => StoreError::Connection(e.to_string()),
        _ => StoreError::Statement(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_is_statement_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT NOT NULL)")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t (v) VALUES (NULL)", [])
            .unwrap_err();
        assert!(matches!(map_sqlite_error(err), StoreError::Statement(_)));
    }

    #[test]
    fn test_parameter_count_mismatch_is_statement_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT ?", [1, 2]).unwrap_err();
        assert!(matches!(map_sqlite_error(err), StoreError::Statement(_)));
    }

    #[test]
    fn test_connections_use_wal() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = open_connection(&dir.path().join("wal.db"), Duration::from_millis(100)).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_invalid_utf8_text_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT CAST(x'ff41' AS TEXT)", [], |r| {
                r.get_ref(0).and_then(from_value_ref)
            })
            .unwrap_err();
        assert!(matches!(map_sqlite_error(err), StoreError::Statement(_)));

        let ok = conn
            .query_row("SELECT 'A'", [], |r| r.get_ref(0).and_then(from_value_ref))
            .unwrap();
        assert_eq!(ok, SqlValue::Text("A".into()));
    }

    #[test]
    fn test_not_a_database_is_connection_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        let conn = Connection::open(&path).unwrap();
        let err = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get::<_, i64>(0))
            .unwrap_err();
        assert!(matches!(map_sqlite_error(err), StoreError::Connection(_)));
    }
}
