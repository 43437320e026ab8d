use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value as SqliteValue;
use rusqlite::{params_from_iter, Connection};

use crate::drivers::embedded::from_value_ref;
use crate::error::{Result, StoreError};
use crate::hrana::{
    Col, PipelineRequest, PipelineResponse, ProtocolError, Stmt, StmtResult, StreamRequest,
    StreamResponse, StreamResult, Value,
};
use crate::traits::RemoteTransport;
use crate::types::WireValue;

/// A statement as the remote service received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    /// `None` when the statement was sent without an `args` field.
    pub args: Option<Vec<WireValue>>,
}

/// An in-process stand-in for a hosted libSQL service, for testing.
///
/// Requests are serialized to JSON and back, exactly as they would cross the
/// wire, then run against a private in-memory SQLite database in autocommit
/// mode. Every statement is recorded for verification.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use unistore::drivers::{InMemoryRemote, RemoteStore};
///
/// # async fn demo() -> unistore::Result<()> {
/// let service = Arc::new(InMemoryRemote::new()?);
/// let _backend = RemoteStore::with_transport(service.clone(), "memory").await?;
/// service.assert_last_statement("SELECT 1", None);
/// # Ok(())
/// # }
/// ```
pub struct InMemoryRemote {
    db: Mutex<Connection>,
    recorded: Mutex<Vec<RecordedStatement>>,
    failures: Mutex<VecDeque<StoreError>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryRemote {
    pub fn new() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            db: Mutex::new(db),
            recorded: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        })
    }

    /// Fail the next pipeline call with `error` before it reaches the database.
    /// Failures are returned in FIFO order.
    pub fn with_failure(self, error: StoreError) -> Self {
        lock(&self.failures).push_back(error);
        self
    }

    /// Queue a failure on a shared instance.
    pub fn fail_next(&self, error: StoreError) {
        lock(&self.failures).push_back(error);
    }

    /// Get all recorded statements.
    pub fn recorded_statements(&self) -> Vec<RecordedStatement> {
        lock(&self.recorded).clone()
    }

    /// Get the last recorded statement, if any.
    pub fn last_statement(&self) -> Option<RecordedStatement> {
        lock(&self.recorded).last().cloned()
    }

    /// Clear all recorded statements.
    pub fn clear_recorded_statements(&self) {
        lock(&self.recorded).clear();
    }

    /// Assert that the last statement matches the expected SQL and arguments.
    pub fn assert_last_statement(&self, expected_sql: &str, expected_args: Option<&[WireValue]>) {
        let last = self.last_statement().expect("No statements were recorded");
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.args.as_deref(),
            expected_args,
            "Arguments mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_args,
            last.args
        );
    }

    /// Assert that exactly n statements were received.
    pub fn assert_statement_count(&self, expected: usize) {
        let actual = lock(&self.recorded).len();
        assert_eq!(
            actual, expected,
            "Statement count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }

    fn run(&self, stmt: Stmt) -> StreamResult {
        let args = match stmt
            .args
            .as_ref()
            .map(|args| args.iter().map(Value::to_wire).collect::<Result<Vec<_>>>())
            .transpose()
        {
            Ok(args) => args,
            Err(e) => return protocol_error(e.to_string(), None),
        };

        lock(&self.recorded).push(RecordedStatement {
            sql: stmt.sql.clone(),
            args: args.clone(),
        });

        let db = lock(&self.db);
        match execute_on(&db, &stmt.sql, args.unwrap_or_default()) {
            Ok(result) => StreamResult::Ok {
                response: StreamResponse::Execute { result },
            },
            Err(e) => {
                let code = e.sqlite_error_code().map(|c| format!("{:?}", c));
                protocol_error(e.to_string(), code)
            }
        }
    }
}

fn protocol_error(message: String, code: Option<String>) -> StreamResult {
    StreamResult::Error {
        error: ProtocolError { message, code },
    }
}

fn execute_on(db: &Connection, sql: &str, args: Vec<WireValue>) -> rusqlite::Result<StmtResult> {
    let params: Vec<SqliteValue> = args
        .into_iter()
        .map(|a| match a {
            WireValue::Null => SqliteValue::Null,
            WireValue::Integer(i) => SqliteValue::Integer(i),
            WireValue::Real(f) => SqliteValue::Real(f),
            WireValue::Text(s) => SqliteValue::Text(s),
            WireValue::Blob(b) => SqliteValue::Blob(b),
        })
        .collect();

    let mut stmt = db.prepare(sql)?;
    let cols: Vec<Col> = stmt
        .column_names()
        .into_iter()
        .map(|name| Col {
            name: Some(name.to_string()),
            decltype: None,
        })
        .collect();

    let mut rows = Vec::new();
    let affected_row_count = if cols.is_empty() {
        stmt.execute(params_from_iter(params.iter()))? as u64
    } else {
        let width = cols.len();
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let wire = from_value_ref(row.get_ref(i)?)?.to_wire();
                values.push(Value::from(&wire));
            }
            rows.push(values);
        }
        0
    };

    Ok(StmtResult {
        cols,
        rows,
        affected_row_count,
        last_insert_rowid: Some(db.last_insert_rowid().to_string()),
    })
}

fn json_round_trip<T, U>(value: &T) -> Result<U>
where
    T: serde::Serialize,
    U: serde::de::DeserializeOwned,
{
    let bytes = serde_json::to_vec(value)
        .map_err(|e| StoreError::Connection(format!("cannot encode: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Connection(format!("cannot decode: {}", e)))
}

#[async_trait]
impl RemoteTransport for InMemoryRemote {
    async fn pipeline(&self, request: &PipelineRequest) -> Result<PipelineResponse> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }

        let request: PipelineRequest = json_round_trip(request)?;
        let results = request
            .requests
            .into_iter()
            .map(|req| match req {
                StreamRequest::Execute { stmt } => self.run(stmt),
                StreamRequest::Close => StreamResult::Ok {
                    response: StreamResponse::Close,
                },
            })
            .collect();

        json_round_trip(&PipelineResponse {
            baton: None,
            base_url: None,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_parameterless_and_bound_statements() {
        let remote = InMemoryRemote::new().unwrap();

        remote
            .pipeline(&PipelineRequest::single(Stmt::new("SELECT 1", &[], true)))
            .await
            .unwrap();
        remote.assert_last_statement("SELECT 1", None);

        remote
            .pipeline(&PipelineRequest::single(Stmt::new(
                "SELECT ?",
                &[WireValue::Integer(5)],
                true,
            )))
            .await
            .unwrap();
        remote.assert_last_statement("SELECT ?", Some(&[WireValue::Integer(5)]));
        remote.assert_statement_count(2);
    }

    #[tokio::test]
    async fn test_queued_failure_is_returned_once() {
        let remote = InMemoryRemote::new()
            .unwrap()
            .with_failure(StoreError::Connection("reset by peer".into()));
        let request = PipelineRequest::single(Stmt::new("SELECT 1", &[], true));

        assert!(matches!(
            remote.pipeline(&request).await,
            Err(StoreError::Connection(_))
        ));
        assert!(remote.pipeline(&request).await.is_ok());
        remote.assert_statement_count(1);
    }

    #[tokio::test]
    async fn test_bad_sql_becomes_error_result() {
        let remote = InMemoryRemote::new().unwrap();
        let response = remote
            .pipeline(&PipelineRequest::single(Stmt::new("SELEKT 1", &[], true)))
            .await
            .unwrap();
        assert!(matches!(
            response.into_execute_result(),
            Err(StoreError::Statement(_))
        ));
    }
}
