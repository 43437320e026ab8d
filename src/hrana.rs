//! Wire types for the libSQL "Hrana over HTTP" v2 pipeline protocol.
//!
//! A pipeline request carries a list of stream requests; we always send one
//! `execute` followed by `close`, so the server keeps no stream state between
//! statements.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::types::{SqlValue, WireValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub baton: Option<String>,
    pub requests: Vec<StreamRequest>,
}

impl PipelineRequest {
    /// A single statement on a fresh stream, closed right after.
    pub fn single(stmt: Stmt) -> Self {
        Self {
            baton: None,
            requests: vec![StreamRequest::Execute { stmt }, StreamRequest::Close],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRequest {
    Execute { stmt: Stmt },
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub sql: String,
    /// Absent for a parameterless call, which is not the same as an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    #[serde(default)]
    pub want_rows: bool,
}

impl Stmt {
    pub fn new(sql: &str, params: &[WireValue], want_rows: bool) -> Self {
        let args = if params.is_empty() {
            None
        } else {
            Some(params.iter().map(Value::from).collect())
        };
        Self {
            sql: sql.to_string(),
            args,
            want_rows,
        }
    }
}

/// A protocol value. Integers travel as decimal strings to survive JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl From<&WireValue> for Value {
    fn from(value: &WireValue) -> Self {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Integer(i) => Value::Integer {
                value: i.to_string(),
            },
            WireValue::Real(f) => Value::Float { value: *f },
            WireValue::Text(s) => Value::Text { value: s.clone() },
            WireValue::Blob(b) => Value::Blob {
                base64: BASE64.encode(b),
            },
        }
    }
}

impl Value {
    pub fn to_wire(&self) -> Result<WireValue> {
        Ok(match self {
            Value::Null => WireValue::Null,
            Value::Integer { value } => WireValue::Integer(value.parse().map_err(|_| {
                StoreError::Connection(format!("malformed integer value `{}`", value))
            })?),
            Value::Float { value } => WireValue::Real(*value),
            Value::Text { value } => WireValue::Text(value.clone()),
            Value::Blob { base64 } => WireValue::Blob(BASE64.decode(base64).map_err(|e| {
                StoreError::Connection(format!("malformed blob value: {}", e))
            })?),
        })
    }

    pub fn to_sql_value(&self) -> Result<SqlValue> {
        self.to_wire().map(SqlValue::from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    #[serde(default)]
    pub baton: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub results: Vec<StreamResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: ProtocolError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamResponse {
    Execute { result: StmtResult },
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmtResult {
    #[serde(default)]
    pub cols: Vec<Col>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub affected_row_count: u64,
    #[serde(default)]
    pub last_insert_rowid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Col {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decltype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl PipelineResponse {
    /// The result of the first `execute` request.
    pub fn into_execute_result(self) -> Result<StmtResult> {
        match self.results.into_iter().next() {
            Some(StreamResult::Ok {
                response: StreamResponse::Execute { result },
            }) => Ok(result),
            Some(StreamResult::Error { error }) => Err(StoreError::Statement(match error.code {
                Some(code) => format!("{} ({})", error.message, code),
                None => error.message,
            })),
            Some(StreamResult::Ok { response }) => Err(StoreError::Connection(format!(
                "unexpected pipeline response {:?}",
                response
            ))),
            None => Err(StoreError::Connection(
                "pipeline response has no results".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameterless_stmt_omits_args() {
        let request = PipelineRequest::single(Stmt::new("SELECT 1", &[], true));
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({
                "baton": null,
                "requests": [
                    {"type": "execute", "stmt": {"sql": "SELECT 1", "want_rows": true}},
                    {"type": "close"}
                ]
            })
        );
    }

    #[test]
    fn test_args_encoding() {
        let stmt = Stmt::new(
            "INSERT INTO t VALUES (?, ?, ?, ?, ?)",
            &[
                WireValue::Null,
                WireValue::Integer(9_007_199_254_740_993),
                WireValue::Real(1.5),
                WireValue::Text("2025-12-25".into()),
                WireValue::Blob(vec![1, 2, 3]),
            ],
            false,
        );
        assert_eq!(
            serde_json::to_value(&stmt).unwrap()["args"],
            json!([
                {"type": "null"},
                {"type": "integer", "value": "9007199254740993"},
                {"type": "float", "value": 1.5},
                {"type": "text", "value": "2025-12-25"},
                {"type": "blob", "base64": "AQID"}
            ])
        );
    }

    #[test]
    fn test_parse_execute_response() {
        let body = json!({
            "baton": null,
            "base_url": null,
            "results": [
                {"type": "ok", "response": {"type": "execute", "result": {
                    "cols": [{"name": "id", "decltype": "INTEGER"}, {"name": "title", "decltype": "TEXT"}],
                    "rows": [[{"type": "integer", "value": "3"}, {"type": "text", "value": "Report"}]],
                    "affected_row_count": 0,
                    "last_insert_rowid": null
                }}},
                {"type": "ok", "response": {"type": "close"}}
            ]
        });
        let response: PipelineResponse = serde_json::from_value(body).unwrap();
        let result = response.into_execute_result().unwrap();
        assert_eq!(result.cols[1].name.as_deref(), Some("title"));
        assert_eq!(result.rows[0][0].to_sql_value().unwrap(), SqlValue::Integer(3));
    }

    #[test]
    fn test_error_result_is_statement_error() {
        let body = json!({
            "results": [
                {"type": "error", "error": {"message": "no such table: blogz", "code": "SQLITE_ERROR"}},
                {"type": "ok", "response": {"type": "close"}}
            ]
        });
        let response: PipelineResponse = serde_json::from_value(body).unwrap();
        match response.into_execute_result() {
            Err(StoreError::Statement(msg)) => {
                assert_eq!(msg, "no such table: blogz (SQLITE_ERROR)")
            }
            other => panic!("Expected statement error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_integer_is_connection_error() {
        let value = Value::Integer {
            value: "twelve".into(),
        };
        assert!(matches!(value.to_wire(), Err(StoreError::Connection(_))));
    }

    #[test]
    fn test_blob_round_trip() {
        let wire = WireValue::Blob(b"pdf bytes".to_vec());
        assert_eq!(Value::from(&wire).to_wire().unwrap(), wire);
    }
}
