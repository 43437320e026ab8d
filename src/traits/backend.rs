use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::{MutationOutcome, RowSet, WireValue};

/// Which backend strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Embedded,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Embedded => f.write_str("embedded"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

/// A backend strategy, shared process-wide once prepared.
/// Backends are responsible for:
/// - Handing out one exclusively owned connection per request
/// - Releasing any process-wide resources on shutdown
#[async_trait]
pub trait StoreBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Human-readable location of the store, with credentials stripped.
    fn describe(&self) -> String;

    /// Open a new connection handle.
    async fn acquire(&self) -> Result<Box<dyn BackendConnection>>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// One live channel to a backend, owned by a single session.
///
/// Parameters arrive already normalized. An empty `params` slice means a
/// parameterless call.
#[async_trait]
pub trait BackendConnection: Send {
    /// Run a statement that returns no rows.
    async fn execute(&mut self, sql: &str, params: &[WireValue]) -> Result<MutationOutcome>;

    /// Run a statement and collect its rows.
    async fn query(&mut self, sql: &str, params: &[WireValue]) -> Result<RowSet>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// False when every statement is durable on acknowledgement and
    /// commit/rollback do nothing.
    fn supports_transactions(&self) -> bool;

    /// Release the connection, surfacing any error. Dropping releases too.
    async fn close(self: Box<Self>) -> Result<()>;
}
