use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RemoteCredentials;
use crate::drivers::HranaTransport;
use crate::error::{Result, StoreError};
use crate::hrana::{PipelineRequest, Stmt, StmtResult};
use crate::traits::{BackendConnection, BackendKind, RemoteTransport, StoreBackend};
use crate::types::{MutationOutcome, RowSet, WireValue};

/// Hosted libSQL store reached through a [`RemoteTransport`].
///
/// There is no client-side transaction control: every statement is its own
/// pipeline request and is durable once acknowledged. Commit and rollback
/// are no-ops.
pub struct RemoteStore {
    transport: Arc<dyn RemoteTransport>,
    location: String,
}

impl RemoteStore {
    /// Connect over HTTP and verify the service answers.
    pub async fn connect(credentials: &RemoteCredentials, timeout: Duration) -> Result<Self> {
        let transport = HranaTransport::new(credentials, timeout)?;
        let location = credentials
            .url
            .host_str()
            .unwrap_or("remote")
            .to_string();
        Self::with_transport(Arc::new(transport), location).await
    }

    /// Use an existing transport, verified with `SELECT 1`.
    pub async fn with_transport(
        transport: Arc<dyn RemoteTransport>,
        location: impl Into<String>,
    ) -> Result<Self> {
        let location = location.into();
        let probe = PipelineRequest::single(Stmt::new("SELECT 1", &[], true));
        transport.pipeline(&probe).await?.into_execute_result()?;

        tracing::info!(location = %location, "remote store ready");
        Ok(Self {
            transport,
            location,
        })
    }
}

#[async_trait]
impl StoreBackend for RemoteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn describe(&self) -> String {
        self.location.clone()
    }

    async fn acquire(&self) -> Result<Box<dyn BackendConnection>> {
        Ok(Box::new(RemoteConnection {
            transport: Arc::clone(&self.transport),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.transport.close().await
    }
}

struct RemoteConnection {
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteConnection {
    async fn run(&self, sql: &str, params: &[WireValue], want_rows: bool) -> Result<StmtResult> {
        let request = PipelineRequest::single(Stmt::new(sql, params, want_rows));
        self.transport.pipeline(&request).await?.into_execute_result()
    }
}

#[async_trait]
impl BackendConnection for RemoteConnection {
    async fn execute(&mut self, sql: &str, params: &[WireValue]) -> Result<MutationOutcome> {
        let result = self.run(sql, params, false).await?;
        let last_insert_id = match result.last_insert_rowid {
            Some(id) => Some(id.parse::<i64>().map_err(|_| {
                StoreError::Connection(format!("malformed last_insert_rowid `{}`", id))
            })?),
            None => None,
        };
        Ok(MutationOutcome::new(
            Some(result.affected_row_count),
            last_insert_id,
        ))
    }

    async fn query(&mut self, sql: &str, params: &[WireValue]) -> Result<RowSet> {
        let result = self.run(sql, params, true).await?;
        let columns = result
            .cols
            .into_iter()
            .map(|c| c.name.unwrap_or_default())
            .collect();
        let rows = result
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_sql_value()).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Ok(RowSet::new(columns, rows))
    }

    async fn commit(&mut self) -> Result<()> {
        tracing::trace!("commit is a no-op on the remote store");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        tracing::debug!("rollback is a no-op on the remote store; earlier statements stay applied");
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        false
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
