use std::time::Instant;

use crate::error::Result;
use crate::traits::{BackendConnection, BackendKind};
use crate::types::{MutationOutcome, RowSet, Statement};

/// Issues statements on one backend connection.
///
/// Parameters are normalized here, identically for every backend, and
/// results come back in one shape.
pub struct QueryExecutor {
    conn: Box<dyn BackendConnection>,
    kind: BackendKind,
}

impl QueryExecutor {
    pub(crate) fn new(conn: Box<dyn BackendConnection>, kind: BackendKind) -> Self {
        Self { conn, kind }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn supports_transactions(&self) -> bool {
        self.conn.supports_transactions()
    }

    pub async fn execute(&mut self, stmt: &Statement) -> Result<MutationOutcome> {
        let params = stmt.wire_params();
        let started = Instant::now();

        let outcome = self
            .conn
            .execute(stmt.sql(), &params)
            .await
            .inspect_err(|e| self.log_failure(stmt, e))?;

        // Backends report the connection's last rowid even when this
        // statement inserted nothing.
        let inserted = stmt.is_insert() && outcome.rows_affected.unwrap_or(0) > 0;
        let outcome = MutationOutcome {
            rows_affected: outcome.rows_affected,
            last_insert_id: outcome.last_insert_id.filter(|_| inserted),
        };

        tracing::debug!(
            backend = %self.kind,
            sql = stmt.sql(),
            params = params.len(),
            rows_affected = ?outcome.rows_affected,
            last_insert_id = ?outcome.last_insert_id,
            elapsed_us = started.elapsed().as_micros() as u64,
            "executed statement"
        );
        Ok(outcome)
    }

    pub async fn query(&mut self, stmt: &Statement) -> Result<RowSet> {
        let params = stmt.wire_params();
        let started = Instant::now();

        let rows = self
            .conn
            .query(stmt.sql(), &params)
            .await
            .inspect_err(|e| self.log_failure(stmt, e))?;

        tracing::debug!(
            backend = %self.kind,
            sql = stmt.sql(),
            params = params.len(),
            rows = rows.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "ran query"
        );
        Ok(rows)
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.conn.commit().await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.conn.rollback().await
    }

    pub(crate) async fn close(self) -> Result<()> {
        self.conn.close().await
    }

    fn log_failure(&self, stmt: &Statement, error: &crate::error::StoreError) {
        tracing::warn!(
            backend = %self.kind,
            sql = stmt.sql(),
            params = stmt.params().len(),
            kind = ?error.kind(),
            error = %error,
            "statement failed"
        );
    }
}
