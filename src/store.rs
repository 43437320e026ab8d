//! The unified store adapter.
//!
//! A [`Store`] is created once per process, initialized once, and cloned into
//! every request handler. Handlers call [`Store::session`] to acquire a
//! connection handle; the [`Session`] releases it when dropped, on every exit
//! path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::codec::FromRecord;
use crate::config::{BackendChoice, StoreConfig};
use crate::drivers::{EmbeddedStore, RemoteStore};
use crate::error::{Result, StoreError};
use crate::executor::QueryExecutor;
use crate::traits::{BackendKind, StoreBackend};
use crate::types::{MutationOutcome, Row, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Ready,
    ShutDown,
}

struct StoreState {
    lifecycle: Lifecycle,
    backend: Option<Arc<dyn StoreBackend>>,
}

struct StoreInner {
    config: StoreConfig,
    state: RwLock<StoreState>,
    init_lock: AsyncMutex<()>,
    open_handles: Arc<AtomicUsize>,
}

/// Process-wide data-access object. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Result of [`Store::check_health`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub backend: Option<BackendKind>,
    pub latency: Duration,
    pub error: Option<String>,
}

/// Snapshot of the adapter's configuration and state.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub backend: Option<BackendKind>,
    pub initialized: bool,
    pub location: Option<String>,
    pub open_handles: usize,
}

impl Store {
    /// Create an adapter that selects its backend from `config` on
    /// [`initialize`](Store::initialize).
    pub fn new(config: StoreConfig) -> Self {
        Self::build(config, None)
    }

    /// Create an adapter around an already-prepared backend.
    /// Useful for testing or using alternative backends.
    pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
        Self::build(StoreConfig::default(), Some(backend))
    }

    fn build(config: StoreConfig, backend: Option<Arc<dyn StoreBackend>>) -> Self {
        let lifecycle = if backend.is_some() {
            Lifecycle::Ready
        } else {
            Lifecycle::Uninitialized
        };
        Self {
            inner: Arc::new(StoreInner {
                config,
                state: RwLock::new(StoreState { lifecycle, backend }),
                init_lock: AsyncMutex::new(()),
                open_handles: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Select and prepare the backend. Idempotent; any error is fatal to the
    /// process, there is no degraded mode.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.inner.init_lock.lock().await;

        match self.lifecycle() {
            Lifecycle::Ready => return Ok(()),
            Lifecycle::ShutDown => {
                return Err(StoreError::Unavailable(
                    "store has been shut down".to_string(),
                ))
            }
            Lifecycle::Uninitialized => {}
        }

        let config = &self.inner.config;
        tracing::info!(mode = ?config.mode, "initializing store");

        let backend: Arc<dyn StoreBackend> = match config.choose_backend()? {
            BackendChoice::Embedded { path } => Arc::new(
                EmbeddedStore::open(path, config.busy_timeout, config.seed_admin.clone()).await?,
            ),
            BackendChoice::Remote(credentials) => {
                if config.seed_admin.is_some() {
                    tracing::warn!("seed administrator is only applied to the embedded store");
                }
                Arc::new(RemoteStore::connect(&credentials, config.http_timeout).await?)
            }
        };

        tracing::info!(
            backend = %backend.kind(),
            location = %backend.describe(),
            "store initialized"
        );

        let mut state = self.write_state();
        state.backend = Some(backend);
        state.lifecycle = Lifecycle::Ready;
        Ok(())
    }

    /// Release process-wide resources. Later sessions fail with
    /// `StoreUnavailable`; sessions already open keep their handles until
    /// dropped.
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.inner.init_lock.lock().await;

        let backend = {
            let mut state = self.write_state();
            state.lifecycle = Lifecycle::ShutDown;
            state.backend.take()
        };

        let Some(backend) = backend else {
            return Ok(());
        };

        let open = self.open_handles();
        if open > 0 {
            tracing::warn!(open_handles = open, "shutting down with sessions still open");
        }
        backend.shutdown().await?;
        tracing::info!(backend = %backend.kind(), "store shut down");
        Ok(())
    }

    /// Acquire a connection handle for one request.
    pub async fn session(&self) -> Result<Session> {
        let backend = self.backend()?;
        let conn = backend.acquire().await?;
        let lease = HandleLease::new(Arc::clone(&self.inner.open_handles));

        Ok(Session {
            executor: QueryExecutor::new(conn, backend.kind()),
            _lease: lease,
        })
    }

    /// Run `SELECT 1` through a fresh session.
    pub async fn check_health(&self) -> HealthReport {
        let started = Instant::now();
        let probe = async {
            let mut session = self.session().await?;
            let row = session.fetch_one(&Statement::new("SELECT 1")).await?;
            session.close().await?;
            row.ok_or_else(|| StoreError::Connection("health probe returned no row".to_string()))
        }
        .await;

        HealthReport {
            healthy: probe.is_ok(),
            backend: self.backend_kind(),
            latency: started.elapsed(),
            error: probe.err().map(|e| e.to_string()),
        }
    }

    pub fn info(&self) -> StoreInfo {
        let state = self.read_state();
        StoreInfo {
            backend: state.backend.as_ref().map(|b| b.kind()),
            initialized: state.lifecycle == Lifecycle::Ready,
            location: state.backend.as_ref().map(|b| b.describe()),
            open_handles: self.open_handles(),
        }
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.read_state().backend.as_ref().map(|b| b.kind())
    }

    /// Number of connection handles currently held by sessions.
    pub fn open_handles(&self) -> usize {
        self.inner.open_handles.load(Ordering::SeqCst)
    }

    fn backend(&self) -> Result<Arc<dyn StoreBackend>> {
        let state = self.read_state();
        match (&state.backend, state.lifecycle) {
            (Some(backend), Lifecycle::Ready) => Ok(Arc::clone(backend)),
            (_, Lifecycle::ShutDown) => Err(StoreError::Unavailable(
                "store has been shut down".to_string(),
            )),
            _ => Err(StoreError::Unavailable(
                "store is not initialized".to_string(),
            )),
        }
    }

    fn lifecycle(&self) -> Lifecycle {
        self.read_state().lifecycle
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counts one open handle for as long as it lives.
///
/// The count tracks sessions, not connections. When a session is dropped
/// during an embedded call, its connection is closed by the blocking task
/// once the call finishes, so for that short window the count is one lower
/// than the number of live connections.
struct HandleLease {
    counter: Arc<AtomicUsize>,
}

impl HandleLease {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("connection handle released");
    }
}

/// One request's exclusive connection handle.
///
/// Calls take `&mut self`, so statements within a session run strictly in
/// order. Dropping the session releases the handle; uncommitted writes on the
/// embedded store are discarded.
pub struct Session {
    // Field order matters: the connection closes before the lease is returned.
    executor: QueryExecutor,
    _lease: HandleLease,
}

impl Session {
    pub fn backend_kind(&self) -> BackendKind {
        self.executor.kind()
    }

    /// False on the remote store, where `commit` and `rollback` do nothing
    /// and every `execute` is durable on its own.
    pub fn supports_transactions(&self) -> bool {
        self.executor.supports_transactions()
    }

    /// Run a statement that returns no rows.
    pub async fn execute(&mut self, stmt: &Statement) -> Result<MutationOutcome> {
        self.executor.execute(stmt).await
    }

    /// The first row, or `None` when the statement matched nothing.
    pub async fn fetch_one(&mut self, stmt: &Statement) -> Result<Option<Row>> {
        Ok(self.executor.query(stmt).await?.first())
    }

    /// Every row, in backend order.
    pub async fn fetch_all(&mut self, stmt: &Statement) -> Result<Vec<Row>> {
        Ok(self.executor.query(stmt).await?.rows())
    }

    pub async fn fetch_one_as<T: FromRecord>(&mut self, stmt: &Statement) -> Result<Option<T>> {
        self.fetch_one(stmt)
            .await?
            .map(|row| T::decode(0, &row))
            .transpose()
    }

    pub async fn fetch_all_as<T: FromRecord>(&mut self, stmt: &Statement) -> Result<Vec<T>> {
        self.fetch_all(stmt)
            .await?
            .iter()
            .enumerate()
            .map(|(i, row)| T::decode(i, row))
            .collect()
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.executor.commit().await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.executor.rollback().await
    }

    /// Release the handle, surfacing any close error.
    pub async fn close(self) -> Result<()> {
        let Session { executor, _lease } = self;
        executor.close().await
    }
}
