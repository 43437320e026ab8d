//! unistore - one data-access API over an embedded SQLite file or a hosted
//! libSQL service
//!
//! The backend is chosen once at startup from configuration. Callers write
//! SQL with `?` placeholders and get the same parameter handling, row shapes
//! and error kinds from either backend.
//!
//! # Example
//! ```ignore
//! use unistore::{Statement, Store, StoreConfig};
//! use unistore::records::Blog;
//!
//! let store = Store::new(StoreConfig::from_env()?);
//! store.initialize().await?;
//!
//! let mut session = store.session().await?;
//! let outcome = session
//!     .execute(
//!         &Statement::new("INSERT INTO blogs (title, content, author_id, competition_date) VALUES (?, ?, ?, ?)")
//!             .bind("Harvard MUN")
//!             .bind("Report")
//!             .bind(1)
//!             .bind(chrono::NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()),
//!     )
//!     .await?;
//! session.commit().await?;
//!
//! let blog: Option<Blog> = session
//!     .fetch_one_as(
//!         &Statement::new(format!("SELECT {} FROM blogs WHERE id = ?", Blog::COLUMNS))
//!             .bind(outcome.last_insert_id),
//!     )
//!     .await?;
//! ```

pub mod codec;
pub mod config;
pub mod drivers;
pub mod error;
pub mod hrana;
pub mod records;
pub mod schema;
pub mod traits;
pub mod types;

mod executor;
mod store;

// Re-export main types for convenient access
pub use codec::{FieldKind, FieldSpec, FromRecord, FromValue, Record, RowCodec};
pub use config::{SeedAdmin, StoreConfig, StoreMode};
pub use error::{ErrorKind, Result, StoreError};
pub use store::{HealthReport, Session, Store, StoreInfo};
pub use traits::{BackendConnection, BackendKind, RemoteTransport, StoreBackend};
pub use types::{MutationOutcome, Row, RowSet, SqlValue, Statement, WireValue};
