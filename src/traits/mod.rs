mod backend;
mod transport;

pub use backend::{BackendConnection, BackendKind, StoreBackend};
pub use transport::RemoteTransport;
