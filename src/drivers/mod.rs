mod embedded;
mod http;
mod in_memory_test;
mod remote;

pub use self::embedded::EmbeddedStore;
pub use self::http::HranaTransport;
pub use self::in_memory_test::{InMemoryRemote, RecordedStatement};
pub use self::remote::RemoteStore;
