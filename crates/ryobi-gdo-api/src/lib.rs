// ryobi-gdo-api: Async Rust client for the TiWiConnect device service
// (HTTPS session API + realtime command channel)

pub mod error;
pub mod models;
pub mod rpc;
pub mod session;
pub mod transport;

pub use error::Error;
pub use rpc::CommandChannel;
pub use session::SessionClient;
pub use transport::{RetryPolicy, TransportConfig};
