// ryobi-gdo-core: Domain layer between ryobi-gdo-api and host platforms.

pub mod config;
pub mod error;
pub mod model;
pub mod command;
pub mod opener;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Credentials, DEFAULT_HOST, DeviceConfig, SettleConfig, SettleSchedule};
pub use error::CoreError;
pub use model::{DoorState, LightState, StateSnapshot};
pub use command::DeviceCommand;
pub use opener::{Lifecycle, Opener};
