// ── Runtime device configuration ──
//
// These types describe *which* opener to drive and *how* to reach the
// vendor cloud. They carry credential data and connection tuning, but
// never touch disk. The host constructs a `DeviceConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use ryobi_gdo_api::TransportConfig;

use crate::error::CoreError;

/// Vendor cloud host serving both the REST and the realtime endpoints.
pub const DEFAULT_HOST: &str = "tti.tiwiconnect.com";

/// Account credentials for the vendor cloud.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

// ── Settle schedules ─────────────────────────────────────────────────

/// Offsets at which device state is polled after a command, measured
/// from the previous poll (or from the command itself for the first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleSchedule(Vec<Duration>);

impl SettleSchedule {
    pub fn new(offsets: Vec<Duration>) -> Self {
        Self(offsets)
    }

    /// Cadence after an open command: three evenly spaced checks.
    pub fn door_open() -> Self {
        Self(vec![Duration::from_secs(5); 3])
    }

    /// Cadence after a close command. The long middle wait covers slow
    /// door travel.
    pub fn door_close() -> Self {
        Self(vec![
            Duration::from_secs(5),
            Duration::from_secs(20),
            Duration::from_secs(5),
        ])
    }

    /// Cadence after a light command: a single check.
    pub fn light() -> Self {
        Self(vec![Duration::from_secs(5)])
    }

    pub fn offsets(&self) -> &[Duration] {
        &self.0
    }
}

/// Per-command settle schedules.
#[derive(Debug, Clone)]
pub struct SettleConfig {
    pub open: SettleSchedule,
    pub close: SettleSchedule,
    pub light: SettleSchedule,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            open: SettleSchedule::door_open(),
            close: SettleSchedule::door_close(),
            light: SettleSchedule::light(),
        }
    }
}

// ── Device configuration ─────────────────────────────────────────────

/// Configuration for driving a single opener.
///
/// Built by the host, passed to `Opener` -- core never reads config
/// files. Multiple doors mean multiple configs, one `Opener` each.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// REST endpoint root (e.g. `https://tti.tiwiconnect.com`).
    pub rest_url: Url,
    /// Realtime command endpoint (e.g. `wss://tti.tiwiconnect.com/api/wsrpc`).
    pub rpc_url: Url,
    /// Account credentials.
    pub credentials: Credentials,
    /// The opener to drive, by its cloud `varName`.
    pub device_id: String,
    /// Request timeout and retry tuning shared by both transports.
    pub transport: TransportConfig,
    /// Post-command poll schedules.
    pub settle: SettleConfig,
}

impl DeviceConfig {
    /// Configuration against the production vendor cloud.
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        device_id: impl Into<String>,
    ) -> Self {
        Self::for_host(DEFAULT_HOST, username, password, device_id)
            .expect("default vendor host forms valid URLs")
    }

    /// Configuration against an alternate host.
    pub fn for_host(
        host: &str,
        username: impl Into<String>,
        password: SecretString,
        device_id: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            rest_url: endpoint(format!("https://{host}"))?,
            rpc_url: endpoint(format!("wss://{host}/api/wsrpc"))?,
            credentials: Credentials {
                username: username.into(),
                password,
            },
            device_id: device_id.into(),
            transport: TransportConfig::default(),
            settle: SettleConfig::default(),
        })
    }
}

fn endpoint(raw: String) -> Result<Url, CoreError> {
    raw.parse().map_err(|e| CoreError::Config {
        message: format!("invalid endpoint {raw:?}: {e}"),
    })
}
