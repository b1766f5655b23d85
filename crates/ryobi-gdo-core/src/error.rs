// ── Core error types ──
//
// Host-facing errors from ryobi-gdo-core. These are NOT wire-specific --
// hosts never see HTTP status codes, socket errors, or JSON parse
// failures directly. Each facade operation translates
// `ryobi_gdo_api::Error` into the variant for the phase that was running,
// so a timeout during `update()` reads as an update failure while the
// same timeout during `open()` reads as a command failure.

use thiserror::Error;

use crate::command::DeviceCommand;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Not authenticated -- call login() first")]
    NotAuthenticated,

    #[error("Device {device_id} is not verified -- call verify_device() first")]
    NotVerified { device_id: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device discovery failed: {message}")]
    DiscoveryFailed { message: String },

    #[error("State update failed: {message}")]
    UpdateFailed { message: String },

    #[error("Command '{command}' failed: {message}")]
    CommandFailed {
        command: DeviceCommand,
        message: String,
    },

    /// The service acknowledged the frame with a JSON-RPC error object.
    /// Distinct from [`CommandFailed`](Self::CommandFailed): the command
    /// reached the service and was turned down rather than lost in
    /// transit.
    #[error("Command '{command}' rejected by device service (code {code}): {message}")]
    CommandRejected {
        command: DeviceCommand,
        code: i64,
        message: String,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Translation from the wire layer ──────────────────────────────────

impl CoreError {
    pub(crate) fn authentication(err: &ryobi_gdo_api::Error) -> Self {
        Self::AuthenticationFailed {
            message: err.to_string(),
        }
    }

    pub(crate) fn discovery(err: &ryobi_gdo_api::Error) -> Self {
        Self::DiscoveryFailed {
            message: err.to_string(),
        }
    }

    pub(crate) fn update(err: &ryobi_gdo_api::Error) -> Self {
        Self::UpdateFailed {
            message: err.to_string(),
        }
    }

    /// A rejection keeps its JSON-RPC code; everything else collapses
    /// into [`CommandFailed`](Self::CommandFailed).
    pub(crate) fn command(command: DeviceCommand, err: ryobi_gdo_api::Error) -> Self {
        match err {
            ryobi_gdo_api::Error::CommandRejected { code, message } => Self::CommandRejected {
                command,
                code,
                message,
            },
            other => Self::CommandFailed {
                command,
                message: other.to_string(),
            },
        }
    }
}
