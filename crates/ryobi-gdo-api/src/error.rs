use thiserror::Error;

/// Top-level error type for the `ryobi-gdo-api` crate.
///
/// Covers every failure mode across both transports: session login,
/// HTTP device queries, and the realtime command channel.
/// `ryobi-gdo-core` maps these into per-operation diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, or the login response carried no usable key.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An operation on the command channel timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── HTTP API ────────────────────────────────────────────────────
    /// The device service answered with a non-OK status.
    #[error("Device service error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection or handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Send or receive failed on an established WebSocket.
    #[error("WebSocket transport error: {0}")]
    WebSocket(String),

    /// The peer acknowledged a frame with a JSON-RPC error object.
    #[error("Command rejected by device service (code {code}): {message}")]
    CommandRejected { code: i64, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A fixed path into a device report was absent or had the wrong shape.
    #[error("Missing field in device report: {path}")]
    MissingField { path: &'static str },
}

impl Error {
    /// Returns `true` if this is a transient transport failure worth
    /// retrying. Anything derived from a response the service actually
    /// produced (bad status, bad body, rejection) is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Timeout { .. }
                | Self::WebSocketConnect(_)
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if re-running login might resolve this error.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::CommandRejected { .. })
    }
}
