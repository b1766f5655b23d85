//! Realtime command channel: JSON-RPC 2.0 over WebSocket.
//!
//! Device actuation does not go over HTTP. Each command opens a short-lived
//! WebSocket session to `/api/wsrpc`, authenticates it with the per-session
//! API key, delivers one `gdoModuleCommand` frame, waits for the service's
//! acknowledgment, and closes. Connect and auth failures retry on fresh
//! connections; send failures retry on the established one.
//!
//! # Example
//!
//! ```rust,ignore
//! use ryobi_gdo_api::{CommandChannel, TransportConfig};
//! use url::Url;
//!
//! let endpoint = Url::parse("wss://tti.tiwiconnect.com/api/wsrpc")?;
//! let channel = CommandChannel::new(endpoint, &TransportConfig::default());
//! channel
//!     .send("user@example.com", &api_key, "gd_1234", "doorCommand", serde_json::json!(1))
//!     .await?;
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::Error;
use crate::transport::{RetryPolicy, TransportConfig};

// ── Wire constants ───────────────────────────────────────────────────

/// JSON-RPC id used for the auth request on every fresh connection.
const AUTH_RPC_ID: u32 = 3;

/// Fixed addressing for the door module on every GDO unit.
const MODULE_MSG_TYPE: u32 = 16;
const MODULE_TYPE_GDO: u32 = 5;
const MODULE_PORT_ID: u32 = 7;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── CommandChannel ───────────────────────────────────────────────────

/// Client for the realtime command channel.
///
/// Stateless between commands; every [`send`](Self::send) runs a complete
/// connect, authenticate, deliver, close session.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    endpoint: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CommandChannel {
    /// Create a command channel client.
    ///
    /// `endpoint` is the full RPC URL, e.g.
    /// `wss://tti.tiwiconnect.com/api/wsrpc`.
    pub fn new(endpoint: Url, transport: &TransportConfig) -> Self {
        Self {
            endpoint,
            timeout: transport.timeout,
            retry: transport.retry.clone(),
        }
    }

    /// The RPC endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Deliver one module command to the unit behind `device_id`.
    ///
    /// Each established connection is closed exactly once, on every path.
    /// A JSON-RPC rejection from the service ([`Error::CommandRejected`])
    /// ends the session immediately, the same way a non-OK status ends an
    /// HTTP retry loop.
    pub async fn send(
        &self,
        username: &str,
        api_key: &SecretString,
        device_id: &str,
        attribute: &str,
        value: serde_json::Value,
    ) -> Result<(), Error> {
        let mut ws = self
            .retry
            .run("command channel auth", || self.connect_and_auth(username, api_key))
            .await?;

        let frame = command_frame(device_id, attribute, &value);
        let delivered = self.deliver(&mut ws, &frame).await;

        // One teardown per established connection, success or failure.
        self.close(&mut ws, "after command delivery").await;

        match &delivered {
            Ok(()) => tracing::debug!(device_id, attribute, "command acknowledged"),
            Err(e) => tracing::error!(error = %e, device_id, attribute, "command delivery failed"),
        }
        delivered
    }

    // ── Single connection lifecycle ──────────────────────────────────

    /// Establish and authenticate one WebSocket connection. On auth
    /// failure the connection is torn down before the error is returned,
    /// so the retry loop never leaks a half-open session.
    async fn connect_and_auth(
        &self,
        username: &str,
        api_key: &SecretString,
    ) -> Result<WsStream, Error> {
        tracing::debug!(endpoint = %self.endpoint, "connecting command channel");

        let uri = self
            .endpoint
            .as_str()
            .parse::<tungstenite::http::Uri>()
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let (mut ws, _response) = timeout(self.timeout, connect_async(uri))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        match self.authenticate(&mut ws, username, api_key).await {
            Ok(()) => {
                tracing::debug!("command channel authenticated");
                Ok(ws)
            }
            Err(e) => {
                self.close(&mut ws, "after failed auth").await;
                Err(e)
            }
        }
    }

    async fn authenticate(
        &self,
        ws: &mut WsStream,
        username: &str,
        api_key: &SecretString,
    ) -> Result<(), Error> {
        let frame = auth_frame(username, api_key.expose_secret());
        self.send_frame(ws, &frame).await?;
        self.read_ack(ws).await
    }

    /// Send the command frame and wait for its acknowledgment, retrying
    /// on the same connection. Rejections are final; transport errors
    /// burn an attempt.
    async fn deliver(&self, ws: &mut WsStream, frame: &serde_json::Value) -> Result<(), Error> {
        let mut attempt = 1u32;
        loop {
            let result = match self.send_frame(ws, frame).await {
                Ok(()) => self.read_ack(ws).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    tracing::warn!(error = %e, attempt, "command send failed, retrying");
                    if !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_frame(&self, ws: &mut WsStream, frame: &serde_json::Value) -> Result<(), Error> {
        timeout(self.timeout, ws.send(Message::text(frame.to_string())))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Wait for the service's reply to the last frame. Control frames are
    /// skipped; the first data frame is the acknowledgment.
    async fn read_ack(&self, ws: &mut WsStream) -> Result<(), Error> {
        loop {
            let frame = timeout(self.timeout, ws.next()).await.map_err(|_| self.timeout_error())?;
            match frame {
                Some(Ok(Message::Text(text))) => return check_ack(&text),
                Some(Ok(Message::Binary(_))) => return Ok(()),
                Some(Ok(Message::Close(_))) => {
                    return Err(Error::WebSocket("connection closed before acknowledgment".into()));
                }
                // Ping/pong between data frames; tungstenite answers pings itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
                None => return Err(Error::WebSocket("stream ended before acknowledgment".into())),
            }
        }
    }

    /// Tear down an established connection. Bounded by the transport
    /// timeout; teardown failures are logged, never surfaced.
    async fn close(&self, ws: &mut WsStream, context: &'static str) {
        match timeout(self.timeout, ws.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, context, "close failed"),
            Err(_) => tracing::debug!(context, "close timed out"),
        }
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout { timeout_secs: self.timeout.as_secs() }
    }
}

// ── Acknowledgment parsing ───────────────────────────────────────────

/// Subset of a JSON-RPC 2.0 response needed to detect rejections.
///
/// The service's ack schema is undocumented; only a well-formed `error`
/// member counts as a rejection, anything else counts as delivery.
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

fn check_ack(text: &str) -> Result<(), Error> {
    match serde_json::from_str::<RpcEnvelope>(text) {
        Ok(RpcEnvelope { error: Some(err) }) => {
            Err(Error::CommandRejected { code: err.code, message: err.message })
        }
        _ => Ok(()),
    }
}

// ── Frame construction ───────────────────────────────────────────────

/// `srvWebSocketAuth` request binding a fresh connection to the session key.
fn auth_frame(username: &str, api_key: &str) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "id": AUTH_RPC_ID,
        "method": "srvWebSocketAuth",
        "params": { "varName": username, "apiKey": api_key }
    })
}

/// `gdoModuleCommand` request carrying one attribute write.
fn command_frame(device_id: &str, attribute: &str, value: &serde_json::Value) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "method": "gdoModuleCommand",
        "params": {
            "msgType": MODULE_MSG_TYPE,
            "moduleType": MODULE_TYPE_GDO,
            "portId": MODULE_PORT_ID,
            "moduleMsg": { (attribute): value },
            "topic": device_id
        }
    })
}

// ── Tests ────────────────────────────────────────────────────────────
