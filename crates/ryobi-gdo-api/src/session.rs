// Session client for the HTTPS surface of the device service.
//
// Wraps `reqwest::Client` with the service's URL construction, bounded
// retries, and response handling. The service authenticates every request
// with account credentials sent as a form-encoded body -- on GETs too,
// which is why the request helper always attaches one.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    DeviceListResponse, DeviceQueryResponse, DeviceReport, DeviceSummary, LoginResponse,
};
use crate::transport::{RetryPolicy, TransportConfig};

/// Raw HTTP client for the device service's session API: login, account
/// device listing, and per-device state queries.
///
/// Transport-level failures are retried per the configured
/// [`RetryPolicy`]; any response the service actually produces ends the
/// retry loop, success or not.
pub struct SessionClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl SessionClient {
    /// Create a session client from a `TransportConfig`.
    ///
    /// `base_url` is the service root, e.g. `https://tti.tiwiconnect.com/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            retry: transport.retry.clone(),
        })
    }

    /// Create a session client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, retry: RetryPolicy) -> Self {
        Self { http, base_url, retry }
    }

    /// The service root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Exchange account credentials for the per-session API key used to
    /// authenticate on the command channel.
    ///
    /// A non-OK status or a response without a usable key is an
    /// authentication failure and is never retried.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SecretString, Error> {
        let url = self.endpoint("api/login")?;
        debug!("POST {url}");

        let resp = self.send_form(Method::POST, &url, username, password, "login").await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Authentication {
                message: format!("login rejected (HTTP {status})"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let login: LoginResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Authentication { message: format!("unexpected login response: {e}") }
        })?;
        let key = login
            .result
            .meta_data
            .wsk_auth_attempts
            .into_iter()
            .next()
            .and_then(|attempt| attempt.api_key)
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no API key".into(),
            })?;

        debug!("login accepted");
        Ok(SecretString::from(key))
    }

    /// List every device registered to the account.
    pub async fn list_devices(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Vec<DeviceSummary>, Error> {
        let url = self.endpoint("api/devices")?;
        debug!("GET {url}");

        let resp = self.send_form(Method::GET, &url, username, password, "device list").await?;
        let parsed: DeviceListResponse = handle_response(resp).await?;
        Ok(parsed.result)
    }

    /// Whether `device_id` appears in the account's device list. An empty
    /// or non-matching list is `Ok(false)`, not an error.
    pub async fn contains_device(
        &self,
        username: &str,
        password: &SecretString,
        device_id: &str,
    ) -> Result<bool, Error> {
        let devices = self.list_devices(username, password).await?;
        let found = devices.iter().any(|d| d.var_name == device_id);
        if !found {
            debug!(device_id, listed = devices.len(), "device not in account list");
        }
        Ok(found)
    }

    /// Fetch the current readings for one device.
    ///
    /// The three attribute paths must all be present; a report is never
    /// partial.
    pub async fn query_device(
        &self,
        username: &str,
        password: &SecretString,
        device_id: &str,
    ) -> Result<DeviceReport, Error> {
        let url = self.endpoint(&format!("api/devices/{device_id}"))?;
        debug!("GET {url}");

        let resp = self.send_form(Method::GET, &url, username, password, "device query").await?;
        let parsed: DeviceQueryResponse = handle_response(resp).await?;
        let record = parsed.result.first().ok_or(Error::MissingField { path: "result[0]" })?;
        record.report()
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// Send a credential-authenticated request, retrying transport
    /// failures per the retry policy. The first response the service
    /// produces is returned regardless of status.
    async fn send_form(
        &self,
        method: Method,
        url: &Url,
        username: &str,
        password: &SecretString,
        what: &'static str,
    ) -> Result<reqwest::Response, Error> {
        self.retry
            .run(what, || {
                let req = self
                    .http
                    .request(method.clone(), url.clone())
                    .form(&[("username", username), ("password", password.expose_secret())]);
                async move { req.send().await.map_err(Error::Transport) }
            })
            .await
    }
}

/// Check the status and parse the JSON body, keeping a preview of
/// unparseable payloads for debugging.
async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body_preview(&body).to_owned()
            },
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| {
        let preview = body_preview(&body);
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}

/// At most the first 200 bytes of `body`, stepped back so the cut never
/// lands inside a multi-byte character.
fn body_preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
