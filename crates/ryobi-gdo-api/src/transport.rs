// Shared transport configuration for the HTTP session and the realtime
// command channel.
//
// Both surfaces share the per-request timeout and the bounded retry
// policy through this module, avoiding duplicated builder logic.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Error;

/// Per-request timeout applied to every HTTP exchange and to each
/// connect/send/receive step on the command channel.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of tries for a retried operation.
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Bounded retry policy for transport-level failures.
///
/// Only errors classified transient by [`Error::is_transient`] are
/// retried; the first response the service actually produces (success,
/// bad status, rejection) ends the loop immediately. The default runs
/// attempts back to back with no inter-attempt delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of tries, first attempt included. Values below 1
    /// behave as 1.
    pub attempts: u32,
    /// Pause between consecutive tries.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: DEFAULT_ATTEMPTS, delay: Duration::ZERO }
    }
}

impl RetryPolicy {
    /// Drive `op` until it succeeds, fails non-transiently, or the
    /// attempt budget runs out. The final attempt's error is returned
    /// as-is.
    pub(crate) async fn run<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(error = %e, attempt, what, "transient failure, retrying");
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Shared transport configuration for both API surfaces.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, retry: RetryPolicy::default() }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("ryobi-gdo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(client)
    }
}
