// djdesk-net/src/health.rs
//! Single-shot HTTP probe used by the supervisor's readiness loop.

use std::future::Future;
use std::time::Duration;

use djdesk_common::error::{DjdeskError, Result};
use reqwest::Client;
use tracing::trace;

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered; any status code counts.
    Responded(u16),
    /// Connection refused, reset, or another transport error.
    Unreachable(String),
    /// No answer within the per-attempt timeout.
    TimedOut,
}

pub trait HealthProbe {
    fn probe(&self, url: &str) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Plain HTTP GET probe with its own per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: Client,
}

impl HttpHealthProbe {
    pub fn new(per_attempt_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(per_attempt_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| DjdeskError::HttpError(format!("Failed to build health client: {e}")))?;
        Ok(Self { client })
    }
}

impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                // Drain so the connection is released.
                let _ = response.bytes().await;
                ProbeOutcome::Responded(status)
            }
            Err(e) if e.is_timeout() => {
                trace!("Health probe to {} timed out", url);
                ProbeOutcome::TimedOut
            }
            Err(e) => {
                trace!("Health probe to {} failed: {}", url, e);
                ProbeOutcome::Unreachable(e.to_string())
            }
        }
    }
}
