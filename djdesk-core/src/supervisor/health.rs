// djdesk-core/src/supervisor/health.rs
//! Readiness polling: settle, then probe at a fixed interval until the
//! server answers or the attempt budget runs out.

use std::future::Future;
use std::time::{Duration, Instant};

use djdesk_common::error::{DjdeskError, Result};
use djdesk_net::{HealthProbe, ProbeOutcome};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Wait before the first probe.
    pub settle: Duration,
    /// Wait between a failed probe and the next one.
    pub interval: Duration,
    pub max_attempts: u32,
    pub per_attempt_timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1000),
            interval: Duration::from_millis(500),
            max_attempts: 30,
            per_attempt_timeout: Duration::from_millis(2000),
        }
    }
}

impl HealthPolicy {
    /// Upper bound on the whole wait, used as a hard stop on top of the
    /// attempt counter.
    pub fn deadline(&self) -> Duration {
        self.settle + (self.interval + self.per_attempt_timeout) * self.max_attempts
    }
}

/// Time source for the readiness loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub attempts: u32,
    pub status: u16,
}

pub async fn wait_for_health<P, C>(
    probe: &P,
    clock: &C,
    url: &str,
    policy: &HealthPolicy,
) -> Result<HealthReport>
where
    P: HealthProbe,
    C: Clock,
{
    let started = clock.now();
    let deadline = policy.deadline();
    let timed_out = |attempts: u32| DjdeskError::HealthCheckTimeout {
        url: url.to_string(),
        attempts,
    };

    clock.sleep(policy.settle).await;

    for attempt in 1..=policy.max_attempts {
        match probe.probe(url).await {
            ProbeOutcome::Responded(status) => {
                info!("Server responded with status {} after {} attempt(s)", status, attempt);
                return Ok(HealthReport {
                    attempts: attempt,
                    status,
                });
            }
            ProbeOutcome::Unreachable(reason) => {
                debug!("Attempt {}/{}: {}", attempt, policy.max_attempts, reason)
            }
            ProbeOutcome::TimedOut => {
                debug!("Attempt {}/{}: timed out", attempt, policy.max_attempts)
            }
        }
        if attempt == policy.max_attempts || clock.now().duration_since(started) >= deadline {
            return Err(timed_out(attempt));
        }
        clock.sleep(policy.interval).await;
    }
    Err(timed_out(policy.max_attempts))
}
