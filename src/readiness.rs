//! Bounded readiness polling.
//!
//! After the services start, the database needs time before it accepts
//! queries. Instead of sleeping blindly, the sequencer probes it at a fixed
//! interval and gives up once the timeout is spent.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Readiness policy, configurable from the toolchain file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessPolicy {
    /// Total time budget in seconds
    pub timeout_secs: u64,
    /// Pause between probes in seconds
    pub interval_secs: u64,
    /// Arguments for the database tool that succeed once it is ready
    pub probe_args: Vec<String>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            interval_secs: 2,
            probe_args: vec![
                "mysql".to_string(),
                "--execute".to_string(),
                "SELECT 1".to_string(),
            ],
        }
    }
}

impl ReadinessPolicy {
    /// Number of probes the policy allows: one immediately, then one per
    /// interval that fits in the timeout. Always at least one.
    pub fn max_attempts(&self) -> u32 {
        let extra = self
            .timeout_secs
            .checked_div(self.interval_secs)
            .unwrap_or(0);
        u32::try_from(extra).unwrap_or(u32::MAX - 1) + 1
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// The database never answered within the policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Database did not become ready after {attempts} attempts ({}s)", .waited.as_secs())]
pub struct ReadinessTimeout {
    pub attempts: u32,
    pub waited: Duration,
}

/// Why waiting stopped without success.
#[derive(Debug)]
pub enum WaitError<E> {
    /// All attempts were spent
    Timeout(ReadinessTimeout),
    /// The probe itself could not run
    Probe(E),
}

/// Blocks the current thread between probes.
///
/// Injected so tests can count pauses without sleeping.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Real-time pause via `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Probe until `probe` reports ready or the policy runs out.
///
/// `probe` receives the 1-based attempt number and returns `Ok(true)` once
/// ready. Returns the attempt that succeeded.
pub fn wait_until_ready<E, F>(
    policy: &ReadinessPolicy,
    pause: &dyn Pause,
    mut probe: F,
) -> Result<u32, WaitError<E>>
where
    F: FnMut(u32) -> Result<bool, E>,
{
    let attempts = policy.max_attempts();
    let mut waited = Duration::ZERO;

    for attempt in 1..=attempts {
        if probe(attempt).map_err(WaitError::Probe)? {
            tracing::info!(attempt, "Database is ready");
            return Ok(attempt);
        }

        if attempt < attempts {
            tracing::debug!(attempt, "Database not ready yet, retrying");
            pause.pause(policy.interval());
            waited += policy.interval();
        }
    }

    tracing::warn!(attempts, "Database readiness timed out");
    Err(WaitError::Timeout(ReadinessTimeout { attempts, waited }))
}
