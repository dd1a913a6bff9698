//! config.rs
//!
//! Fault-injection knobs for the simulated network.
//!
//! The defaults reproduce the timings existing protocol test suites were
//! tuned against; change them only together with those suites' timeouts.

use std::{fs, io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Upper bound of the random delay applied to every request on an
    /// unreliable network.
    pub short_delay_ms: u64,

    /// Upper bound of the delay before an unreachable destination fails the
    /// call while long-delay mode is on.
    pub long_delay_ms: u64,

    /// Same as `long_delay_ms` in normal mode. Kept small so clients can try
    /// each server in rapid succession.
    pub unreachable_delay_ms: u64,

    /// Chance that an unreliable network drops a request, and independently
    /// its reply.
    pub drop_probability: f64,

    /// Chance that a reply is held back while long-reordering mode is on.
    pub reorder_probability: f64,

    /// Minimum hold-back of a reordered reply.
    pub reorder_min_ms: u64,

    /// Spread of the extra, skewed-towards-short, hold-back of a reordered
    /// reply.
    pub reorder_spread_ms: u64,

    /// How often a pending call re-checks that its server is still alive.
    pub liveness_poll_ms: u64,

    /// Buffered requests between client ends and the router.
    pub queue_capacity: usize,

    /// Seeds fault decisions. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            short_delay_ms: 27,
            long_delay_ms: 7000,
            unreachable_delay_ms: 100,
            drop_probability: 0.1,
            reorder_probability: 600.0 / 900.0,
            reorder_min_ms: 200,
            reorder_spread_ms: 2000,
            liveness_poll_ms: 100,
            queue_capacity: 1024,
            seed: None,
        }
    }
}

impl FaultConfig {
    /// Worst-case time an unreachable call waits before failing.
    pub fn max_unreachable_delay(&self) -> Duration {
        Duration::from_millis(self.long_delay_ms.max(self.unreachable_delay_ms))
    }

    pub fn liveness_poll(&self) -> Duration {
        Duration::from_millis(self.liveness_poll_ms.max(1))
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<FaultConfig>(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(parsed)
    }
}
