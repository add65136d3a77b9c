//! The shared, partially serialized hash resource.

use super::{Delayed, HashFunction};
use crate::config::HashingConfig;
use crate::errors::HashError;
use parking_lot::Mutex;
use std::time::Duration;

/// Owns the restricted and the free hash operation for a pipeline run.
///
/// `locked_hash` runs under a mutex, so at most one caller is inside the
/// restricted operation at any instant. `free_hash` takes no lock.
///
/// The lock makes the restricted hash the throughput bottleneck when fan-out
/// is high. That serialization models a rate-limited dependency and must stay.
pub struct SynchronizedHashResource {
    restricted: Box<dyn HashFunction>,
    free: Box<dyn HashFunction>,
    lock: Mutex<()>,
}

impl SynchronizedHashResource {
    pub fn new(restricted: Box<dyn HashFunction>, free: Box<dyn HashFunction>) -> Self {
        Self {
            restricted,
            free,
            lock: Mutex::new(()),
        }
    }

    /// Build the resource described by a [`HashingConfig`].
    pub fn from_config(config: &HashingConfig) -> Self {
        let restricted = config.restricted.build(&config.salt);
        let free = config.free.build(&config.salt);
        let restricted = with_latency(restricted, config.restricted_latency_ms);
        let free = with_latency(free, config.free_latency_ms);
        Self::new(restricted, free)
    }

    /// Restricted hash: callers are serialized through the lock.
    pub fn locked_hash(&self, data: &str) -> Result<String, HashError> {
        let _guard = self.lock.lock();
        tracing::trace!(algorithm = self.restricted.name(), data, "restricted hash");
        self.restricted.hash(data)
    }

    /// Free hash: no synchronization.
    pub fn free_hash(&self, data: &str) -> Result<String, HashError> {
        self.free.hash(data)
    }

    pub fn restricted_name(&self) -> &str {
        self.restricted.name()
    }

    pub fn free_name(&self) -> &str {
        self.free.name()
    }
}

impl Default for SynchronizedHashResource {
    fn default() -> Self {
        Self::from_config(&HashingConfig::default())
    }
}

impl std::fmt::Debug for SynchronizedHashResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizedHashResource")
            .field("restricted", &self.restricted.name())
            .field("free", &self.free.name())
            .finish()
    }
}

fn with_latency(hash: Box<dyn HashFunction>, latency_ms: u64) -> Box<dyn HashFunction> {
    if latency_ms == 0 {
        hash
    } else {
        Box::new(Delayed::new(hash, Duration::from_millis(latency_ms)))
    }
}
