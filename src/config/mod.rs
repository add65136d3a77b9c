//! Configuration for the signer pipeline.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. `.signer.toml`, searched upward from the working directory (see [`loader`])
//! 2. Environment overrides (`SIGNER_BUFFER_CAPACITY`, `SIGNER_MAX_IN_FLIGHT`,
//!    `SIGNER_SALT`)
//! 3. Command-line flags, applied by the binary
//!
//! # Example
//!
//! ```toml
//! seed = [0, 1, 1, 2, 3, 5, 8]
//!
//! [pipeline]
//! buffer_capacity = 3
//! max_in_flight = 64
//!
//! [hashing]
//! restricted = "md5"
//! free = "crc32"
//! salt = ""
//! restricted_latency_ms = 10
//! free_latency_ms = 1000
//! ```

pub mod loader;

pub use loader::{load_config, load_config_from_path, parse_and_validate_config};

use crate::errors::ConfigError;
use crate::hashing::HashAlgorithm;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`PipelineConfig::buffer_capacity`].
pub const ENV_BUFFER_CAPACITY: &str = "SIGNER_BUFFER_CAPACITY";
/// Environment variable overriding [`PipelineConfig::max_in_flight`].
pub const ENV_MAX_IN_FLIGHT: &str = "SIGNER_MAX_IN_FLIGHT";
/// Environment variable overriding [`HashingConfig::salt`].
pub const ENV_SALT: &str = "SIGNER_SALT";

fn default_buffer_capacity() -> usize {
    3
}

fn default_max_in_flight() -> usize {
    64
}

fn default_seed() -> Vec<u32> {
    vec![0, 1, 1, 2, 3, 5, 8]
}

fn default_restricted() -> HashAlgorithm {
    HashAlgorithm::Md5
}

fn default_free() -> HashAlgorithm {
    HashAlgorithm::Crc32
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignerConfig {
    /// Values fed to the first stage
    #[serde(default = "default_seed")]
    pub seed: Vec<u32>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub hashing: HashingConfig,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            pipeline: PipelineConfig::default(),
            hashing: HashingConfig::default(),
        }
    }
}

impl SignerConfig {
    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()
    }

    /// Apply environment overrides from the given lookup.
    ///
    /// Takes a lookup function instead of reading the process environment
    /// directly so tests do not have to mutate global state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BUFFER_CAPACITY) {
            self.pipeline.buffer_capacity = parse_count(ENV_BUFFER_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_IN_FLIGHT) {
            self.pipeline.max_in_flight = parse_count(ENV_MAX_IN_FLIGHT, &raw)?;
        }
        if let Some(salt) = lookup(ENV_SALT) {
            self.hashing.salt = salt;
        }
        self.validate()
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(format!("{key} must be an integer, got {raw:?}")))
}

/// Executor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Capacity of every buffer between stages (default: 3)
    ///
    /// Only liveness and throughput depend on this value, never the result.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Items a concurrent stage may process at once (default: 64)
    ///
    /// A stage at this limit stops reading its input until a worker
    /// finishes, so upstream buffers fill and backpressure holds.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with a different buffer capacity.
    pub fn with_buffer_capacity(capacity: usize) -> Self {
        Self {
            buffer_capacity: capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::invalid("pipeline.buffer_capacity must be at least 1"));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::invalid("pipeline.max_in_flight must be at least 1"));
        }
        Ok(())
    }
}

/// Which algorithms back the restricted and free hash operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashingConfig {
    /// Hash run under the lock (default: md5)
    #[serde(default = "default_restricted")]
    pub restricted: HashAlgorithm,

    /// Hash run without synchronization (default: crc32)
    #[serde(default = "default_free")]
    pub free: HashAlgorithm,

    /// Appended to every input before hashing
    #[serde(default)]
    pub salt: String,

    /// Simulated latency of the restricted hash
    #[serde(default)]
    pub restricted_latency_ms: u64,

    /// Simulated latency of the free hash
    #[serde(default)]
    pub free_latency_ms: u64,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            restricted: default_restricted(),
            free: default_free(),
            salt: String::new(),
            restricted_latency_ms: 0,
            free_latency_ms: 0,
        }
    }
}

impl HashingConfig {
    /// Realistic service latencies: 10 ms restricted, 1 s free.
    pub fn with_simulated_latency(mut self) -> Self {
        self.restricted_latency_ms = 10;
        self.free_latency_ms = 1000;
        self
    }
}
