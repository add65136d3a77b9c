use crate::config::SignerConfig;
use crate::hashing::HashAlgorithm;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Just the combined string
    Plain,
    /// Combined string plus per-stage timings
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "signer")]
#[command(about = "Concurrent multi-stage signing pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to .signer.toml in this or a parent directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the signing pipeline and print the combined result
    Run {
        /// Seed values (comma-separated)
        #[arg(long, value_delimiter = ',')]
        seed: Option<Vec<u32>>,

        /// Capacity of the buffers between stages
        #[arg(long = "buffer-capacity")]
        buffer_capacity: Option<usize>,

        /// Items each concurrent stage may process at once
        #[arg(long = "max-in-flight")]
        max_in_flight: Option<usize>,

        /// Algorithm for the restricted (serialized) hash
        #[arg(long, value_enum)]
        restricted: Option<HashAlgorithm>,

        /// Algorithm for the free (concurrent) hash
        #[arg(long, value_enum)]
        free: Option<HashAlgorithm>,

        /// Salt appended to every hash input
        #[arg(long)]
        salt: Option<String>,

        /// Simulate service latency (10ms restricted, 1s free)
        #[arg(long = "simulate-latency")]
        simulate_latency: bool,

        /// Print intermediate SingleHash/MultiHash values to stderr
        #[arg(long = "print-intermediate")]
        print_intermediate: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Hash a single value with one algorithm
    Hash {
        #[arg(value_enum)]
        algorithm: HashAlgorithm,

        data: String,

        #[arg(long, default_value = "")]
        salt: String,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Flag overrides for the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub seed: Option<Vec<u32>>,
    pub buffer_capacity: Option<usize>,
    pub max_in_flight: Option<usize>,
    pub restricted: Option<HashAlgorithm>,
    pub free: Option<HashAlgorithm>,
    pub salt: Option<String>,
    pub simulate_latency: bool,
}

impl RunOverrides {
    /// Apply flags on top of file and environment configuration.
    pub fn apply(self, mut config: SignerConfig) -> SignerConfig {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(capacity) = self.buffer_capacity {
            config.pipeline.buffer_capacity = capacity;
        }
        if let Some(limit) = self.max_in_flight {
            config.pipeline.max_in_flight = limit;
        }
        if let Some(restricted) = self.restricted {
            config.hashing.restricted = restricted;
        }
        if let Some(free) = self.free {
            config.hashing.free = free;
        }
        if let Some(salt) = self.salt {
            config.hashing.salt = salt;
        }
        if self.simulate_latency {
            config.hashing = config.hashing.with_simulated_latency();
        }
        config
    }
}
