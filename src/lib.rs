//! Concurrent signing pipeline.
//!
//! A sequence of seed values flows through a chain of stages:
//!
//! ```text
//! Generator ──▶ SingleHash ──▶ MultiHash ──▶ CombineResults
//!                   │              │
//!                   └──── SynchronizedHashResource ────┘
//! ```
//!
//! Every stage runs concurrently; `SingleHash` and `MultiHash` additionally
//! fan each item out into concurrent sub-tasks. All stages share one
//! [`SynchronizedHashResource`] whose restricted hash is serialized by a
//! lock. The final stage sorts everything it received and joins it into one
//! string, so the result is deterministic although items are computed out of
//! order.
//!
//! # Example
//!
//! ```rust
//! use signer::config::SignerConfig;
//! use signer::pipeline::{sign, SignerOptions};
//!
//! let config = SignerConfig { seed: vec![0, 1], ..SignerConfig::default() };
//! let combined = sign(&config, SignerOptions::default()).unwrap();
//! assert_eq!(combined.split('_').count(), 2);
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod hashing;
pub mod observability;
pub mod pipeline;

pub use crate::config::SignerConfig;
pub use crate::errors::{ConfigError, HashError, PipelineError};
pub use crate::hashing::{HashAlgorithm, HashFunction, SynchronizedHashResource};
pub use crate::pipeline::{
    sign, signer_pipeline, BuiltPipeline, PipelineBuilder, PipelineOutput, SignerOptions, Stage,
};
