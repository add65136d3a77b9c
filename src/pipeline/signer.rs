//! The canonical signing chain: Generator → SingleHash → MultiHash → CombineResults.

use super::stages::{CombineResults, Generator, MultiHash, SingleHash, Sink};
use super::{BuiltPipeline, PipelineBuilder};
use crate::config::{PipelineConfig, SignerConfig};
use crate::errors::PipelineError;
use crate::hashing::SynchronizedHashResource;
use std::sync::Arc;

/// Options that do not change the result, only what gets printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignerOptions {
    /// Print every SingleHash and MultiHash value to stderr as it passes.
    pub print_intermediate: bool,
}

/// Build the signing pipeline for `seed`.
pub fn signer_pipeline(
    resource: Arc<SynchronizedHashResource>,
    seed: Vec<u32>,
    pipeline: &PipelineConfig,
    options: SignerOptions,
) -> BuiltPipeline<(), String> {
    PipelineBuilder::new()
        .with_config(pipeline)
        .stage(Generator::new(seed))
        .stage(SingleHash::new(Arc::clone(&resource)))
        .when(options.print_intermediate, |p| {
            p.stage(Sink::new("PrintSingleHash", |s: &String| {
                eprintln!("SingleHash {s}")
            }))
        })
        .stage(MultiHash::new(resource))
        .when(options.print_intermediate, |p| {
            p.stage(Sink::new("PrintMultiHash", |s: &String| {
                eprintln!("MultiHash {s}")
            }))
        })
        .stage(CombineResults::new())
        .build()
}

/// Run the signing pipeline described by `config` and return the combined string.
pub fn sign(config: &SignerConfig, options: SignerOptions) -> Result<String, PipelineError> {
    let resource = Arc::new(SynchronizedHashResource::from_config(&config.hashing));
    tracing::debug!(?resource, seed = ?config.seed, "building signer pipeline");
    let pipeline = signer_pipeline(resource, config.seed.clone(), &config.pipeline, options);
    pipeline.execute()?.into_single()
}
