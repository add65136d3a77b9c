//! Per-item multi-part hash composition.
//!
//! For an item `x` the stage computes `free("0" + x)` through
//! `free("5" + x)` concurrently and concatenates the six results in index
//! order. Completion order never leaks into the output.

use crate::errors::PipelineError;
use crate::hashing::SynchronizedHashResource;
use crate::pipeline::{
    for_each_concurrent, BufferReader, BufferWriter, FanOutGroup, Stage, StageContext,
};
use std::sync::Arc;

/// Number of indexed sub-hashes per item.
pub const MULTI_HASH_PARTS: usize = 6;

/// Input of sub-hash `index`: the decimal index prefixed to the item.
pub fn part_input(index: usize, data: &str) -> String {
    format!("{index}{data}")
}

/// Concatenate sub-hashes that are already ordered by index.
pub fn concat_parts(parts: &[String]) -> String {
    parts.concat()
}

/// Compute the multi-hash value of one item.
pub fn multi_hash(
    resource: &SynchronizedHashResource,
    data: &str,
    stage: &str,
    ctx: &StageContext<'_>,
) -> Result<String, PipelineError> {
    let mut group = FanOutGroup::with_capacity(stage, MULTI_HASH_PARTS);
    for index in 0..MULTI_HASH_PARTS {
        group.spawn(move || {
            ctx.cancel().check()?;
            Ok(resource.free_hash(&part_input(index, data))?)
        });
    }
    let parts = group.join(ctx.cancel())?;
    Ok(concat_parts(&parts))
}

/// Stage form of [`multi_hash`].
pub struct MultiHash {
    resource: Arc<SynchronizedHashResource>,
}

impl MultiHash {
    pub fn new(resource: Arc<SynchronizedHashResource>) -> Self {
        Self { resource }
    }
}

impl Stage for MultiHash {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "MultiHash"
    }

    fn run(
        &self,
        input: &BufferReader<String>,
        output: &BufferWriter<String>,
        ctx: &StageContext<'_>,
    ) -> Result<(), PipelineError> {
        let resource = self.resource.as_ref();
        for_each_concurrent(input, output, ctx, |data| {
            let signed = multi_hash(resource, &data, ctx.name(), ctx)?;
            tracing::trace!(%data, %signed, "multi hash");
            Ok(signed)
        })
    }
}
