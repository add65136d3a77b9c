//! Per-item single-hash composition.
//!
//! For an item `x` (in its `Display` form) the stage emits
//! `free(x) + "~" + free(restricted(x))`. The two halves run concurrently;
//! only the second one touches the restricted hash, so the lock is held for
//! one call per item.

use crate::errors::PipelineError;
use crate::hashing::SynchronizedHashResource;
use crate::pipeline::{
    for_each_concurrent, BufferReader, BufferWriter, FanOutGroup, Stage, StageContext,
};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

/// Separator between the independent and the composed hash.
pub const SINGLE_HASH_SEPARATOR: &str = "~";

/// Join the independent hash and the composed hash. The order is fixed.
pub fn compose_single_hash(independent: &str, composed: &str) -> String {
    format!("{independent}{SINGLE_HASH_SEPARATOR}{composed}")
}

/// Compute the single-hash value of one item.
pub fn single_hash(
    resource: &SynchronizedHashResource,
    data: &str,
    stage: &str,
    ctx: &StageContext<'_>,
) -> Result<String, PipelineError> {
    let mut group = FanOutGroup::with_capacity(stage, 2);
    group.spawn(|| {
        ctx.cancel().check()?;
        Ok(resource.free_hash(data)?)
    });
    group.spawn(|| {
        ctx.cancel().check()?;
        let restricted = resource.locked_hash(data)?;
        Ok(resource.free_hash(&restricted)?)
    });

    let parts = group.join(ctx.cancel())?;
    match parts.as_slice() {
        [independent, composed] => Ok(compose_single_hash(independent, composed)),
        _ => Err(PipelineError::Internal(format!(
            "{stage}: expected 2 hash parts, got {}",
            parts.len()
        ))),
    }
}

/// Stage form of [`single_hash`], accepting any displayable item.
pub struct SingleHash<T> {
    resource: Arc<SynchronizedHashResource>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> SingleHash<T> {
    pub fn new(resource: Arc<SynchronizedHashResource>) -> Self {
        Self {
            resource,
            _phantom: PhantomData,
        }
    }
}

impl<T> Stage for SingleHash<T>
where
    T: Display + Send + 'static,
{
    type Input = T;
    type Output = String;

    fn name(&self) -> &str {
        "SingleHash"
    }

    fn run(
        &self,
        input: &BufferReader<T>,
        output: &BufferWriter<String>,
        ctx: &StageContext<'_>,
    ) -> Result<(), PipelineError> {
        let resource = self.resource.as_ref();
        for_each_concurrent(input, output, ctx, |item| {
            let data = item.to_string();
            let signed = single_hash(resource, &data, ctx.name(), ctx)?;
            tracing::trace!(%data, %signed, "single hash");
            Ok(signed)
        })
    }
}
