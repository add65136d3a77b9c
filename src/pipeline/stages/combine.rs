//! Terminal aggregation.
//!
//! The only full barrier in the pipeline: nothing is emitted until the input
//! is closed and drained. Sorting before joining makes the result
//! independent of arrival order.

use crate::errors::PipelineError;
use crate::pipeline::{BufferReader, BufferWriter, Stage, StageContext, StageState};

/// Separator between combined results.
pub const COMBINE_SEPARATOR: &str = "_";

/// Sort ascending (byte-wise lexicographic) and join with `_`.
///
/// An empty input yields an empty string.
pub fn combine_results(mut results: Vec<String>) -> String {
    results.sort_unstable();
    results.join(COMBINE_SEPARATOR)
}

/// Collects every upstream item and emits exactly one combined string.
#[derive(Debug, Clone, Default)]
pub struct CombineResults;

impl CombineResults {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for CombineResults {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "CombineResults"
    }

    fn run(
        &self,
        input: &BufferReader<String>,
        output: &BufferWriter<String>,
        ctx: &StageContext<'_>,
    ) -> Result<(), PipelineError> {
        let collected = input.drain_all(ctx.cancel())?;
        ctx.lifecycle().advance(StageState::Draining);
        tracing::debug!(items = collected.len(), "combining results");
        ctx.emit(output, combine_results(collected))
    }
}
