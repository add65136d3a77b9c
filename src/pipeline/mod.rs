//! Concurrent multi-stage pipeline.
//!
//! Stages run concurrently, connected by bounded [`buffer`]s. Inside a
//! stage, each item is processed on its own worker, and each worker fans out
//! into a [`FanOutGroup`] of sub-tasks whose results are reassembled by
//! index. A shared [`CancellationToken`] reaches every blocking point so one
//! failure unwinds the whole run.
//!
//! Ordering is only guaranteed inside one item's composition and at the
//! final aggregator; everything else arrives in completion order.

pub mod buffer;
pub mod builder;
pub mod cancel;
pub mod fan_out;
pub mod signer;
pub mod stage;
pub mod stages;

pub use buffer::{buffer, BufferReader, BufferWriter};
pub use builder::{BuiltPipeline, PipelineBuilder, PipelineOutput, StageTiming};
pub use cancel::{CancellationToken, Failure};
pub use fan_out::FanOutGroup;
pub use signer::{sign, signer_pipeline, SignerOptions};
pub use stage::{for_each_concurrent, Stage, StageContext, StageLifecycle, StageState};
