//! Pipeline builder and executor.
//!
//! The builder tracks the item type flowing out of the last stage with a
//! phantom type, so stages can only be chained when their types line up.
//! Internally stages are stored type-erased and reconnected at run time by
//! downcasting each stage's input buffer.
//!
//! Execution wires stage *i*'s output buffer to stage *i+1*'s input, runs
//! every stage on its own scoped thread, and drains the last buffer on the
//! calling thread. It returns once every stage has terminated.

use super::buffer::{buffer, BufferReader, BufferWriter};
use super::cancel::CancellationToken;
use super::stage::{Stage, StageContext, StageLifecycle, StageState};
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::observability;
use std::any::Any;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::thread::{Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

type ErasedReader = Box<dyn Any + Send>;

/// Per-stage launch parameters.
#[derive(Clone)]
pub(crate) struct Launch {
    position: usize,
    capacity: usize,
    max_in_flight: usize,
    cancel: CancellationToken,
}

/// Type-erased stage for dynamic dispatch.
pub(crate) trait AnyStage: Send + Sync {
    fn name(&self) -> &str;

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        input: ErasedReader,
        launch: Launch,
    ) -> Result<(ErasedReader, ScopedJoinHandle<'scope, StageTiming>), PipelineError>;
}

impl<S> AnyStage for S
where
    S: Stage,
{
    fn name(&self) -> &str {
        Stage::name(self)
    }

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        input: ErasedReader,
        launch: Launch,
    ) -> Result<(ErasedReader, ScopedJoinHandle<'scope, StageTiming>), PipelineError> {
        let reader = input.downcast::<BufferReader<S::Input>>().map_err(|_| {
            PipelineError::TypeMismatch(format!("input of stage '{}'", Stage::name(self)))
        })?;
        let (writer, next) = buffer::<S::Output>(launch.capacity);
        let name = Stage::name(self);
        let handle = std::thread::Builder::new()
            .name(format!("stage-{name}"))
            .spawn_scoped(scope, move || run_stage(self, *reader, writer, launch))
            .map_err(|err| PipelineError::spawn_failed(name, &err))?;
        Ok((Box::new(next), handle))
    }
}

/// Run one stage to completion and close its output exactly once.
fn run_stage<S: Stage>(
    stage: &S,
    input: BufferReader<S::Input>,
    output: BufferWriter<S::Output>,
    launch: Launch,
) -> StageTiming {
    let name = stage.name();
    let span = tracing::debug_span!("stage", name, position = launch.position);
    let _enter = span.enter();
    let _context = observability::set_stage(name, launch.position);

    let lifecycle = StageLifecycle::new(name);
    let ctx = StageContext::new(name, launch.position, &launch.cancel, &lifecycle)
        .with_max_in_flight(launch.max_in_flight);
    let start = Instant::now();

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| stage.run(&input, &output, &ctx)))
        .unwrap_or_else(|payload| Err(PipelineError::panicked(name, payload.as_ref())));

    // A consumer that returned without draining is not a failure here.
    let result = match result {
        Err(PipelineError::Disconnected) => {
            tracing::debug!("downstream stopped reading, finishing early");
            Ok(())
        }
        other => other,
    };

    // Abort before closing, so downstream never mistakes a failed stage's
    // closed buffer for a complete one. Cancelled means the run is already
    // stopping, and the failure that caused it is recorded elsewhere.
    if let Err(err) = &result {
        if !err.is_secondary() {
            launch.cancel.abort(name, err.clone());
        }
    }

    lifecycle.advance(StageState::AllSpawnedJoined);
    drop(input);
    output.close();
    lifecycle.advance(StageState::Closed);

    let timing = StageTiming {
        name: name.to_string(),
        duration: start.elapsed(),
        emitted: ctx.emitted(),
        final_state: lifecycle.state(),
        succeeded: result.is_ok(),
    };
    tracing::debug!(
        emitted = timing.emitted,
        elapsed_ms = timing.duration.as_millis() as u64,
        ok = timing.succeeded,
        "stage finished"
    );
    timing
}

/// Builder for constructing pipelines.
///
/// `I` is the seed item type, `T` the item type produced so far.
///
/// # Example
///
/// ```rust
/// use signer::pipeline::{PipelineBuilder, stages::{CombineResults, Generator}};
///
/// let pipeline = PipelineBuilder::new()
///     .stage(Generator::new(vec!["b".to_string(), "a".to_string()]))
///     .stage(CombineResults::new())
///     .build();
///
/// let output = pipeline.execute().unwrap();
/// assert_eq!(output.items, vec!["a_b".to_string()]);
/// ```
pub struct PipelineBuilder<I, T> {
    stages: Vec<Box<dyn AnyStage>>,
    buffer_capacity: usize,
    max_in_flight: usize,
    _phantom: PhantomData<fn(I) -> T>,
}

impl<I: Send + 'static> PipelineBuilder<I, I> {
    /// Create a new empty pipeline builder.
    pub fn new() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            stages: Vec::new(),
            buffer_capacity: defaults.buffer_capacity,
            max_in_flight: defaults.max_in_flight,
            _phantom: PhantomData,
        }
    }
}

impl<I: Send + 'static> Default for PipelineBuilder<I, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, T> PipelineBuilder<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    /// Add a stage whose input type matches the current output type.
    pub fn stage<S>(mut self, stage: S) -> PipelineBuilder<I, S::Output>
    where
        S: Stage<Input = T> + 'static,
    {
        self.stages.push(Box::new(stage));
        PipelineBuilder {
            stages: self.stages,
            buffer_capacity: self.buffer_capacity,
            max_in_flight: self.max_in_flight,
            _phantom: PhantomData,
        }
    }

    /// Add stages conditionally.
    ///
    /// Only type-preserving additions fit here, such as a [`Sink`] that
    /// prints intermediate values.
    ///
    /// [`Sink`]: super::stages::Sink
    pub fn when<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Capacity of every buffer in the pipeline.
    ///
    /// A capacity of zero is raised to one: a zero-capacity buffer would be
    /// a rendezvous channel, not a buffer. [`PipelineConfig::validate`]
    /// rejects zero outright for configured runs.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Items each concurrent stage may process at once.
    ///
    /// A limit of zero is raised to one, as configured runs never see it.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit.max(1);
        self
    }

    pub fn with_config(self, config: &PipelineConfig) -> Self {
        self.with_buffer_capacity(config.buffer_capacity)
            .with_max_in_flight(config.max_in_flight)
    }

    /// Build the final pipeline ready for execution.
    pub fn build(self) -> BuiltPipeline<I, T> {
        BuiltPipeline {
            stages: self.stages,
            buffer_capacity: self.buffer_capacity,
            max_in_flight: self.max_in_flight,
            _phantom: PhantomData,
        }
    }
}

/// A built pipeline ready for execution.
///
/// Stages hold no per-run state, so the pipeline can be run repeatedly.
pub struct BuiltPipeline<I, T> {
    stages: Vec<Box<dyn AnyStage>>,
    buffer_capacity: usize,
    max_in_flight: usize,
    _phantom: PhantomData<fn(I) -> T>,
}

impl<I, T> BuiltPipeline<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    /// Run the pipeline, feeding `seed` into the first stage.
    ///
    /// Blocks until every stage has terminated. On failure, returns
    /// `PipelineError::Aborted` carrying the first failure observed; any
    /// secondary failures it triggered are discarded.
    pub fn run<S>(&self, seed: S) -> Result<PipelineOutput<T>, PipelineError>
    where
        S: IntoIterator<Item = I>,
    {
        let seed: Vec<I> = seed.into_iter().collect();
        let cancel = CancellationToken::new();
        observability::reset_progress(self.stages.len());

        let span = tracing::info_span!("pipeline", stages = self.stages.len());
        let _enter = span.enter();
        tracing::info!(
            seed_items = seed.len(),
            buffer_capacity = self.buffer_capacity,
            max_in_flight = self.max_in_flight,
            "Pipeline: {} stages",
            self.stages.len()
        );
        let start = Instant::now();

        let (items, timings) = std::thread::scope(|scope| {
            let (seed_writer, seed_reader) = buffer::<I>(self.buffer_capacity);
            let feeder_cancel = &cancel;
            let feeder = std::thread::Builder::new()
                .name("seed".to_string())
                .spawn_scoped(scope, move || {
                    for item in seed {
                        if seed_writer.send(item, feeder_cancel).is_err() {
                            break;
                        }
                    }
                    seed_writer.close();
                })
                .map_err(|err| cancel.abort("seed", PipelineError::spawn_failed("seed", &err)))
                .ok();

            let mut previous: Option<ErasedReader> = Some(Box::new(seed_reader));
            let mut handles = Vec::with_capacity(self.stages.len());
            for (position, stage) in self.stages.iter().enumerate() {
                let Some(input) = previous.take() else { break };
                tracing::info!("Stage {}/{}: {}", position + 1, self.stages.len(), stage.name());
                let launch = Launch {
                    position,
                    capacity: self.buffer_capacity,
                    max_in_flight: self.max_in_flight,
                    cancel: cancel.clone(),
                };
                match stage.launch(scope, input, launch) {
                    Ok((next, handle)) => {
                        previous = Some(next);
                        handles.push((stage.name(), handle));
                    }
                    Err(err) => cancel.abort(stage.name(), err),
                }
            }

            let items = match previous.map(|reader| reader.downcast::<BufferReader<T>>()) {
                Some(Ok(reader)) => reader.drain_all(&cancel),
                Some(Err(_)) => {
                    let err = PipelineError::TypeMismatch("pipeline output".to_string());
                    cancel.abort("executor", err.clone());
                    Err(err)
                }
                None => Err(PipelineError::Cancelled),
            };

            if let Some(Err(payload)) = feeder.map(|handle| handle.join()) {
                cancel.abort("seed", PipelineError::panicked("seed", payload.as_ref()));
            }
            let timings: Vec<StageTiming> = handles
                .into_iter()
                .filter_map(|(name, handle)| match handle.join() {
                    Ok(timing) => Some(timing),
                    Err(payload) => {
                        cancel.abort(name, PipelineError::panicked(name, payload.as_ref()));
                        None
                    }
                })
                .collect();
            (items, timings)
        });

        if let Some(failure) = cancel.first_failure() {
            return Err(PipelineError::aborted(failure.stage, failure.error));
        }
        let items = items?;
        let elapsed = start.elapsed();
        tracing::info!(
            items = items.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline finished"
        );

        Ok(PipelineOutput {
            items,
            timings,
            elapsed,
        })
    }

    /// Get the number of stages in this pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

impl<T: Send + 'static> BuiltPipeline<(), T> {
    /// Run a pipeline whose first stage generates its own items.
    ///
    /// The seed buffer is closed immediately.
    pub fn execute(&self) -> Result<PipelineOutput<T>, PipelineError> {
        self.run(std::iter::empty())
    }
}

/// Items drained from the last buffer plus per-stage timings.
#[derive(Debug, Clone)]
pub struct PipelineOutput<T> {
    pub items: Vec<T>,
    pub timings: Vec<StageTiming>,
    pub elapsed: Duration,
}

impl<T> PipelineOutput<T> {
    /// The single item produced by a pipeline ending in an aggregator.
    pub fn into_single(self) -> Result<T, PipelineError> {
        let count = self.items.len();
        let mut items = self.items.into_iter();
        match (items.next(), items.next()) {
            (Some(item), None) => Ok(item),
            _ => Err(PipelineError::Internal(format!(
                "expected exactly one output item, got {count}"
            ))),
        }
    }
}

/// Timing information for a pipeline stage.
#[derive(Debug, Clone)]
pub struct StageTiming {
    /// Name of the stage
    pub name: String,

    /// Time from stage start to output close
    pub duration: Duration,

    /// Items written to the output buffer
    pub emitted: usize,

    /// Lifecycle state when the stage thread ended
    pub final_state: StageState,

    pub succeeded: bool,
}

impl StageTiming {
    /// Format the timing as a human-readable string.
    pub fn format(&self) -> String {
        format!(
            "{}: {:.3}s ({} items)",
            self.name,
            self.duration.as_secs_f64(),
            self.emitted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::{CombineResults, Generator, Sink};
    use crate::pipeline::{BufferReader, BufferWriter, StageContext};

    struct Double;

    impl Stage for Double {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &str {
            "Double"
        }

        fn run(
            &self,
            input: &BufferReader<u32>,
            output: &BufferWriter<u32>,
            ctx: &StageContext<'_>,
        ) -> Result<(), PipelineError> {
            for item in input.iter(ctx.cancel()) {
                ctx.emit(output, item? * 2)?;
            }
            Ok(())
        }
    }

    struct ToText;

    impl Stage for ToText {
        type Input = u32;
        type Output = String;

        fn name(&self) -> &str {
            "ToText"
        }

        fn run(
            &self,
            input: &BufferReader<u32>,
            output: &BufferWriter<String>,
            ctx: &StageContext<'_>,
        ) -> Result<(), PipelineError> {
            for item in input.iter(ctx.cancel()) {
                ctx.emit(output, item?.to_string())?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::new()
            .stage(Generator::new(vec![1u32, 2, 3]))
            .stage(Double)
            .stage(ToText)
            .build();

        let output = pipeline.execute().unwrap();
        assert_eq!(output.items, vec!["2", "4", "6"]);
    }

    #[test]
    fn test_pipeline_with_external_seed() {
        let pipeline = PipelineBuilder::new().stage(Double).build();
        let output = pipeline.run(vec![5u32, 7]).unwrap();
        assert_eq!(output.items, vec![10, 14]);
    }

    #[test]
    fn test_pipeline_without_stages_passes_seed_through() {
        let pipeline = PipelineBuilder::<u32, u32>::new().build();
        assert_eq!(pipeline.run(vec![1, 2]).unwrap().items, vec![1, 2]);
    }

    #[test]
    fn test_pipeline_conditional() {
        let with_extra = PipelineBuilder::new()
            .stage(Generator::new(vec![1u32]))
            .when(true, |p| p.stage(Double))
            .stage(Double)
            .build();

        let without_extra = PipelineBuilder::new()
            .stage(Generator::new(vec![1u32]))
            .when(false, |p| p.stage(Double))
            .stage(Double)
            .build();

        assert_eq!(with_extra.execute().unwrap().items, vec![4]);
        assert_eq!(without_extra.execute().unwrap().items, vec![2]);
    }

    #[test]
    fn test_pipeline_timing() {
        let pipeline = PipelineBuilder::new()
            .stage(Generator::new(vec!["b".to_string(), "a".to_string()]))
            .stage(CombineResults::new())
            .build();

        let output = pipeline.execute().unwrap();
        assert_eq!(output.timings.len(), 2);
        assert_eq!(output.timings[0].name, "Generator");
        assert_eq!(output.timings[0].emitted, 2);
        assert_eq!(output.timings[1].name, "CombineResults");
        assert_eq!(output.timings[1].emitted, 1);
        assert!(output
            .timings
            .iter()
            .all(|t| t.final_state == StageState::Closed && t.succeeded));
        assert_eq!(output.into_single().unwrap(), "a_b");
    }

    #[test]
    fn test_stage_count_and_names() {
        let pipeline = PipelineBuilder::new()
            .stage(Generator::new(vec![1u32]))
            .stage(Sink::new("Observe", |_: &u32| {}))
            .stage(Double)
            .build();

        assert_eq!(pipeline.stage_count(), 3);
        assert_eq!(pipeline.stage_names(), vec!["Generator", "Observe", "Double"]);
    }

    #[test]
    fn test_panicking_stage_aborts_pipeline() {
        struct Explode;

        impl Stage for Explode {
            type Input = u32;
            type Output = u32;

            fn name(&self) -> &str {
                "Explode"
            }

            fn run(
                &self,
                _input: &BufferReader<u32>,
                _output: &BufferWriter<u32>,
                _ctx: &StageContext<'_>,
            ) -> Result<(), PipelineError> {
                panic!("stage exploded")
            }
        }

        let pipeline = PipelineBuilder::new()
            .stage(Generator::new((0..100u32).collect()))
            .stage(Explode)
            .stage(Double)
            .build();

        match pipeline.execute() {
            Err(PipelineError::Aborted { stage, source }) => {
                assert_eq!(stage, "Explode");
                assert!(matches!(*source, PipelineError::StagePanicked { .. }));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_limits_are_raised_to_one() {
        let pipeline = PipelineBuilder::<u32, u32>::new()
            .with_buffer_capacity(0)
            .with_max_in_flight(0)
            .stage(Double)
            .build();
        assert_eq!(pipeline.buffer_capacity(), 1);
        assert_eq!(pipeline.max_in_flight(), 1);
        assert_eq!(pipeline.run(vec![1, 2, 3]).unwrap().items, vec![2, 4, 6]);
    }

    #[test]
    fn test_with_config_applies_both_limits() {
        let config = PipelineConfig {
            buffer_capacity: 7,
            max_in_flight: 5,
        };
        let pipeline = PipelineBuilder::<u32, u32>::new().with_config(&config).build();
        assert_eq!(pipeline.buffer_capacity(), 7);
        assert_eq!(pipeline.max_in_flight(), 5);
    }

    #[test]
    fn test_consumer_stopping_early_is_not_a_failure() {
        struct TakeFirst;

        impl Stage for TakeFirst {
            type Input = u32;
            type Output = u32;

            fn name(&self) -> &str {
                "TakeFirst"
            }

            fn run(
                &self,
                input: &BufferReader<u32>,
                output: &BufferWriter<u32>,
                ctx: &StageContext<'_>,
            ) -> Result<(), PipelineError> {
                if let Some(item) = input.recv(ctx.cancel())? {
                    ctx.emit(output, item)?;
                }
                Ok(())
            }
        }

        let pipeline = PipelineBuilder::new()
            .with_buffer_capacity(1)
            .stage(Generator::new((0..100u32).collect()))
            .stage(Double)
            .stage(TakeFirst)
            .build();

        let output = pipeline.execute().unwrap();
        assert_eq!(output.items, vec![0]);
        assert!(output.timings.iter().all(|t| t.succeeded), "{:?}", output.timings);
    }

    #[test]
    fn test_into_single_rejects_many() {
        let output = PipelineOutput {
            items: vec![1, 2],
            timings: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert!(output.into_single().is_err());
    }
}
