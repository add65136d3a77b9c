//! Pipeline stage abstractions.
//!
//! A stage consumes one buffer and produces another, on its own thread. The
//! executor owns both buffers; a stage only borrows them for the duration of
//! [`Stage::run`]. When `run` returns, every piece of work the stage spawned
//! has finished and the executor closes the output buffer.
//!
//! # Type Safety
//!
//! Stages declare their input and output item types, and the builder only
//! lets a stage follow another whose output type matches its input:
//!
//! ```rust,ignore
//! PipelineBuilder::new()
//!     .stage(Generator::new(vec![1u32, 2]))   // () -> u32
//!     .stage(SingleHash::new(resource))       // u32 -> String
//!     .stage(CombineResults::new())           // String -> String
//!     .build();
//! ```

use super::buffer::{BufferReader, BufferWriter};
use super::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::observability;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::thread::ScopedJoinHandle;

/// A concurrent pipeline phase.
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Name used in logs, timings and errors.
    fn name(&self) -> &str;

    /// Consume `input` until it is closed and drained, emitting through `ctx`.
    ///
    /// Must not return before all work it spawned has completed. Must not
    /// close `output`; the executor does that once `run` returns.
    fn run(
        &self,
        input: &BufferReader<Self::Input>,
        output: &BufferWriter<Self::Output>,
        ctx: &StageContext<'_>,
    ) -> Result<(), PipelineError>;
}

/// Lifecycle of one stage execution.
///
/// Transitions only move forward; a stage may skip states it has no use for
/// (a generator never drains an input, for instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum StageState {
    /// Reading input and spawning work
    Running = 0,
    /// Input exhausted, waiting for spawned work
    Draining = 1,
    /// All spawned work joined, output still open
    AllSpawnedJoined = 2,
    /// Output buffer closed
    Closed = 3,
}

impl StageState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            2 => Self::AllSpawnedJoined,
            _ => Self::Closed,
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::AllSpawnedJoined => write!(f, "all_spawned_joined"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Monotonic state holder for one stage.
#[derive(Debug)]
pub struct StageLifecycle {
    stage: String,
    state: AtomicU8,
}

impl StageLifecycle {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            state: AtomicU8::new(StageState::Running as u8),
        }
    }

    pub fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if it is later than the current state.
    ///
    /// Returns false (and changes nothing) for a backwards or repeated move.
    pub fn advance(&self, next: StageState) -> bool {
        let previous = self.state.fetch_max(next as u8, Ordering::AcqRel);
        let moved = previous < next as u8;
        if moved {
            tracing::debug!(
                stage = %self.stage,
                from = %StageState::from_u8(previous),
                to = %next,
                "stage state"
            );
        }
        moved
    }
}

/// Everything a running stage can reach besides its buffers.
pub struct StageContext<'a> {
    name: &'a str,
    position: usize,
    cancel: &'a CancellationToken,
    lifecycle: &'a StageLifecycle,
    max_in_flight: usize,
    emitted: AtomicUsize,
}

impl<'a> StageContext<'a> {
    pub fn new(
        name: &'a str,
        position: usize,
        cancel: &'a CancellationToken,
        lifecycle: &'a StageLifecycle,
    ) -> Self {
        Self {
            name,
            position,
            cancel,
            lifecycle,
            max_in_flight: PipelineConfig::default().max_in_flight,
            emitted: AtomicUsize::new(0),
        }
    }

    /// Limit the items [`for_each_concurrent`] processes at once.
    ///
    /// A limit of zero is raised to one.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit.max(1);
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn cancel(&self) -> &CancellationToken {
        self.cancel
    }

    pub fn lifecycle(&self) -> &StageLifecycle {
        self.lifecycle
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Write one item to `output`, counting it.
    pub fn emit<T>(&self, output: &BufferWriter<T>, item: T) -> Result<(), PipelineError> {
        output.send(item, self.cancel)?;
        self.emitted.fetch_add(1, Ordering::Relaxed);
        observability::record_emitted();
        Ok(())
    }

    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }
}

/// Process every input item on its own scoped thread and emit each result
/// as soon as it is ready.
///
/// At most [`StageContext::max_in_flight`] workers run at once. At that
/// limit the stage stops reading `input` until a worker finishes, so a slow
/// stage pushes back on its producer instead of piling up threads.
///
/// Results reach `output` in completion order, not input order. Returns only
/// after the input is closed and drained and every worker has been joined,
/// advancing the lifecycle through `Draining` and `AllSpawnedJoined`.
pub fn for_each_concurrent<I, O, F>(
    input: &BufferReader<I>,
    output: &BufferWriter<O>,
    ctx: &StageContext<'_>,
    work: F,
) -> Result<(), PipelineError>
where
    I: Send,
    O: Send,
    F: Fn(I) -> Result<O, PipelineError> + Sync,
{
    let work = &work;
    let (release, permits) = channel::bounded::<()>(ctx.max_in_flight());
    for _ in 0..ctx.max_in_flight() {
        let _ = release.try_send(());
    }
    let release = &release;

    let result = std::thread::scope(|scope| {
        let mut workers = Vec::new();
        let mut errors = Vec::new();
        let read_result = loop {
            if let Err(err) = acquire(&permits, ctx.cancel()) {
                break Err(err);
            }
            reap_finished(&mut workers, &mut errors, ctx.name());

            let item = match input.recv(ctx.cancel()) {
                Ok(Some(item)) => item,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };
            let permit = Permit(release);
            let spawned = std::thread::Builder::new()
                .name(format!("{}-worker", ctx.name()))
                .spawn_scoped(scope, move || {
                    let _permit = permit;
                    let _guard = observability::set_stage(ctx.name(), ctx.position());
                    let result = work(item).and_then(|value| ctx.emit(output, value));
                    if let Err(err) = &result {
                        if !err.is_secondary() {
                            ctx.cancel().abort(ctx.name(), err.clone());
                        }
                    }
                    result
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(io) => {
                    let err = PipelineError::spawn_failed(ctx.name(), &io);
                    ctx.cancel().abort(ctx.name(), err.clone());
                    break Err(err);
                }
            }
        };
        ctx.lifecycle().advance(StageState::Draining);

        errors.extend(read_result.err());
        for worker in workers {
            record_join(worker.join(), &mut errors, ctx.name());
        }
        first_significant(errors)
    });
    ctx.lifecycle().advance(StageState::AllSpawnedJoined);
    result
}

/// One in-flight slot; handed back when the worker holding it ends.
struct Permit<'a>(&'a Sender<()>);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// Wait for a free slot, or for the pipeline to abort.
fn acquire(permits: &Receiver<()>, cancel: &CancellationToken) -> Result<(), PipelineError> {
    cancel.check()?;
    crossbeam::select! {
        recv(permits) -> _ => Ok(()),
        recv(cancel.signal()) -> _ => Err(PipelineError::Cancelled),
    }
}

type Worker<'scope> = ScopedJoinHandle<'scope, Result<(), PipelineError>>;

/// Join the workers that already ended so their threads are released now
/// rather than when the scope closes.
fn reap_finished(workers: &mut Vec<Worker<'_>>, errors: &mut Vec<PipelineError>, stage: &str) {
    let (done, running): (Vec<_>, Vec<_>) =
        std::mem::take(workers).into_iter().partition(|w| w.is_finished());
    *workers = running;
    for worker in done {
        record_join(worker.join(), errors, stage);
    }
}

fn record_join(
    joined: std::thread::Result<Result<(), PipelineError>>,
    errors: &mut Vec<PipelineError>,
    stage: &str,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(err)) => errors.push(err),
        Err(payload) => errors.push(PipelineError::panicked(stage, payload.as_ref())),
    }
}

/// Prefer a real failure over the `Cancelled` or `Disconnected` errors it
/// caused elsewhere.
fn first_significant(errors: Vec<PipelineError>) -> Result<(), PipelineError> {
    let mut secondary = None;
    for err in errors {
        if err.is_secondary() {
            secondary.get_or_insert(err);
        } else {
            return Err(err);
        }
    }
    secondary.map_or(Ok(()), Err)
}
