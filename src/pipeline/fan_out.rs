//! Spawn-N, join-N, collect-by-index.
//!
//! A [`FanOutGroup`] owns the sub-tasks spawned for one item. Sub-tasks run
//! on scoped threads and report `(index, result)` over a channel in whatever
//! order they finish; [`FanOutGroup::join`] places every result in the slot
//! of its index, so the returned `Vec` is always in spawn order no matter
//! which sub-task finished first.

use super::cancel::CancellationToken;
use crate::errors::PipelineError;
use crossbeam::channel;

type SubTask<'a, T> = Box<dyn FnOnce() -> Result<T, PipelineError> + Send + 'a>;

/// The concurrent sub-tasks computing one item.
pub struct FanOutGroup<'a, T> {
    label: &'a str,
    tasks: Vec<SubTask<'a, T>>,
}

impl<'a, T: Send> FanOutGroup<'a, T> {
    /// `label` names the owning stage in logs and panic errors.
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            tasks: Vec::new(),
        }
    }

    pub fn with_capacity(label: &'a str, capacity: usize) -> Self {
        Self {
            label,
            tasks: Vec::with_capacity(capacity),
        }
    }

    /// Register a sub-task. Its index is the number of tasks spawned before it.
    pub fn spawn<F>(&mut self, task: F) -> usize
    where
        F: FnOnce() -> Result<T, PipelineError> + Send + 'a,
    {
        self.tasks.push(Box::new(task));
        self.tasks.len() - 1
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every sub-task concurrently and wait for all of them.
    ///
    /// Results come back ordered by index. If any sub-task fails, the first
    /// failure to arrive is returned and the pipeline is cancelled; the
    /// remaining sub-tasks still run to completion before this returns, so
    /// nothing outlives the group. If a sub-task thread cannot be started,
    /// the tasks not yet started are dropped and the spawn error is returned.
    pub fn join(self, cancel: &CancellationToken) -> Result<Vec<T>, PipelineError> {
        let count = self.tasks.len();
        let label = self.label;
        let (tx, rx) = channel::bounded::<(usize, Result<T, PipelineError>)>(count);

        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
        let mut first_error: Option<PipelineError> = None;

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(count);
            for (index, task) in self.tasks.into_iter().enumerate() {
                let tx = tx.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("{label}-{index}"))
                    .spawn_scoped(scope, move || {
                        let result = task();
                        // The receiver outlives every sub-task, so this cannot fail.
                        let _ = tx.send((index, result));
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(io) => {
                        let err = PipelineError::spawn_failed(label, &io);
                        cancel.abort(label, err.clone());
                        first_error = Some(err);
                        break;
                    }
                }
            }
            drop(tx);

            for (index, result) in rx.iter() {
                match result {
                    Ok(value) => slots[index] = Some(value),
                    Err(err) => {
                        if first_error.is_none() {
                            tracing::debug!(
                                stage = label,
                                index,
                                error = %err,
                                "fan-out sub-task failed"
                            );
                            if !err.is_secondary() {
                                cancel.abort(label, err.clone());
                            }
                            first_error = Some(err);
                        }
                    }
                }
            }

            for handle in handles {
                if let Err(payload) = handle.join() {
                    let err = PipelineError::panicked(label, payload.as_ref());
                    if first_error.is_none() {
                        cancel.abort(label, err.clone());
                        first_error = Some(err);
                    }
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    PipelineError::Internal(format!("{label}: sub-task {index} produced no result"))
                })
            })
            .collect()
    }
}
