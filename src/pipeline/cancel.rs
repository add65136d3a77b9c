//! Pipeline-wide abort signal.
//!
//! Every blocking point (buffer send/recv, fan-out join) selects on the
//! token's receiver. Aborting drops the only sender, which disconnects the
//! channel and wakes every waiter at once.

use crate::errors::PipelineError;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The first failure recorded by [`CancellationToken::abort`].
#[derive(Debug, Clone)]
pub struct Failure {
    pub stage: String,
    pub error: PipelineError,
}

struct Inner {
    aborted: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    first_failure: Mutex<Option<Failure>>,
}

/// Cloneable handle on a shared abort signal.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, signal) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                aborted: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
                first_failure: Mutex::new(None),
            }),
        }
    }

    /// Abort the pipeline because `stage` failed with `error`.
    ///
    /// Only the first call records its failure. Later calls, typically the
    /// `Cancelled` errors of stages woken by the first abort, are dropped.
    pub fn abort(&self, stage: &str, error: PipelineError) {
        {
            let mut first = self.inner.first_failure.lock();
            if first.is_none() {
                tracing::warn!(stage, error = %error, "aborting pipeline");
                *first = Some(Failure {
                    stage: stage.to_string(),
                    error,
                });
            } else {
                tracing::debug!(stage, error = %error, "secondary failure ignored");
            }
        }
        self.cancel();
    }

    /// Raise the signal without recording a failure.
    pub fn cancel(&self) {
        self.inner.aborted.store(true, Ordering::Release);
        self.inner.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Fail fast with `Cancelled` if the signal has been raised.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn first_failure(&self) -> Option<Failure> {
        self.inner.first_failure.lock().clone()
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled.
    ///
    /// Nothing is ever sent on it, so a `recv` on it only returns on cancel.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
