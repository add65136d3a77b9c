//! Thread-local context tracking for crash reports.
//!
//! Every stage thread records which stage it runs; fan-out workers inherit
//! the stage name explicitly because thread-locals do not propagate to new
//! threads. Global atomic counters track how many items each run emitted.
//!
//! ## Thread Safety
//!
//! - Thread-local context: each thread has its own context (via `thread_local!`)
//! - Global progress: atomic counters shared by all stages
//! - Context guards use RAII for automatic cleanup on drop

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

static ITEMS_EMITTED: AtomicUsize = AtomicUsize::new(0);
static STAGES_TOTAL: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_CONTEXT: RefCell<StageContextInfo> =
        const { RefCell::new(StageContextInfo::new()) };
}

/// Snapshot of what the current thread was doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageContextInfo {
    /// Stage running on this thread
    pub stage: Option<String>,
    /// Zero-based position of the stage in the pipeline
    pub position: Option<usize>,
}

impl StageContextInfo {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stage: None,
            position: None,
        }
    }
}

/// Restores the previous context on drop.
pub struct ContextGuard {
    previous: StageContextInfo,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = previous;
        });
    }
}

/// Mark the current thread as running `stage`.
#[must_use]
pub fn set_stage(stage: &str, position: usize) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        let previous = ctx.clone();
        ctx.stage = Some(stage.to_string());
        ctx.position = Some(position);
        ContextGuard { previous }
    })
}

pub fn get_current_context() -> StageContextInfo {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Reset the global counters at the start of a run.
pub fn reset_progress(stages: usize) {
    ITEMS_EMITTED.store(0, Ordering::Relaxed);
    STAGES_TOTAL.store(stages, Ordering::Relaxed);
}

pub fn record_emitted() {
    ITEMS_EMITTED.fetch_add(1, Ordering::Relaxed);
}

/// Returns `(items emitted across all stages, stage count)`.
pub fn get_progress() -> (usize, usize) {
    (
        ITEMS_EMITTED.load(Ordering::Relaxed),
        STAGES_TOTAL.load(Ordering::Relaxed),
    )
}
