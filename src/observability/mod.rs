//! Observability infrastructure for crash reports and logging.
//!
//! ## Features
//!
//! - **Tracing**: `tracing-subscriber` setup driven by `RUST_LOG` or CLI verbosity
//! - **Panic Hook**: Produces structured crash reports with pipeline context
//! - **Context Tracking**: Thread-local stage name and global item counters
//!
//! ## Usage
//!
//! ```ignore
//! use signer::observability::{init_tracing, install_panic_hook};
//!
//! fn main() {
//!     init_tracing(1);
//!     install_panic_hook();
//!     // ... run the pipeline
//! }
//! ```

pub mod context;
pub mod panic_hook;
pub mod subscriber;

pub use context::{
    get_current_context, get_progress, record_emitted, reset_progress, set_stage, ContextGuard,
    StageContextInfo,
};
pub use panic_hook::install_panic_hook;
pub use subscriber::{init_tracing, verbosity_filter};
