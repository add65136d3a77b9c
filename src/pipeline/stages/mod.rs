//! Concrete signer stages.
//!
//! Each module pairs a [`Stage`](super::Stage) implementation with the pure
//! string-composition functions it relies on, so the ordering rules can be
//! tested without threads:
//!
//! - [`generator`]: emits a fixed seed sequence
//! - [`single_hash`]: `free(x) ~ free(restricted(x))` per item
//! - [`multi_hash`]: six indexed free hashes per item, joined by index
//! - [`combine`]: sorts everything and joins with `_`
//! - [`sink`]: observes items on their way out

pub mod combine;
pub mod generator;
pub mod multi_hash;
pub mod single_hash;
pub mod sink;

pub use combine::CombineResults;
pub use generator::Generator;
pub use multi_hash::MultiHash;
pub use single_hash::SingleHash;
pub use sink::Sink;
