//! Pluggable hash functions used by the signer stages.
//!
//! The pipeline never depends on a concrete algorithm: every stage talks to a
//! [`SynchronizedHashResource`], which in turn owns two [`HashFunction`]
//! trait objects. One of them is *restricted* (never invoked by more than one
//! caller at a time), the other is *free* (any number of concurrent callers).
//!
//! ## Built-in algorithms
//!
//! | Algorithm | Output                          |
//! |-----------|---------------------------------|
//! | `md5`     | lowercase hex digest            |
//! | `crc32`   | IEEE checksum as decimal string |
//! | `sha256`  | lowercase hex digest            |
//! | `xxh64`   | seed-0 hash as decimal string   |
//!
//! ## Wrappers
//!
//! - [`Delayed`] sleeps after each call to simulate a slow dependency.
//! - [`OverheatGuard`] fails any call that overlaps with another one, which
//!   is how tests prove the restricted lock is actually held.

pub mod algorithms;
pub mod resource;
pub mod wrappers;

use crate::errors::HashError;

pub use algorithms::{Crc32Hash, HashAlgorithm, Md5Hash, Sha256Hash, Xxh64Hash};
pub use resource::SynchronizedHashResource;
pub use wrappers::{Delayed, OverheatGuard};

/// A string-to-string hash computation.
///
/// Implementations must be usable from many threads; whether they may be
/// *called* concurrently is decided by where they are plugged into
/// [`SynchronizedHashResource`].
pub trait HashFunction: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Hash `data` into its string form.
    fn hash(&self, data: &str) -> Result<String, HashError>;
}

impl<H: HashFunction + ?Sized> HashFunction for Box<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        (**self).hash(data)
    }
}

impl<H: HashFunction + ?Sized> HashFunction for std::sync::Arc<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        (**self).hash(data)
    }
}

/// Adapter turning a closure into a [`HashFunction`].
///
/// Mostly useful for tests that need to instrument or break a hash.
pub struct FnHash<F> {
    name: String,
    func: F,
}

impl<F> FnHash<F>
where
    F: Fn(&str) -> Result<String, HashError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> HashFunction for FnHash<F>
where
    F: Fn(&str) -> Result<String, HashError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        (self.func)(data)
    }
}
