//! Decorators around a [`HashFunction`].

use super::HashFunction;
use crate::errors::HashError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Sleeps for a fixed duration after every hash, modelling a slow dependency.
pub struct Delayed<H> {
    inner: H,
    delay: Duration,
}

impl<H: HashFunction> Delayed<H> {
    pub fn new(inner: H, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<H: HashFunction> HashFunction for Delayed<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        let result = self.inner.hash(data)?;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(result)
    }
}

/// Rejects overlapping calls.
///
/// The wrapped hash is treated as a device that overheats when two callers
/// use it at once: the second caller gets a [`HashError`] instead of a
/// result. Plugged in as the restricted hash, it turns any locking mistake
/// into a pipeline abort.
pub struct OverheatGuard<H> {
    inner: H,
    busy: AtomicBool,
}

impl<H: HashFunction> OverheatGuard<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            busy: AtomicBool::new(false),
        }
    }
}

struct BusyFlag<'a>(&'a AtomicBool);

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<H: HashFunction> HashFunction for OverheatGuard<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::warn!(algorithm = self.inner.name(), "concurrent call rejected");
            return Err(HashError::new(
                self.inner.name(),
                data,
                "overheat: called concurrently",
            ));
        }
        let _flag = BusyFlag(&self.busy);
        self.inner.hash(data)
    }
}
