// Shared helpers for signer integration tests
#![allow(dead_code)]

use signer::errors::HashError;
use signer::hashing::{FnHash, HashFunction};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Combined result for seed [0, 1, 1, 2, 3, 5, 8] with md5/crc32 and no salt.
pub const GOLDEN_SEED: [u32; 7] = [0, 1, 1, 2, 3, 5, 8];
pub const GOLDEN_RESULT: &str = concat!(
    "1173136728138862632818075107442090076184424490584241521304_",
    "1696913515191343735512658979631549563179965036907783101867_",
    "27225454331033649287118297354036464389062965355426795162684_",
    "29568666068035183841425683795340791879727309630931025356555_",
    "3994492081516972096677631278379039212655368881548151736_",
    "4958044192186797981418233587017209679042592862002427381542_",
    "4958044192186797981418233587017209679042592862002427381542",
);

/// Tracks how many callers are inside a hash at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wrap `inner` so every call is recorded by `gauge` and takes at least `hold`.
pub fn gauged(
    inner: impl HashFunction + 'static,
    gauge: Arc<ConcurrencyGauge>,
    hold: Duration,
) -> Box<dyn HashFunction> {
    let name = inner.name().to_string();
    Box::new(FnHash::new(name, move |data: &str| {
        gauge.enter();
        std::thread::sleep(hold);
        let result = inner.hash(data);
        gauge.exit();
        result
    }))
}

/// A hash that fails for exactly one input and echoes everything else.
pub fn failing_on(bad_input: &'static str) -> Box<dyn HashFunction> {
    Box::new(FnHash::new("failing", move |data: &str| {
        if data == bad_input {
            Err(HashError::new("failing", data, "injected failure"))
        } else {
            Ok(format!("<{data}>"))
        }
    }))
}

/// Cheap deterministic jitter derived from the input, up to `max_ms`.
pub fn jitter(data: &str, max_ms: u64) -> Duration {
    let sum: u64 = data.bytes().map(u64::from).sum();
    Duration::from_millis(sum % (max_ms + 1))
}
