use std::sync::Mutex;

use crate::source::TimeSource;

/// Wraps a source so that its readings never decrease.
///
/// A reading below the last value handed out is raised to that value. Safe
/// for concurrent use; readings from concurrent callers are totally ordered
/// by the internal mutex.
#[derive(Debug)]
pub struct MonotonicClock<S> {
    inner: S,
    last_ms: Mutex<u64>,
}

impl<S: TimeSource> MonotonicClock<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last_ms: Mutex::new(0),
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn observe(&self, reading: u64) -> u64 {
        let mut last = self.last_ms.lock().expect("monotonic clock lock poisoned");
        *last = (*last).max(reading);
        *last
    }
}

impl<S: TimeSource> TimeSource for MonotonicClock<S> {
    fn try_now_ms(&self) -> Option<u64> {
        self.inner.try_now_ms().map(|reading| self.observe(reading))
    }

    fn now_ms(&self) -> u64 {
        let reading = self.inner.now_ms();
        self.observe(reading)
    }
}
