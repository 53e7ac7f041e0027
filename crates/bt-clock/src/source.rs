use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound on the sleep between polls in the default [`TimeSource::now_ms`].
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A provider of timestamps in milliseconds.
pub trait TimeSource: Send + Sync {
    /// The current time, or `None` if the source cannot produce one right now.
    fn try_now_ms(&self) -> Option<u64>;

    /// The current time, blocking until the source can produce one.
    ///
    /// The default implementation polls [`try_now_ms`](Self::try_now_ms)
    /// with exponential back-off. Sources that can be notified override it.
    fn now_ms(&self) -> u64 {
        let mut interval = Duration::from_micros(50);
        loop {
            if let Some(now) = self.try_now_ms() {
                return now;
            }
            thread::sleep(interval);
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
        }
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn try_now_ms(&self) -> Option<u64> {
        (**self).try_now_ms()
    }

    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn try_now_ms(&self) -> Option<u64> {
        (**self).try_now_ms()
    }

    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Local wall clock: milliseconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

impl TimeSource for SystemClock {
    fn try_now_ms(&self) -> Option<u64> {
        Some(Self::wall_clock_ms())
    }

    fn now_ms(&self) -> u64 {
        Self::wall_clock_ms()
    }
}

/// Clock whose value only changes when told to.
///
/// Starts either at a fixed time or unavailable; blocked readers wake as
/// soon as a value is set.
#[derive(Debug, Default)]
pub struct ManualClock {
    current: Mutex<Option<u64>>,
    available: Condvar,
}

impl ManualClock {
    /// A clock reading `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            current: Mutex::new(Some(start_ms)),
            available: Condvar::new(),
        }
    }

    /// A clock with no value yet; `now_ms` blocks until [`set`](Self::set).
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        *self.current.lock().expect("manual clock lock poisoned") = Some(ms);
        self.available.notify_all();
    }

    /// Move the clock forward by `delta_ms`. Has no effect while unavailable.
    pub fn advance(&self, delta_ms: u64) {
        let mut current = self.current.lock().expect("manual clock lock poisoned");
        if let Some(ms) = current.as_mut() {
            *ms = ms.saturating_add(delta_ms);
        }
    }

    /// Make the clock unavailable until the next [`set`](Self::set).
    pub fn make_unavailable(&self) {
        *self.current.lock().expect("manual clock lock poisoned") = None;
    }
}

impl TimeSource for ManualClock {
    fn try_now_ms(&self) -> Option<u64> {
        *self.current.lock().expect("manual clock lock poisoned")
    }

    fn now_ms(&self) -> u64 {
        let guard = self.current.lock().expect("manual clock lock poisoned");
        let guard = self
            .available
            .wait_while(guard, |current| current.is_none())
            .expect("manual clock lock poisoned");
        guard.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_reasonable() {
        // After 2020-01-01.
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
        assert!(SystemClock.try_now_ms().is_some());
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_ms(), 100);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 105);
        clock.set(7);
        assert_eq!(clock.try_now_ms(), Some(7));
    }

    #[test]
    fn unavailable_manual_clock_yields_none() {
        let clock = ManualClock::unavailable();
        assert_eq!(clock.try_now_ms(), None);
        clock.advance(10);
        assert_eq!(clock.try_now_ms(), None);
    }

    #[test]
    fn manual_clock_blocks_until_set() {
        let clock = Arc::new(ManualClock::unavailable());
        let reader = {
            let clock = Arc::clone(&clock);
            thread::spawn(move || clock.now_ms())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!reader.is_finished());
        clock.set(42);
        assert_eq!(reader.join().unwrap(), 42);
    }

    struct FlakySource {
        remaining_misses: Mutex<u32>,
    }

    impl TimeSource for FlakySource {
        fn try_now_ms(&self) -> Option<u64> {
            let mut misses = self.remaining_misses.lock().unwrap();
            if *misses == 0 {
                Some(9)
            } else {
                *misses -= 1;
                None
            }
        }
    }

    #[test]
    fn default_now_polls_until_available() {
        let source = FlakySource {
            remaining_misses: Mutex::new(3),
        };
        assert_eq!(source.now_ms(), 9);
        assert_eq!(*source.remaining_misses.lock().unwrap(), 0);
    }

    #[test]
    fn arc_dyn_forwards() {
        let clock: Arc<dyn TimeSource> = Arc::new(ManualClock::new(3));
        assert_eq!(clock.now_ms(), 3);
    }
}
