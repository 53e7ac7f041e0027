use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};

use tracing::{debug, warn};

use crate::error::ClockError;
use crate::source::{SystemClock, TimeSource};

/// Last known state of one reference clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ReferenceState {
    /// Reference time minus local time, in milliseconds.
    offset_ms: i64,
    accurate: bool,
}

/// Time source aggregated from several reference clocks.
///
/// Each reference clock is tracked as an offset from the local clock and is
/// either accurate (recently synchronised) or not. The aggregate reading is
/// the integer mean of `local + offset` over the accurate references.
/// Whoever synchronises the references (NTP polling, a trusted peer, ...)
/// reports results through [`report_offset`](Self::report_offset) and
/// [`mark_inaccurate`](Self::mark_inaccurate).
///
/// With no accurate reference the clock is unavailable: `try_now_ms` returns
/// `None` and `now_ms` blocks until an offset is reported.
pub struct AggregateClock<L = SystemClock> {
    local: L,
    references: Mutex<BTreeMap<String, ReferenceState>>,
    available: Condvar,
}

impl AggregateClock<SystemClock> {
    /// Aggregate over the local wall clock.
    pub fn new() -> Self {
        Self::with_local(SystemClock)
    }
}

impl Default for AggregateClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: TimeSource> AggregateClock<L> {
    /// Aggregate over an arbitrary local source.
    pub fn with_local(local: L) -> Self {
        Self {
            local,
            references: Mutex::new(BTreeMap::new()),
            available: Condvar::new(),
        }
    }

    /// Add a reference clock. It starts out inaccurate.
    pub fn register(&self, name: impl Into<String>) -> Result<(), ClockError> {
        let name = name.into();
        let mut refs = self.references.lock().expect("aggregate clock lock poisoned");
        if refs.contains_key(&name) {
            return Err(ClockError::AlreadyRegistered(name));
        }
        refs.insert(name, ReferenceState::default());
        Ok(())
    }

    /// Record a successful synchronisation of `name` and mark it accurate.
    pub fn report_offset(&self, name: &str, offset_ms: i64) -> Result<(), ClockError> {
        let mut refs = self.references.lock().expect("aggregate clock lock poisoned");
        let state = refs
            .get_mut(name)
            .ok_or_else(|| ClockError::UnknownClock(name.to_string()))?;
        state.offset_ms = offset_ms;
        state.accurate = true;
        debug!(clock = name, offset_ms, "reference clock synchronised");
        drop(refs);
        self.available.notify_all();
        Ok(())
    }

    /// Record a failed synchronisation of `name`; it stops contributing.
    pub fn mark_inaccurate(&self, name: &str) -> Result<(), ClockError> {
        let mut refs = self.references.lock().expect("aggregate clock lock poisoned");
        let state = refs
            .get_mut(name)
            .ok_or_else(|| ClockError::UnknownClock(name.to_string()))?;
        state.accurate = false;
        let remaining = refs.values().filter(|s| s.accurate).count();
        if remaining == 0 {
            warn!(clock = name, "last accurate reference clock lost; time unavailable");
        } else {
            debug!(clock = name, remaining, "reference clock marked inaccurate");
        }
        Ok(())
    }

    /// Number of registered reference clocks.
    pub fn clock_count(&self) -> usize {
        self.references
            .lock()
            .expect("aggregate clock lock poisoned")
            .len()
    }

    /// Number of reference clocks currently contributing.
    pub fn accurate_count(&self) -> usize {
        self.references
            .lock()
            .expect("aggregate clock lock poisoned")
            .values()
            .filter(|s| s.accurate)
            .count()
    }

    pub fn is_time_available(&self) -> bool {
        self.accurate_count() > 0
    }

    fn accurate_offsets(refs: &BTreeMap<String, ReferenceState>) -> Vec<i64> {
        refs.values()
            .filter(|s| s.accurate)
            .map(|s| s.offset_ms)
            .collect()
    }

    fn aggregate(local_ms: u64, offsets: &[i64]) -> Option<u64> {
        if offsets.is_empty() {
            return None;
        }
        let sum: i128 = offsets
            .iter()
            .map(|&offset| i128::from(local_ms) + i128::from(offset))
            .sum();
        let mean = sum / offsets.len() as i128;
        Some(mean.clamp(0, i128::from(u64::MAX)) as u64)
    }
}

impl<L: TimeSource> TimeSource for AggregateClock<L> {
    fn try_now_ms(&self) -> Option<u64> {
        let offsets = {
            let refs = self.references.lock().expect("aggregate clock lock poisoned");
            Self::accurate_offsets(&refs)
        };
        if offsets.is_empty() {
            return None;
        }
        Self::aggregate(self.local.try_now_ms()?, &offsets)
    }

    fn now_ms(&self) -> u64 {
        let offsets = {
            let refs = self.references.lock().expect("aggregate clock lock poisoned");
            let refs = self
                .available
                .wait_while(refs, |refs| refs.values().all(|s| !s.accurate))
                .expect("aggregate clock lock poisoned");
            Self::accurate_offsets(&refs)
        };
        let local = self.local.now_ms();
        // Non-empty: the wait above only returns once a reference is accurate.
        Self::aggregate(local, &offsets).unwrap_or(local)
    }
}

impl<L> std::fmt::Debug for AggregateClock<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let refs = self.references.lock().expect("aggregate clock lock poisoned");
        f.debug_struct("AggregateClock")
            .field("clock_count", &refs.len())
            .field("accurate_count", &refs.values().filter(|s| s.accurate).count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::source::ManualClock;

    fn clock_at(local_ms: u64) -> AggregateClock<ManualClock> {
        AggregateClock::with_local(ManualClock::new(local_ms))
    }

    #[test]
    fn unavailable_without_references() {
        let clock = clock_at(1_000);
        assert!(!clock.is_time_available());
        assert_eq!(clock.try_now_ms(), None);
    }

    #[test]
    fn registered_but_unsynchronised_is_unavailable() {
        let clock = clock_at(1_000);
        clock.register("a").unwrap();
        assert_eq!(clock.clock_count(), 1);
        assert_eq!(clock.accurate_count(), 0);
        assert_eq!(clock.try_now_ms(), None);
    }

    #[test]
    fn mean_of_accurate_offsets() {
        let clock = clock_at(1_000);
        for name in ["a", "b", "c"] {
            clock.register(name).unwrap();
        }
        clock.report_offset("a", 10).unwrap();
        clock.report_offset("b", -4).unwrap();
        assert_eq!(clock.try_now_ms(), Some(1_003));

        clock.report_offset("c", 100).unwrap();
        assert_eq!(clock.now_ms(), 1_035);

        clock.mark_inaccurate("c").unwrap();
        assert_eq!(clock.accurate_count(), 2);
        assert_eq!(clock.now_ms(), 1_003);
    }

    #[test]
    fn negative_aggregate_clamps_to_zero() {
        let clock = clock_at(5);
        clock.register("behind").unwrap();
        clock.report_offset("behind", -100).unwrap();
        assert_eq!(clock.try_now_ms(), Some(0));
    }

    #[test]
    fn duplicate_and_unknown_clocks_are_errors() {
        let clock = clock_at(0);
        clock.register("a").unwrap();
        assert_eq!(
            clock.register("a"),
            Err(ClockError::AlreadyRegistered("a".into()))
        );
        assert_eq!(
            clock.report_offset("zz", 1),
            Err(ClockError::UnknownClock("zz".into()))
        );
        assert_eq!(
            clock.mark_inaccurate("zz"),
            Err(ClockError::UnknownClock("zz".into()))
        );
    }

    #[test]
    fn now_blocks_until_a_reference_synchronises() {
        let clock = Arc::new(clock_at(2_000));
        clock.register("ntp-1").unwrap();

        let reader = {
            let clock = Arc::clone(&clock);
            thread::spawn(move || clock.now_ms())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!reader.is_finished());

        clock.report_offset("ntp-1", 7).unwrap();
        assert_eq!(reader.join().unwrap(), 2_007);
    }

    #[test]
    fn system_backed_default() {
        let clock = AggregateClock::default();
        clock.register("ref").unwrap();
        clock.report_offset("ref", 0).unwrap();
        assert!(clock.now_ms() > 1_577_836_800_000);
    }
}
