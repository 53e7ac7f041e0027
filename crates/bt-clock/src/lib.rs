//! Time sources consumed by the block tensor.
//!
//! A [`TimeSource`] yields non-negative milliseconds. When a source cannot
//! currently produce a value, [`TimeSource::now_ms`] blocks until it can;
//! there is no fallback to another clock, so all timestamps written into one
//! tensor come from the same source.
//!
//! - [`SystemClock`]: local wall clock, always available.
//! - [`ManualClock`]: explicitly set time for tests and replay.
//! - [`MonotonicClock`]: never goes backwards relative to its own output.
//! - [`AggregateClock`]: mean of several reference clocks tracked as
//!   offsets from local time; unavailable while no reference is accurate.

pub mod aggregate;
pub mod error;
pub mod monotonic;
pub mod source;

pub use aggregate::AggregateClock;
pub use error::ClockError;
pub use monotonic::MonotonicClock;
pub use source::{ManualClock, SystemClock, TimeSource};
