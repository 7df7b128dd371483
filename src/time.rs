//! Simulation time for the dataflow machine.
//!
//! Represents a logical timestamp with no dependency on `std::time`.
//! Time advances only when the machine executes tasks and cost models
//! price them, never from wall-clock observation.

/// A point on the simulated clock, in integer ticks (nanoseconds by
/// convention of the cost models, but the engine does not care).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(u64);

impl Time {
    /// The zero-point of simulation time. Every Start task is seeded here.
    pub const ZERO: Time = Time(0);

    /// Create a new `Time` from a raw tick value.
    #[inline]
    pub fn new(ticks: u64) -> Self {
        Time(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// The time `delay` ticks after `self`, saturating at `u64::MAX`.
    ///
    /// Cost models use this so an absurd model parameter pins the clock
    /// instead of wrapping around.
    #[inline]
    pub fn plus(self, delay: u64) -> Time {
        Time(self.0.saturating_add(delay))
    }

    /// Returns the duration (in ticks) between two points in time.
    /// Returns `None` if `other` is after `self`.
    #[inline]
    pub fn duration_since(self, other: Time) -> Option<u64> {
        self.0.checked_sub(other.0)
    }
}

impl From<u64> for Time {
    fn from(ticks: u64) -> Self {
        Time(ticks)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}
