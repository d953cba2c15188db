use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A monotonic time point, in nanoseconds since an arbitrary clock origin.
///
/// `u64` nanoseconds is ~584 years, so saturating arithmetic is used instead
/// of overflow checks on the hot paths. Timestamps from different clock
/// identities must not be compared; the scheduler owns one clock and sticks
/// to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock origin. A perfectly valid deadline: an event due exactly at
    /// the origin is armed, not "unset".
    pub const ZERO: Timestamp = Timestamp(0);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    /// Builds a timestamp from a `(seconds, nanoseconds)` pair, the form in
    /// which POSIX-style clock sources report time.
    ///
    /// `nanos` above `10^9` carries into the seconds component.
    #[inline]
    pub const fn from_parts(secs: u64, nanos: u64) -> Self {
        Timestamp(secs.saturating_mul(NANOS_PER_SEC).saturating_add(nanos))
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn secs(self) -> u64 {
        self.0 / NANOS_PER_SEC
    }

    #[inline]
    pub const fn subsec_nanos(self) -> u32 {
        (self.0 % NANOS_PER_SEC) as u32
    }

    /// The time point `delay` after `self`, saturating at the clock's end.
    #[inline]
    pub fn saturating_add(self, delay: Duration) -> Self {
        let delay_ns = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(delay_ns))
    }

    /// Nanoseconds from `earlier` to `self`, or 0 if `earlier` is actually
    /// later.
    #[inline]
    pub const fn saturating_nanos_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}
