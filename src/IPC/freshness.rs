//! New-vs-stale bookkeeping driven by the producer's update timestamp.
//!
//! Two separate questions are answered here:
//! - *Is this a new sample?* The header's update time differs from the one
//!   seen on the previous read.
//! - *How old is the newest sample?* Host wall clock minus the update time,
//!   independent of whether the reader has already seen it. This catches a
//!   producer that stopped writing altogether.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A `timespec`-style timestamp from the producer's realtime clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProducerTime {
    pub sec: i64,
    pub nsec: i64,
}

impl ProducerTime {
    pub const ZERO: Self = Self { sec: 0, nsec: 0 };

    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Seconds from `earlier` to `self`; negative if `self` is older.
    pub fn seconds_since(&self, earlier: &ProducerTime) -> f64 {
        let ds = self.sec.wrapping_sub(earlier.sec) as f64;
        let dns = self.nsec.wrapping_sub(earlier.nsec) as f64;
        ds + dns / NANOS_PER_SEC as f64
    }

    /// Convert to a `SystemTime`, if the timestamp is representable and not before the epoch.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let sec = u64::try_from(self.sec).ok()?;
        let nsec = u32::try_from(self.nsec).ok().filter(|n| i64::from(*n) < NANOS_PER_SEC)?;
        UNIX_EPOCH.checked_add(Duration::new(sec, nsec))
    }

    /// The host's realtime clock in the producer's representation.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX),
            nsec: i64::from(since_epoch.subsec_nanos()),
        }
    }
}

/// Update/read timestamps for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Freshness {
    last_update: ProducerTime,
    last_read: ProducerTime,
    new_sample: bool,
}

impl Freshness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the update time from a freshly decoded header.
    ///
    /// Returns whether it differs from the last one read; if so, it becomes
    /// the new last-read time.
    pub fn observe(&mut self, update: ProducerTime) -> bool {
        self.last_update = update;
        self.new_sample = update != self.last_read;
        if self.new_sample {
            self.last_read = update;
        }
        self.new_sample
    }

    /// Whether the most recent `observe` saw a new sample.
    pub fn is_new_sample(&self) -> bool {
        self.new_sample
    }

    /// Producer clock from the latest header.
    pub fn last_update_time(&self) -> ProducerTime {
        self.last_update
    }

    /// Producer clock of the last sample this reader consumed.
    pub fn last_read_time(&self) -> ProducerTime {
        self.last_read
    }

    /// Wall-clock age of the newest sample. Zero if the producer's clock is ahead of ours.
    pub fn data_age(&self) -> Duration {
        self.data_age_at(SystemTime::now())
    }

    /// Age of the newest sample relative to `now`.
    ///
    /// A producer that never wrote (zero timestamp) is reported as old as the epoch.
    pub fn data_age_at(&self, now: SystemTime) -> Duration {
        let updated = self.last_update.to_system_time().unwrap_or(UNIX_EPOCH);
        now.duration_since(updated).unwrap_or_default()
    }

    /// `Some(age)` if the newest sample is older than `threshold` at `now`.
    pub fn stale_at(&self, threshold: Duration, now: SystemTime) -> Option<Duration> {
        let age = self.data_age_at(now);
        (age > threshold).then_some(age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_nonzero_update_is_new() {
        let mut freshness = Freshness::new();
        assert!(freshness.observe(ProducerTime::new(100, 5)));
        assert!(freshness.is_new_sample());
        assert_eq!(freshness.last_read_time(), ProducerTime::new(100, 5));
    }

    #[test]
    fn test_zero_update_is_not_new() {
        let mut freshness = Freshness::new();
        assert!(!freshness.observe(ProducerTime::ZERO));
        assert!(freshness.last_read_time().is_zero());
    }

    #[test]
    fn test_repeat_update_is_not_new() {
        let mut freshness = Freshness::new();
        freshness.observe(ProducerTime::new(100, 0));
        assert!(!freshness.observe(ProducerTime::new(100, 0)));
        assert!(!freshness.is_new_sample());
    }

    #[test]
    fn test_nanosecond_change_is_new() {
        let mut freshness = Freshness::new();
        freshness.observe(ProducerTime::new(100, 0));
        assert!(freshness.observe(ProducerTime::new(100, 1)));
    }

    #[test]
    fn test_seconds_since() {
        let a = ProducerTime::new(10, 500_000_000);
        let b = ProducerTime::new(12, 0);
        assert!((b.seconds_since(&a) - 1.5).abs() < 1e-9);
        assert!((a.seconds_since(&b) + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_data_age_at() {
        let mut freshness = Freshness::new();
        freshness.observe(ProducerTime::new(1_000, 0));
        let now = UNIX_EPOCH + Duration::from_secs(1_003);
        assert_eq!(freshness.data_age_at(now), Duration::from_secs(3));
        assert_eq!(
            freshness.stale_at(Duration::from_secs(2), now),
            Some(Duration::from_secs(3))
        );
        assert_eq!(freshness.stale_at(Duration::from_secs(5), now), None);
    }

    #[test]
    fn test_data_age_future_update_is_zero() {
        let mut freshness = Freshness::new();
        freshness.observe(ProducerTime::new(2_000, 0));
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(freshness.data_age_at(now), Duration::ZERO);
    }

    #[test]
    fn test_age_tracks_update_not_read() {
        let mut freshness = Freshness::new();
        freshness.observe(ProducerTime::new(1_000, 0));
        freshness.observe(ProducerTime::new(1_000, 0));
        let now = UNIX_EPOCH + Duration::from_secs(1_010);
        assert_eq!(freshness.data_age_at(now), Duration::from_secs(10));
    }

    #[test]
    fn test_to_system_time_rejects_negative() {
        assert!(ProducerTime::new(-1, 0).to_system_time().is_none());
        assert!(ProducerTime::new(1, NANOS_PER_SEC).to_system_time().is_none());
    }
}
