use super::Error;
use std::num::NonZeroU64;

/// Selects which index entries are also written to the summaries file.
///
/// A [Sampler] admits every `interval`-th entry (by position in write order), starting with the
/// first. Admission depends only on the position of an entry, so a reader can recompute exactly
/// how many summaries a fileset must contain from its entry count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampler {
    interval: NonZeroU64,
}

impl Sampler {
    /// Create a [Sampler] that admits approximately `percent` of all entries.
    ///
    /// The interval is `round(1 / percent)` (and at least 1). Returns
    /// [Error::InvalidSummariesPercent] unless `0 < percent <= 1`.
    pub fn new(percent: f64) -> Result<Self, Error> {
        if !(percent > 0.0 && percent <= 1.0) {
            return Err(Error::InvalidSummariesPercent(percent));
        }
        // Float to integer casts saturate.
        let interval = (1.0 / percent).round() as u64;
        Ok(Self {
            interval: NonZeroU64::new(interval).unwrap_or(NonZeroU64::MIN),
        })
    }

    /// Create a [Sampler] that admits every `interval`-th entry.
    pub fn with_interval(interval: NonZeroU64) -> Self {
        Self { interval }
    }

    /// The number of index entries per summary.
    pub fn interval(&self) -> u64 {
        self.interval.get()
    }

    /// Returns whether the entry at position `index` should be summarized.
    #[inline]
    pub fn admit(&self, index: u64) -> bool {
        index % self.interval == 0
    }

    /// The number of summaries in a fileset of `entries` entries.
    pub fn expected(&self, entries: u64) -> u64 {
        entries.div_ceil(self.interval.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1.0, 1; "every entry")]
    #[test_case(0.5, 2; "half")]
    #[test_case(0.1, 10; "tenth")]
    #[test_case(0.3, 3; "rounded down")]
    #[test_case(0.35, 3; "rounded up")]
    #[test_case(0.01, 100; "sparse")]
    #[test_case(1e-300, u64::MAX; "saturated")]
    fn test_interval(percent: f64, interval: u64) {
        assert_eq!(Sampler::new(percent).unwrap().interval(), interval);
    }

    #[test_case(0.0; "zero")]
    #[test_case(-0.5; "negative")]
    #[test_case(1.5; "above one")]
    #[test_case(f64::NAN; "nan")]
    #[test_case(f64::INFINITY; "infinity")]
    fn test_invalid_percent(percent: f64) {
        assert!(matches!(
            Sampler::new(percent),
            Err(Error::InvalidSummariesPercent(_))
        ));
    }

    #[test]
    fn test_admit() {
        let sampler = Sampler::new(0.25).unwrap();
        let admitted: Vec<u64> = (0..10).filter(|i| sampler.admit(*i)).collect();
        assert_eq!(admitted, vec![0, 4, 8]);
        assert_eq!(sampler.expected(10), 3);

        // The first entry is always admitted
        assert!(Sampler::new(1e-9).unwrap().admit(0));
    }

    #[test_case(1, 0, 0; "empty")]
    #[test_case(1, 5, 5; "every entry")]
    #[test_case(10, 100, 10; "exact multiple")]
    #[test_case(10, 101, 11; "one past multiple")]
    #[test_case(10, 9, 1; "fewer than interval")]
    fn test_expected(interval: u64, entries: u64, expected: u64) {
        let sampler = Sampler::with_interval(NonZeroU64::new(interval).unwrap());
        assert_eq!(sampler.expected(entries), expected);
        assert_eq!(
            (0..entries).filter(|i| sampler.admit(*i)).count() as u64,
            expected
        );
    }
}
