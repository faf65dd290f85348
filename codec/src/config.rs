//! Types for use as [crate::Read::Cfg].

use core::ops::{Bound, RangeBounds};

/// Configuration for limiting the length of a variable-length value.
///
/// # Examples
///
/// ```
/// use shardfs_codec::RangeCfg;
///
/// let cfg = RangeCfg::from(0..=1024);
/// assert!(cfg.contains(500));
/// assert!(!cfg.contains(2000));
///
/// let cfg_min = RangeCfg::from(1..);
/// assert!(cfg_min.contains(1));
/// assert!(!cfg_min.contains(0));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RangeCfg {
    start: Bound<usize>,
    end: Bound<usize>,
}

impl RangeCfg {
    /// Creates a new `RangeCfg` from any range of `usize`.
    pub fn new(r: impl RangeBounds<usize>) -> Self {
        Self {
            start: r.start_bound().cloned(),
            end: r.end_bound().cloned(),
        }
    }

    /// Returns true if the value is within this range.
    pub fn contains(&self, value: usize) -> bool {
        match self.start {
            Bound::Included(s) if value < s => return false,
            Bound::Excluded(s) if value <= s => return false,
            _ => {}
        }
        match self.end {
            Bound::Included(e) if value > e => return false,
            Bound::Excluded(e) if value >= e => return false,
            _ => {}
        }
        true
    }
}

macro_rules! impl_from_range {
    ($($range:ty),*) => {
        $(
            impl From<$range> for RangeCfg {
                fn from(r: $range) -> Self {
                    Self::new(r)
                }
            }
        )*
    };
}

impl_from_range!(
    core::ops::Range<usize>,
    core::ops::RangeInclusive<usize>,
    core::ops::RangeFrom<usize>,
    core::ops::RangeTo<usize>,
    core::ops::RangeToInclusive<usize>,
    core::ops::RangeFull
);

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RangeCfg::from(..), 0, true; "full accepts zero")]
    #[test_case(RangeCfg::from(..), usize::MAX, true; "full accepts max")]
    #[test_case(RangeCfg::from(2..5), 5, false; "exclusive end")]
    #[test_case(RangeCfg::from(2..=5), 5, true; "inclusive end")]
    #[test_case(RangeCfg::from(2..), 1, false; "below start")]
    #[test_case(RangeCfg::from(..=0), 0, true; "only zero")]
    fn test_contains(cfg: RangeCfg, value: usize, expected: bool) {
        assert_eq!(cfg.contains(value), expected);
    }
}
