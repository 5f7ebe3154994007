use crate::service::MAX_DELTA;

/// Identifies one contiguous score band. Key 0 is the sentinel band for
/// non-positive scores and never holds ranked entries; higher keys cover
/// strictly higher score ranges.
pub type BandKey = usize;

/// Inclusive upper bounds of the standard bands 1..=30; band 31 is unbounded.
///
/// Steps of 5k to 45k, 50k to 450k, 500k to 4.5M, then 5M/10M/20M. Any
/// monotonic partition works as long as every band is wider than the largest
/// per-update delta, which pins a single update to one adjacent band pair.
const STANDARD_UPPERS: [i64; 30] = [
    5_000,
    10_000,
    15_000,
    20_000,
    25_000,
    30_000,
    35_000,
    40_000,
    45_000,
    50_000,
    100_000,
    150_000,
    200_000,
    250_000,
    300_000,
    350_000,
    400_000,
    450_000,
    500_000,
    1_000_000,
    1_500_000,
    2_000_000,
    2_500_000,
    3_000_000,
    3_500_000,
    4_000_000,
    4_500_000,
    5_000_000,
    10_000_000,
    20_000_000,
];

/// Score partition policy: a fixed, strictly increasing list of band upper
/// bounds. Fixed at index construction.
#[derive(Clone, Debug)]
pub struct Bands {
    uppers: Vec<i64>,
}

impl Bands {
    /// The standard 32-band table.
    pub fn standard() -> Self {
        Self::new(STANDARD_UPPERS.to_vec())
    }

    /// Builds a custom partition from inclusive upper bounds.
    ///
    /// Panics unless the bounds are positive, strictly increasing, and every
    /// band is wider than [`MAX_DELTA`].
    pub fn new(uppers: Vec<i64>) -> Self {
        assert!(!uppers.is_empty(), "band table must not be empty");
        let mut prev = 0;
        for &upper in &uppers {
            assert!(
                upper - prev > MAX_DELTA,
                "band ({prev}, {upper}] narrower than the maximum delta"
            );
            prev = upper;
        }
        Self { uppers }
    }

    /// Number of bands, including the non-positive sentinel and the
    /// unbounded top band.
    #[inline]
    pub fn count(&self) -> usize {
        self.uppers.len() + 2
    }

    /// The band holding `score`.
    #[inline]
    pub fn key_of(&self, score: i64) -> BandKey {
        if score <= 0 {
            0
        } else {
            1 + self.uppers.partition_point(|&upper| score > upper)
        }
    }

    /// Half-open range `(lo, hi]` covered by `key`.
    pub fn range(&self, key: BandKey) -> (i64, i64) {
        debug_assert!(key < self.count(), "band key out of range");
        if key == 0 {
            return (i64::MIN, 0);
        }
        let lo = if key == 1 { 0 } else { self.uppers[key - 2] };
        let hi = self.uppers.get(key - 1).copied().unwrap_or(i64::MAX);
        (lo, hi)
    }
}

impl Default for Bands {
    fn default() -> Self {
        Self::standard()
    }
}
