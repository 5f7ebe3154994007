use crate::index::BucketedIndex;
use crate::snapshot::SnapshotIndex;

/// Largest per-update score delta magnitude the callers are allowed to
/// send. Band widths are validated against this so a single update can
/// cross at most one band boundary.
pub const MAX_DELTA: i64 = 1000;

/// One row of a ranking query: 1-based rank, descending score order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankedEntry {
    pub customer_id: i64,
    pub score: i64,
    pub rank: u32,
}

/// The three leaderboard operations, shared by both index flavors.
///
/// Input validation (positive customer ids, delta range, non-negative
/// window sizes) belongs to the transport layer in front of this trait;
/// the implementations treat violations as caller bugs.
pub trait Leaderboard: Send + Sync {
    /// Applies a signed delta to the customer's accumulated score and
    /// returns the new total.
    fn update(&self, customer_id: i64, delta: i64) -> i64;

    /// Entries at global ranks `[start, end]` inclusive, ascending by rank.
    fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry>;

    /// Entries at ranks `[max(1, R - high), R + low]` around the customer's
    /// global rank `R`; empty when the customer is not ranked.
    fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry>;
}

impl Leaderboard for BucketedIndex {
    fn update(&self, customer_id: i64, delta: i64) -> i64 {
        BucketedIndex::update(self, customer_id, delta)
    }

    fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry> {
        BucketedIndex::ranks_by_range(self, start, end)
    }

    fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry> {
        BucketedIndex::ranks_by_customer(self, customer_id, high, low)
    }
}

impl Leaderboard for SnapshotIndex {
    fn update(&self, customer_id: i64, delta: i64) -> i64 {
        SnapshotIndex::update(self, customer_id, delta)
    }

    fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry> {
        SnapshotIndex::ranks_by_range(self, start, end)
    }

    fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry> {
        SnapshotIndex::ranks_by_customer(self, customer_id, high, low)
    }
}

/// Startup-time choice between the strongly consistent banded index and
/// the eventually consistent snapshot variant.
pub enum Engine {
    Bucketed(BucketedIndex),
    Snapshot(SnapshotIndex),
}

impl Engine {
    pub fn bucketed() -> Self {
        Self::Bucketed(BucketedIndex::new())
    }

    pub fn snapshot() -> Self {
        Self::Snapshot(SnapshotIndex::new())
    }
}

impl Leaderboard for Engine {
    fn update(&self, customer_id: i64, delta: i64) -> i64 {
        match self {
            Self::Bucketed(index) => index.update(customer_id, delta),
            Self::Snapshot(index) => index.update(customer_id, delta),
        }
    }

    fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry> {
        match self {
            Self::Bucketed(index) => index.ranks_by_range(start, end),
            Self::Snapshot(index) => index.ranks_by_range(start, end),
        }
    }

    fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry> {
        match self {
            Self::Bucketed(index) => index.ranks_by_customer(customer_id, high, low),
            Self::Snapshot(index) => index.ranks_by_customer(customer_id, high, low),
        }
    }
}
