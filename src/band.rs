use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ranklist::RankList;

/// Tree and rank cache of one score band, guarded together by the band's
/// reader-writer lock.
#[derive(Debug)]
pub(crate) struct BandState {
    pub tree: RankList,
    /// Count of ranked entries in all strictly higher bands; equivalently
    /// the 0-based global rank of this band's first entry. For the sentinel
    /// band this is the whole ranked population.
    pub prefix_rank: u32,
}

/// One score-band shard: a fixed `(lo, hi]` score range, an order-statistic
/// tree, and a cached prefix rank. The shard itself is a passive container;
/// the index maintains the prefix invariant across shards.
///
/// parking_lot's RwLock blocks new readers once a writer is queued, so a
/// stream of overlapping readers cannot starve update traffic.
#[derive(Debug)]
pub(crate) struct Band {
    lo: i64,
    hi: i64,
    state: RwLock<BandState>,
}

impl Band {
    pub fn new(lo: i64, hi: i64) -> Self {
        Self {
            lo,
            hi,
            state: RwLock::new(BandState {
                tree: RankList::new(),
                prefix_rank: 0,
            }),
        }
    }

    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, BandState> {
        self.state.read()
    }

    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, BandState> {
        self.state.write()
    }

    #[inline]
    pub fn contains(&self, score: i64) -> bool {
        score > self.lo && score <= self.hi
    }
}
