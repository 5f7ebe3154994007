//! The primary ranked index: a fixed array of score-band shards plus a
//! concurrent customer→score map.
//!
//! Writers apply the delta to the score map, then mutate the one or two
//! band trees the move touches under their write locks, always acquiring
//! the higher band first. Range reads walk bands from the highest score
//! range down under hand-over-hand read locking: the next band's read lock
//! is taken before the current one is released, so no writer can slip an
//! entry across the boundary a reader is straddling.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::collections::VecDeque;
use std::hash::BuildHasherDefault;

use crate::band::Band;
use crate::bands::Bands;
use crate::entry::Entry;
use crate::service::RankedEntry;

type ScoreMap = DashMap<i64, i64, BuildHasherDefault<FxHasher>>;

pub struct BucketedIndex {
    scores: ScoreMap,
    bands: Bands,
    shards: Vec<Band>,
}

impl BucketedIndex {
    pub fn new() -> Self {
        Self::with_bands(Bands::standard())
    }

    pub fn with_bands(bands: Bands) -> Self {
        let shards = (0..bands.count())
            .map(|key| {
                let (lo, hi) = bands.range(key);
                Band::new(lo, hi)
            })
            .collect();
        Self {
            scores: ScoreMap::with_hasher(Default::default()),
            bands,
            shards,
        }
    }

    /// Applies `delta` to the customer's accumulated score and returns the
    /// new total. The ranked index reflects the change before this returns.
    pub fn update(&self, customer_id: i64, delta: i64) -> i64 {
        debug_assert!(customer_id > 0, "customer ids are positive");
        if delta == 0 {
            return self.scores.get(&customer_id).map_or(0, |v| *v);
        }

        // The map entry guard also serializes concurrent updates to the
        // same customer, so the remove/insert pair below always sees the
        // entry its `old` score predicts.
        let mut slot = self.scores.entry(customer_id).or_insert(0);
        let old = *slot;
        let new = old + delta;
        *slot = new;

        let old_key = self.bands.key_of(old);
        let new_key = self.bands.key_of(new);

        if old_key == new_key {
            if old_key != 0 {
                let mut state = self.shards[old_key].write();
                let removed = state.tree.remove(Entry::new(old, customer_id));
                assert!(removed, "ranked entry missing on in-band move");
                let inserted = state.tree.insert(Entry::new(new, customer_id));
                assert!(inserted, "duplicate ranked entry on in-band move");
            }
        } else if new_key > old_key {
            debug_assert_eq!(new_key, old_key + 1, "update hopped more than one band");
            let mut dst = self.shards[new_key].write();
            let mut src = self.shards[old_key].write();
            if old_key != 0 {
                let removed = src.tree.remove(Entry::new(old, customer_id));
                assert!(removed, "ranked entry missing on upward move");
            }
            debug_assert!(self.shards[new_key].contains(new));
            let inserted = dst.tree.insert(Entry::new(new, customer_id));
            assert!(inserted, "duplicate ranked entry on upward move");
            // The moved entry now ranks above everything in the source
            // band; no other band's higher-set changed.
            src.prefix_rank += 1;
        } else {
            debug_assert_eq!(old_key, new_key + 1, "update hopped more than one band");
            let mut src = self.shards[old_key].write();
            let mut dst = self.shards[new_key].write();
            let removed = src.tree.remove(Entry::new(old, customer_id));
            assert!(removed, "ranked entry missing on downward move");
            if new_key != 0 {
                debug_assert!(self.shards[new_key].contains(new));
                let inserted = dst.tree.insert(Entry::new(new, customer_id));
                assert!(inserted, "duplicate ranked entry on downward move");
            }
            dst.prefix_rank -= 1;
        }
        new
    }

    /// Entries at global ranks `[start, end]` inclusive, ascending.
    pub fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry> {
        let mut out = Vec::new();
        if start == 0 || end < start {
            return out;
        }
        let mut key = self.shards.len() - 1;
        let mut guard = self.shards[key].read();
        loop {
            let prefix = guard.prefix_rank;
            if prefix >= end {
                break;
            }
            let size = guard.tree.len() as u32;
            if size > 0 && prefix + size >= start {
                let lo = start.saturating_sub(prefix).max(1);
                let hi = (end - prefix).min(size);
                for (i, e) in guard.tree.range_by_rank(lo, hi).enumerate() {
                    out.push(RankedEntry {
                        customer_id: e.customer_id,
                        score: e.score,
                        rank: prefix + lo + i as u32,
                    });
                }
            }
            if key == 1 {
                break;
            }
            let next = self.shards[key - 1].read();
            guard = next;
            key -= 1;
        }
        out
    }

    /// Entries at ranks `[max(1, R - high), R + low]` where `R` is the
    /// customer's global rank. Empty when the customer is unknown or its
    /// score is non-positive.
    ///
    /// A single hand-over-hand descent both locates the customer and emits
    /// the window: bands above the customer's feed a bounded look-back
    /// buffer holding the `high` entries most recently passed, so the
    /// upper half of the window is already in hand once the customer's
    /// band pins down `R`.
    pub fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry> {
        loop {
            let score = match self.scores.get(&customer_id) {
                Some(v) => *v,
                None => return Vec::new(),
            };
            if score <= 0 {
                return Vec::new();
            }
            let key = self.bands.key_of(score);
            let target = Entry::new(score, customer_id);

            let mut above: VecDeque<Entry> = VecDeque::new();
            let mut k = if high == 0 { key } else { self.shards.len() - 1 };
            let mut guard = self.shards[k].read();
            while k > key {
                let size = guard.tree.len() as u32;
                if size > 0 {
                    let take = high.min(size);
                    for e in guard.tree.range_by_rank(size - take + 1, size) {
                        if above.len() as u32 == high {
                            above.pop_front();
                        }
                        above.push_back(e);
                    }
                }
                let next = self.shards[k - 1].read();
                guard = next;
                k -= 1;
            }

            let in_rank = match guard.tree.rank_of(target) {
                Some(r) => r,
                None => {
                    // Either the score moved under us (retry with the fresh
                    // value) or an update that already bumped the score map
                    // has not reached the tree yet; its effects are not
                    // observable here, so the customer is not ranked.
                    drop(guard);
                    if self.scores.get(&customer_id).map(|v| *v) == Some(score) {
                        return Vec::new();
                    }
                    continue;
                }
            };
            let prefix = guard.prefix_rank;
            let rank = prefix + in_rank;
            let lo = rank.saturating_sub(high).max(1);
            let hi = rank.saturating_add(low);
            let mut out = Vec::new();

            if lo <= prefix {
                let need = (prefix - lo + 1) as usize;
                debug_assert!(need <= above.len(), "look-back buffer underrun");
                let skip = above.len() - need;
                for (i, e) in above.iter().skip(skip).enumerate() {
                    out.push(RankedEntry {
                        customer_id: e.customer_id,
                        score: e.score,
                        rank: lo + i as u32,
                    });
                }
            }

            let size = guard.tree.len() as u32;
            let in_lo = lo.saturating_sub(prefix).max(1);
            let in_hi = (hi - prefix).min(size);
            for (i, e) in guard.tree.range_by_rank(in_lo, in_hi).enumerate() {
                out.push(RankedEntry {
                    customer_id: e.customer_id,
                    score: e.score,
                    rank: prefix + in_lo + i as u32,
                });
            }

            let mut covered = prefix + size;
            while hi > covered && k > 1 {
                let next = self.shards[k - 1].read();
                guard = next;
                k -= 1;
                let prefix = guard.prefix_rank;
                debug_assert_eq!(prefix, covered, "prefix rank out of step with walk");
                let size = guard.tree.len() as u32;
                if size > 0 {
                    let band_hi = (hi - prefix).min(size);
                    for (i, e) in guard.tree.range_by_rank(1, band_hi).enumerate() {
                        out.push(RankedEntry {
                            customer_id: e.customer_id,
                            score: e.score,
                            rank: prefix + 1 + i as u32,
                        });
                    }
                }
                covered = prefix + size;
            }
            return out;
        }
    }

    /// Accumulated score for a customer, ranked or not.
    pub fn score(&self, customer_id: i64) -> Option<i64> {
        self.scores.get(&customer_id).map(|v| *v)
    }

    /// The customer's 1-based global rank, if ranked.
    pub fn rank(&self, customer_id: i64) -> Option<u32> {
        self.ranks_by_customer(customer_id, 0, 0)
            .first()
            .map(|e| e.rank)
    }

    /// Number of customers with a positive accumulated score.
    pub fn total_ranked(&self) -> u32 {
        // The sentinel band sits below every ranked entry, so its prefix
        // rank is the whole ranked population.
        self.shards[0].read().prefix_rank
    }

    /// Number of tracked customers, ranked or not.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl Default for BucketedIndex {
    fn default() -> Self {
        Self::new()
    }
}
