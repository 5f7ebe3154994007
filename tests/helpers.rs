use rankset::{Entry, RankedEntry};
use std::collections::{BTreeSet, HashMap};

/// Sequential reference leaderboard used to cross-check the concurrent
/// indexes: a plain ordered set plus a score map.
#[derive(Default)]
pub struct ModelBoard {
    scores: HashMap<i64, i64>,
    ranked: BTreeSet<Entry>,
}

#[allow(dead_code)]
impl ModelBoard {
    pub fn update(&mut self, customer_id: i64, delta: i64) -> i64 {
        let slot = self.scores.entry(customer_id).or_insert(0);
        let old = *slot;
        *slot += delta;
        let new = *slot;
        if old > 0 {
            self.ranked.remove(&Entry::new(old, customer_id));
        }
        if new > 0 {
            self.ranked.insert(Entry::new(new, customer_id));
        }
        new
    }

    pub fn score(&self, customer_id: i64) -> Option<i64> {
        self.scores.get(&customer_id).copied()
    }

    pub fn rank(&self, customer_id: i64) -> Option<u32> {
        let score = self.score(customer_id)?;
        if score <= 0 {
            return None;
        }
        self.ranked
            .iter()
            .position(|e| e.customer_id == customer_id)
            .map(|pos| pos as u32 + 1)
    }

    pub fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry> {
        if start == 0 || end < start {
            return Vec::new();
        }
        self.ranked
            .iter()
            .enumerate()
            .skip(start as usize - 1)
            .take((end - start + 1) as usize)
            .map(|(pos, e)| RankedEntry {
                customer_id: e.customer_id,
                score: e.score,
                rank: pos as u32 + 1,
            })
            .collect()
    }

    pub fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry> {
        match self.rank(customer_id) {
            Some(rank) => {
                self.ranks_by_range(rank.saturating_sub(high).max(1), rank.saturating_add(low))
            }
            None => Vec::new(),
        }
    }

    pub fn total_ranked(&self) -> u32 {
        self.ranked.len() as u32
    }
}
