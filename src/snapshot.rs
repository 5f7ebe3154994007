//! Eventually-consistent index variant that trades read freshness for
//! write throughput.
//!
//! Writes bump the realtime score map, enqueue the delta, and return; a
//! background worker wakes on a fixed tick, coalesces queued deltas per
//! customer, applies the net movement to a coarse score-banded structure
//! under one write lock, and rebuilds the prefix-sum read caches. Reads
//! served between ticks see the previous snapshot.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::BuildHasherDefault;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::entry::Entry;
use crate::service::RankedEntry;

/// Default rebuild cadence.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Width of the coarse snapshot bands. `div_euclid` keys round toward
/// negative infinity, so every score maps to exactly one band.
const COARSE_BAND: i64 = 100;

type ScoreMap = DashMap<i64, i64, BuildHasherDefault<FxHasher>>;

#[derive(Default)]
struct Committed {
    scores: FxHashMap<i64, i64>,
    bands: BTreeMap<i64, BTreeSet<Entry>>,
    /// `(starting 0-based rank, band key)` in descending score order.
    starts: Vec<(u32, i64)>,
    rank_by_customer: FxHashMap<i64, u32>,
}

struct Shared {
    scores: ScoreMap,
    deltas_tx: Sender<(i64, i64)>,
    deltas_rx: Receiver<(i64, i64)>,
    pending: AtomicUsize,
    committed: RwLock<Committed>,
}

pub struct SnapshotIndex {
    shared: Arc<Shared>,
    shutdown: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl SnapshotIndex {
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    pub fn with_tick(tick: Duration) -> Self {
        let (deltas_tx, deltas_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            scores: ScoreMap::with_hasher(Default::default()),
            deltas_tx,
            deltas_rx,
            pending: AtomicUsize::new(0),
            committed: RwLock::new(Committed::default()),
        });
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
        let worker = thread::Builder::new()
            .name("rankset-rebuild".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(&shared, tick, &shutdown_rx)
            })
            .expect("failed to spawn rebuild worker");
        Self {
            shared,
            shutdown,
            worker: Some(worker),
        }
    }

    /// Applies `delta` to the realtime total and returns the new value.
    /// The ranked view reflects the change after the next rebuild tick.
    pub fn update(&self, customer_id: i64, delta: i64) -> i64 {
        debug_assert!(customer_id > 0, "customer ids are positive");
        if delta == 0 {
            return self.shared.scores.get(&customer_id).map_or(0, |v| *v);
        }
        let new = {
            let mut slot = self.shared.scores.entry(customer_id).or_insert(0);
            *slot += delta;
            *slot
        };
        // Counted before it is queued, so the worker's decrement can never
        // outrun the increments.
        self.shared.pending.fetch_add(1, Ordering::Release);
        let _ = self.shared.deltas_tx.send((customer_id, delta));
        new
    }

    /// Entries at committed global ranks `[start, end]` inclusive.
    pub fn ranks_by_range(&self, start: u32, end: u32) -> Vec<RankedEntry> {
        if start == 0 || end < start {
            return Vec::new();
        }
        let committed = self.shared.committed.read();
        collect_range(&committed, start, end)
    }

    /// Window of entries around the customer's committed rank.
    pub fn ranks_by_customer(&self, customer_id: i64, high: u32, low: u32) -> Vec<RankedEntry> {
        let committed = self.shared.committed.read();
        let Some(&rank) = committed.rank_by_customer.get(&customer_id) else {
            return Vec::new();
        };
        collect_range(
            &committed,
            rank.saturating_sub(high).max(1),
            rank.saturating_add(low),
        )
    }

    /// Realtime accumulated score, including deltas not yet committed.
    pub fn score(&self, customer_id: i64) -> Option<i64> {
        self.shared.scores.get(&customer_id).map(|v| *v)
    }

    /// The customer's committed rank, if ranked as of the last rebuild.
    pub fn rank(&self, customer_id: i64) -> Option<u32> {
        self.shared
            .committed
            .read()
            .rank_by_customer
            .get(&customer_id)
            .copied()
    }

    /// Committed ranked population.
    pub fn total_ranked(&self) -> u32 {
        self.shared.committed.read().rank_by_customer.len() as u32
    }

    /// Number of tracked customers, ranked or not.
    pub fn len(&self) -> usize {
        self.shared.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.scores.is_empty()
    }

    /// Applies all queued deltas now, exactly as the next tick would.
    pub fn flush(&self) {
        rebuild(&self.shared);
    }
}

impl Default for SnapshotIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SnapshotIndex {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared, tick: Duration, shutdown: &Receiver<()>) {
    loop {
        match shutdown.recv_timeout(tick) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if shared.pending.load(Ordering::Acquire) == 0 {
            continue;
        }
        // The pending counter is only decremented by a completed rebuild,
        // so a panicked pass leaves the tick loop retrying.
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| rebuild(shared))) {
            log::error!("snapshot rebuild panicked, retrying next tick: {panic:?}");
        }
    }
}

fn rebuild(shared: &Shared) {
    let mut merged: FxHashMap<i64, i64> = FxHashMap::default();
    let mut drained = 0usize;
    for (customer_id, delta) in shared.deltas_rx.try_iter() {
        *merged.entry(customer_id).or_insert(0) += delta;
        drained += 1;
    }
    if drained == 0 {
        return;
    }
    let moved = merged.len();

    let mut committed = shared.committed.write();
    for (customer_id, net) in merged {
        if net == 0 {
            continue;
        }
        let old = committed.scores.get(&customer_id).copied().unwrap_or(0);
        let new = old + net;
        committed.scores.insert(customer_id, new);
        if old > 0 {
            let key = old.div_euclid(COARSE_BAND);
            let band = committed
                .bands
                .get_mut(&key)
                .expect("committed entry missing its band");
            let removed = band.remove(&Entry::new(old, customer_id));
            assert!(removed, "committed entry missing on rebuild");
            if band.is_empty() {
                committed.bands.remove(&key);
            }
        }
        if new > 0 {
            let key = new.div_euclid(COARSE_BAND);
            let inserted = committed
                .bands
                .entry(key)
                .or_default()
                .insert(Entry::new(new, customer_id));
            assert!(inserted, "duplicate committed entry on rebuild");
        }
    }

    let Committed {
        bands,
        starts,
        rank_by_customer,
        ..
    } = &mut *committed;
    starts.clear();
    rank_by_customer.clear();
    let mut running = 0u32;
    for (&key, band) in bands.iter().rev() {
        debug_assert!(key >= 0, "ranked snapshot band below zero");
        starts.push((running, key));
        for (i, e) in band.iter().enumerate() {
            rank_by_customer.insert(e.customer_id, running + i as u32 + 1);
        }
        running += band.len() as u32;
    }
    drop(committed);

    shared.pending.fetch_sub(drained, Ordering::Release);
    log::debug!("snapshot rebuild applied {drained} deltas to {moved} customers");
}

fn collect_range(committed: &Committed, start: u32, end: u32) -> Vec<RankedEntry> {
    let mut out = Vec::new();
    if committed.starts.is_empty() {
        return out;
    }
    // Last band whose starting rank lies below `start`.
    let idx = committed
        .starts
        .partition_point(|&(s, _)| s < start)
        .saturating_sub(1);
    'bands: for &(s, key) in &committed.starts[idx..] {
        if s >= end {
            break;
        }
        let band = committed
            .bands
            .get(&key)
            .expect("stale band in prefix cache");
        let skip = start.saturating_sub(s + 1) as usize;
        for (i, e) in band.iter().enumerate().skip(skip) {
            let rank = s + i as u32 + 1;
            if rank > end {
                break 'bands;
            }
            out.push(RankedEntry {
                customer_id: e.customer_id,
                score: e.score,
                rank,
            });
        }
    }
    out
}
