#![deny(clippy::uninlined_format_args, clippy::to_string_in_format_args)]

//! Real-time leaderboard index over an open set of customers.
//!
//! Customers accumulate signed score deltas; every customer with a positive
//! total occupies one slot in a global ranking ordered by descending score,
//! ties broken by ascending customer id. The crate offers two index flavors
//! behind the same [`Leaderboard`] trait:
//!
//! - [`BucketedIndex`]: score-banded shards, each an order-statistic skip
//!   list under its own reader-writer lock. Updates are visible before the
//!   call returns; range reads walk the bands under hand-over-hand read
//!   locking.
//! - [`SnapshotIndex`]: buffers deltas and folds them into a coarser
//!   banded snapshot on a background tick; reads are eventually consistent
//!   but writers never touch a tree lock.

pub use crate::{
    bands::Bands,
    entry::Entry,
    index::BucketedIndex,
    ranklist::RankList,
    service::{Engine, Leaderboard, RankedEntry, MAX_DELTA},
    snapshot::SnapshotIndex,
};

mod band;
mod bands;
mod entry;
mod index;
mod ranklist;
mod service;
mod snapshot;
