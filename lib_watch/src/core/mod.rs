//! # Core Engine Module
//!
//! The tracking engine: the state each collection keeps about its questions
//! and the machinery that keeps that state fresh.
//!
//! ## Core Components:
//!
//! - **`watch_set`**: bounded, insertion-ordered id set with "new" markers.
//!   Eviction always drops the oldest member first.
//!
//! - **`recent`**: `RecentQuestions`, which reconciles the watch set from push
//!   announcements, periodic tag listings and by-id validation.
//!
//! - **`bounty`**: `BountyQuestions`, the featured listing filtered to the
//!   watched tags.
//!
//! - **`scheduler`**: `Poller` and `Scheduled`. One refresh gate per poller,
//!   a periodic tick that skips when busy, and a snapshot channel.
//!
//! - **`tag_cache`**: `TagExcerptCache`, tag wiki excerpts with an
//!   access-based expiry.
//!
//! - **`notify`**: the `Notifier` seam for new-question alerts.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Featured-question poller.
pub mod bounty;
/// New-question alert sink.
pub mod notify;
/// Watch-set reconciliation engine.
pub mod recent;
/// Poller variants and the refresh scheduler.
pub mod scheduler;
/// Site identity shared by the pollers.
pub mod site;
/// Tag wiki excerpt cache.
pub mod tag_cache;
/// Bounded id set with new markers.
pub mod watch_set;

#[cfg(test)]
pub(crate) mod testing;

// --- Public API Re-exports ---
pub use bounty::BountyQuestions;
pub use notify::{LogNotifier, Notifier};
pub use recent::{RecentQuestions, RecentSettings};
pub use scheduler::{Poller, Scheduled, TickOutcome};
pub use site::SiteRef;
pub use tag_cache::TagExcerptCache;
pub use watch_set::WatchSet;
