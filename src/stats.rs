//! Thread-safe counters reported on the diagnostic stream at stage completion.
//!
//! Counters are atomic because the in-memory join strategy fans row resolution
//! out across rayon workers; the other stages simply use them single-threaded.

use crate::models::SkipReason;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected by the dump extractor
#[derive(Default)]
pub struct ExtractStats {
    pub statements_seen: AtomicU64,
    pub tuples_accepted: AtomicU64,
    pub tuples_skipped: AtomicU64,
}

impl ExtractStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_statements(&self) {
        self.statements_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_accepted(&self) {
        self.tuples_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.tuples_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statements(&self) -> u64 {
        self.statements_seen.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.tuples_accepted.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.tuples_skipped.load(Ordering::Relaxed)
    }
}

/// Statistics collected by the redirect resolver
#[derive(Default)]
pub struct ResolveStats {
    pub resolved: AtomicU64,
    pub missing_source: AtomicU64,
    pub unresolved_title: AtomicU64,
    pub broken_chains: AtomicU64,
    pub malformed_lines: AtomicU64,
}

impl ResolveStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_missing_source(&self) {
        self.missing_source.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unresolved_title(&self) {
        self.unresolved_title.fetch_add(1, Ordering::Relaxed);
    }

    /// A chain dropped for exceeding the hop bound or looping back on itself
    pub fn inc_broken_chain(&self) {
        self.broken_chains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_malformed(&self, count: u64) {
        self.malformed_lines.fetch_add(count, Ordering::Relaxed);
    }

    pub fn resolved_count(&self) -> u64 {
        self.resolved.load(Ordering::Relaxed)
    }

    pub fn missing_source_count(&self) -> u64 {
        self.missing_source.load(Ordering::Relaxed)
    }

    pub fn unresolved_title_count(&self) -> u64 {
        self.unresolved_title.load(Ordering::Relaxed)
    }

    pub fn broken_chain_count(&self) -> u64 {
        self.broken_chains.load(Ordering::Relaxed)
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }
}

/// Statistics collected by the page pruner
#[derive(Default)]
pub struct PruneStats {
    pub kept: AtomicU64,
    pub dropped_orphans: AtomicU64,
    pub malformed_lines: AtomicU64,
}

impl PruneStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_kept(&self) {
        self.kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped_orphans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn kept_count(&self) -> u64 {
        self.kept.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_orphans.load(Ordering::Relaxed)
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }
}

/// Statistics collected by either join strategy.
///
/// Skips are keyed by [`SkipReason`] so the two strategies can be compared
/// reason-for-reason in conformance tests.
#[derive(Default)]
pub struct JoinStats {
    pub edges_emitted: AtomicU64,
    pub malformed_lines: AtomicU64,
    pub missing_source: AtomicU64,
    pub unknown_link_target: AtomicU64,
    pub unresolved_title: AtomicU64,
}

impl JoinStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_edges(&self) {
        self.edges_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_malformed(&self, count: u64) {
        self.malformed_lines.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_skip(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::MalformedLine => &self.malformed_lines,
            SkipReason::MissingSource => &self.missing_source,
            SkipReason::UnknownLinkTarget => &self.unknown_link_target,
            SkipReason::UnresolvedTitle => &self.unresolved_title,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edges(&self) -> u64 {
        self.edges_emitted.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }

    pub fn missing_source_count(&self) -> u64 {
        self.missing_source.load(Ordering::Relaxed)
    }

    pub fn unknown_link_target_count(&self) -> u64 {
        self.unknown_link_target.load(Ordering::Relaxed)
    }

    pub fn unresolved_title_count(&self) -> u64 {
        self.unresolved_title.load(Ordering::Relaxed)
    }

    /// Skip counts in a fixed order, for cross-strategy comparison
    pub fn skip_counts(&self) -> [u64; 4] {
        [
            self.malformed(),
            self.missing_source_count(),
            self.unknown_link_target_count(),
            self.unresolved_title_count(),
        ]
    }
}

/// Statistics collected by the link aggregator
#[derive(Default)]
pub struct CombineStats {
    pub pages_emitted: AtomicU64,
    pub outgoing_only: AtomicU64,
    pub incoming_only: AtomicU64,
    pub malformed_lines: AtomicU64,
}

impl CombineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&self) {
        self.pages_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_outgoing_only(&self) {
        self.outgoing_only.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_incoming_only(&self) {
        self.incoming_only.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_emitted.load(Ordering::Relaxed)
    }

    pub fn outgoing_only_count(&self) -> u64 {
        self.outgoing_only.load(Ordering::Relaxed)
    }

    pub fn incoming_only_count(&self) -> u64 {
        self.incoming_only.load(Ordering::Relaxed)
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }
}
