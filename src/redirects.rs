//! Redirect resolver: collapses the dump's redirect indirection layer.
//!
//! Raw redirects arrive as `source page id -> target title`. Resolution joins
//! the title against the page set, then follows transitive chains (a redirect
//! whose target is itself a redirect) to the terminal non-redirect page.
//! Broken redirects, cycles, and chains past the hop bound resolve to nothing
//! and are dropped silently; dead links are an expected condition in dump
//! data, not an error.

use crate::config::{PROGRESS_INTERVAL, RECORD_EXTENSION, REDIRECT_MAX_HOPS};
use crate::models::{PageRecord, RawRedirectRecord};
use crate::stats::ResolveStats;
use crate::tsv;
use anyhow::Result;
use indicatif::ProgressBar;
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Existence and title lookups over the full page set.
///
/// Shared with the in-memory join strategy, which needs exactly the same two
/// indices. Duplicate titles are last-write-wins, matching dump row order.
#[derive(Default)]
pub struct PageIndex {
    ids: FxHashSet<u64>,
    by_title: FxHashMap<i32, FxHashMap<String, u64>>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: PageRecord) {
        self.ids.insert(page.page_id);
        self.by_title
            .entry(page.namespace)
            .or_default()
            .insert(page.title, page.page_id);
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn resolve_title(&self, namespace: i32, title: &str) -> Option<u64> {
        self.by_title.get(&namespace)?.get(title).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Builds the index from an extracted pages file.
    ///
    /// Returns the index and the number of malformed rows skipped.
    pub fn load(path: &Path) -> Result<(Self, u64)> {
        tsv::check_extension(path, RECORD_EXTENSION)?;
        let mut reader = tsv::open_tsv(path)?;
        let mut index = Self::new();
        let mut malformed = 0u64;
        let pb = ProgressBar::new_spinner();

        for (line_no, result) in reader.records().enumerate() {
            let Some(record) = tsv::row_or_skip(result)? else {
                malformed += 1;
                continue;
            };
            match PageRecord::decode(&record) {
                Some(page) => index.insert(page),
                None => {
                    debug!(line = line_no + 1, raw = ?record, "Skipping malformed page row");
                    malformed += 1;
                }
            }
            if (line_no as u64) % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
        }

        pb.finish_and_clear();
        info!(pages = index.len(), malformed, path = ?path, "Page index built");
        Ok((index, malformed))
    }
}

/// Follows a candidate's chain to its terminal target.
///
/// `candidates` maps every resolvable redirect source to its direct target id.
/// Returns `None` when the chain revisits an id or needs more than
/// [`REDIRECT_MAX_HOPS`] substitutions; such a redirect resolves to nothing.
fn collapse_chain(candidates: &FxHashMap<u64, u64>, source: u64, target: u64) -> Option<u64> {
    let mut current = target;
    let mut hops = 0u32;
    let mut seen = FxHashSet::default();
    seen.insert(source);
    seen.insert(current);

    while let Some(&next) = candidates.get(&current) {
        hops += 1;
        if hops > REDIRECT_MAX_HOPS || !seen.insert(next) {
            return None;
        }
        current = next;
    }
    Some(current)
}

/// Resolves raw redirects against the page set and writes
/// `source_id \t target_id` rows in first-seen source order.
pub fn resolve_redirects<W: Write>(
    pages_path: &Path,
    redirects_path: &Path,
    out: W,
) -> Result<ResolveStats> {
    tsv::check_extension(redirects_path, RECORD_EXTENSION)?;

    let stats = ResolveStats::new();
    let (index, page_malformed) = PageIndex::load(pages_path)?;
    stats.add_malformed(page_malformed);

    // First pass over the redirect rows: keep only candidates whose source
    // exists and whose target title resolves. Duplicate sources are
    // last-write-wins, like the title index.
    let mut candidates: FxHashMap<u64, u64> = FxHashMap::default();
    let mut order: Vec<u64> = Vec::new();
    let mut reader = tsv::open_tsv(redirects_path)?;
    let pb = ProgressBar::new_spinner();

    for (line_no, result) in reader.records().enumerate() {
        let Some(record) = tsv::row_or_skip(result)? else {
            stats.inc_malformed();
            continue;
        };
        let Some(redirect) = RawRedirectRecord::decode(&record) else {
            debug!(line = line_no + 1, raw = ?record, "Skipping malformed redirect row");
            stats.inc_malformed();
            continue;
        };

        if !index.contains_id(redirect.source_page_id) {
            stats.inc_missing_source();
            continue;
        }
        let Some(target_id) = index.resolve_title(redirect.namespace, &redirect.target_title)
        else {
            stats.inc_unresolved_title();
            continue;
        };

        if candidates
            .insert(redirect.source_page_id, target_id)
            .is_none()
        {
            order.push(redirect.source_page_id);
        }
        if (line_no as u64) % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    }
    pb.finish_and_clear();

    // Second pass: collapse chains and emit survivors.
    let mut writer = tsv::tsv_writer(out);
    let mut src_buf = itoa::Buffer::new();
    let mut tgt_buf = itoa::Buffer::new();

    for &source in &order {
        let target = candidates[&source];
        match collapse_chain(&candidates, source, target) {
            Some(final_target) => {
                writer.write_record([src_buf.format(source), tgt_buf.format(final_target)])?;
                stats.inc_resolved();
            }
            None => {
                debug!(source, "Dropping cyclic or over-long redirect chain");
                stats.inc_broken_chain();
            }
        }
    }
    writer.flush()?;

    info!(
        resolved = stats.resolved_count(),
        missing_source = stats.missing_source_count(),
        unresolved_title = stats.unresolved_title_count(),
        broken_chains = stats.broken_chain_count(),
        malformed = stats.malformed_count(),
        "Redirects resolved"
    );
    Ok(stats)
}
