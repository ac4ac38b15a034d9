//! Page pruner: drops redirect markers that resolved to nothing.
//!
//! A page flagged as a redirect whose id never made it into the resolved
//! redirect set points nowhere (broken target, cycle, over-long chain). Such
//! a page must not exist in the final graph, so it is removed here before
//! links are joined.

use crate::config::{PROGRESS_INTERVAL, RECORD_EXTENSION};
use crate::models::{PageRecord, ResolvedRedirect};
use crate::stats::PruneStats;
use crate::tsv;
use anyhow::Result;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Loads the set of redirect source ids that resolved successfully.
fn load_resolved_sources(path: &Path, stats: &PruneStats) -> Result<FxHashSet<u64>> {
    tsv::check_extension(path, RECORD_EXTENSION)?;
    let mut reader = tsv::open_tsv(path)?;
    let mut sources = FxHashSet::default();

    for (line_no, result) in reader.records().enumerate() {
        let Some(record) = tsv::row_or_skip(result)? else {
            stats.inc_malformed();
            continue;
        };
        match ResolvedRedirect::decode(&record) {
            Some(redirect) => {
                sources.insert(redirect.source_page_id);
            }
            None => {
                debug!(line = line_no + 1, raw = ?record, "Skipping malformed redirect row");
                stats.inc_malformed();
            }
        }
    }
    Ok(sources)
}

/// Streams the page set, keeping a page iff it is not a redirect or its
/// redirect resolved. Output rows are written exactly as read.
pub fn prune_pages<W: Write>(
    pages_path: &Path,
    resolved_path: &Path,
    out: W,
) -> Result<PruneStats> {
    tsv::check_extension(pages_path, RECORD_EXTENSION)?;

    let stats = PruneStats::new();
    let resolved = load_resolved_sources(resolved_path, &stats)?;
    info!(resolved = resolved.len(), "Resolved redirect sources loaded");

    let mut reader = tsv::open_tsv(pages_path)?;
    let mut writer = tsv::tsv_writer(out);
    let pb = ProgressBar::new_spinner();

    for (line_no, result) in reader.records().enumerate() {
        let Some(record) = tsv::row_or_skip(result)? else {
            stats.inc_malformed();
            continue;
        };
        let Some(page) = PageRecord::decode(&record) else {
            debug!(line = line_no + 1, raw = ?record, "Skipping malformed page row");
            stats.inc_malformed();
            continue;
        };

        if !page.is_redirect || resolved.contains(&page.page_id) {
            writer.write_record(&record)?;
            stats.inc_kept();
        } else {
            stats.inc_dropped();
        }
        if (line_no as u64) % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    }

    writer.flush()?;
    pb.finish_and_clear();
    info!(
        kept = stats.kept_count(),
        dropped = stats.dropped_count(),
        malformed = stats.malformed_count(),
        "Pages pruned"
    );
    Ok(stats)
}
