//! Link join engine: resolves raw (source page, link target) pairs into
//! page-id edges.
//!
//! Each raw link row is resolved in two dependent steps:
//! `target_lt_id -> (namespace, title) -> destination page id`, with the
//! source id checked for existence first. Two strategies implement the same
//! contract and must produce the identical edge multiset:
//!
//! - [`MemoryJoin`] holds both lookup relations in hash maps and fans the raw
//!   link stream across rayon workers in ordered batches.
//! - [`IndexedJoin`] materializes both relations into a [`RelationStore`] and
//!   streams the raw links through indexed point lookups, reusing cached
//!   relations across runs.
//!
//! Note that resolution runs against the pruned page table directly, not
//! through resolved redirects: a link *to* a page that is itself a valid
//! redirect yields the redirect page's own id, not its final destination.
//! Downstream consumers resolve that last step themselves.

use crate::config::{JOIN_BATCH_SIZE, PROGRESS_INTERVAL, RECORD_EXTENSION};
use crate::models::{Edge, LinkTargetRecord, RawLinkRecord, SkipReason};
use crate::redirects::PageIndex;
use crate::stats::JoinStats;
use crate::store::{CancelGuard, RelationStore};
use crate::tsv;
use anyhow::Result;
use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The three relations every strategy consumes.
pub struct JoinInputs {
    pub pages: PathBuf,
    pub link_targets: PathBuf,
    pub links: PathBuf,
}

/// One join contract, two resource profiles.
pub trait JoinStrategy {
    fn name(&self) -> &'static str;

    /// Streams raw links, writing `src_id \t tgt_id` rows for every resolved
    /// link and counting every skip by reason. Row-level problems never abort.
    fn run(&mut self, inputs: &JoinInputs, out: &mut dyn Write, stats: &JoinStats) -> Result<()>;
}

/// Resolution order is part of the contract: malformed, then missing source,
/// then unknown link target, then unresolved title. Both strategies classify
/// a skipped row identically so their counters can be compared.
struct LinkResolver {
    index: PageIndex,
    link_targets: FxHashMap<u64, (i32, String)>,
}

impl LinkResolver {
    fn resolve(&self, record: &csv::StringRecord) -> Result<Edge, SkipReason> {
        let link = RawLinkRecord::decode(record).ok_or(SkipReason::MalformedLine)?;
        if !self.index.contains_id(link.source_page_id) {
            return Err(SkipReason::MissingSource);
        }
        let (namespace, title) = self
            .link_targets
            .get(&link.target_lt_id)
            .ok_or(SkipReason::UnknownLinkTarget)?;
        let tgt_id = self
            .index
            .resolve_title(*namespace, title)
            .ok_or(SkipReason::UnresolvedTitle)?;
        Ok(Edge {
            src_id: link.source_page_id,
            tgt_id,
        })
    }
}

fn load_link_targets(path: &Path, stats: &JoinStats) -> Result<FxHashMap<u64, (i32, String)>> {
    tsv::check_extension(path, RECORD_EXTENSION)?;
    let mut reader = tsv::open_tsv(path)?;
    let mut map = FxHashMap::default();

    for (line_no, result) in reader.records().enumerate() {
        let Some(record) = tsv::row_or_skip(result)? else {
            stats.record_skip(SkipReason::MalformedLine);
            continue;
        };
        match LinkTargetRecord::decode(&record) {
            Some(lt) => {
                map.insert(lt.lt_id, (lt.namespace, lt.title));
            }
            None => {
                debug!(line = line_no + 1, raw = ?record, "Skipping malformed linktarget row");
                stats.record_skip(SkipReason::MalformedLine);
            }
        }
    }
    info!(link_targets = map.len(), "Link-target map built");
    Ok(map)
}

/// Pure in-memory hash join.
#[derive(Default)]
pub struct MemoryJoin;

impl MemoryJoin {
    pub fn new() -> Self {
        Self
    }
}

impl JoinStrategy for MemoryJoin {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn run(&mut self, inputs: &JoinInputs, out: &mut dyn Write, stats: &JoinStats) -> Result<()> {
        tsv::check_extension(&inputs.links, RECORD_EXTENSION)?;

        let (index, page_malformed) = PageIndex::load(&inputs.pages)?;
        stats.add_malformed(page_malformed);
        let link_targets = load_link_targets(&inputs.link_targets, stats)?;
        let resolver = LinkResolver {
            index,
            link_targets,
        };

        let mut reader = tsv::open_tsv(&inputs.links)?;
        let mut writer = tsv::tsv_writer(out);
        let pb = ProgressBar::new_spinner();
        let mut records = reader.records();
        let mut batch: Vec<csv::StringRecord> = Vec::with_capacity(JOIN_BATCH_SIZE);
        let mut src_buf = itoa::Buffer::new();
        let mut tgt_buf = itoa::Buffer::new();

        loop {
            batch.clear();
            while batch.len() < JOIN_BATCH_SIZE {
                match records.next() {
                    Some(result) => match tsv::row_or_skip(result)? {
                        Some(record) => batch.push(record),
                        None => stats.record_skip(SkipReason::MalformedLine),
                    },
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }

            // Workers only read the shared indices; per-batch results come
            // back in input order so parallelism never changes the output.
            let resolved: Vec<Option<Edge>> = batch
                .par_iter()
                .map(|record| match resolver.resolve(record) {
                    Ok(edge) => Some(edge),
                    Err(reason) => {
                        stats.record_skip(reason);
                        None
                    }
                })
                .collect();

            for edge in resolved.into_iter().flatten() {
                writer.write_record([src_buf.format(edge.src_id), tgt_buf.format(edge.tgt_id)])?;
                stats.inc_edges();
            }

            pb.tick();
        }

        writer.flush()?;
        pb.finish_and_clear();
        log_summary(self.name(), stats);
        Ok(())
    }
}

/// Streaming join against the SQLite relation store.
pub struct IndexedJoin {
    store: RelationStore,
}

impl IndexedJoin {
    pub fn new(store: RelationStore) -> Self {
        Self { store }
    }
}

impl JoinStrategy for IndexedJoin {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn run(&mut self, inputs: &JoinInputs, out: &mut dyn Write, stats: &JoinStats) -> Result<()> {
        tsv::check_extension(&inputs.links, RECORD_EXTENSION)?;

        // Any early return past this point interrupts in-flight store work.
        let guard = CancelGuard::new(self.store.interrupt_handle());

        let pages = self.store.ensure_pages(&inputs.pages)?;
        stats.add_malformed(pages.malformed);
        let link_targets = self.store.ensure_link_targets(&inputs.link_targets)?;
        stats.add_malformed(link_targets.malformed);

        let mut reader = tsv::open_tsv(&inputs.links)?;
        let mut writer = tsv::tsv_writer(out);
        let pb = ProgressBar::new_spinner();
        let mut src_buf = itoa::Buffer::new();
        let mut tgt_buf = itoa::Buffer::new();

        for (line_no, result) in reader.records().enumerate() {
            let Some(record) = tsv::row_or_skip(result)? else {
                stats.record_skip(SkipReason::MalformedLine);
                continue;
            };
            let Some(link) = RawLinkRecord::decode(&record) else {
                stats.record_skip(SkipReason::MalformedLine);
                continue;
            };

            if !self.store.page_exists(link.source_page_id)? {
                stats.record_skip(SkipReason::MissingSource);
                continue;
            }
            let Some((namespace, title)) = self.store.link_target(link.target_lt_id)? else {
                stats.record_skip(SkipReason::UnknownLinkTarget);
                continue;
            };
            let Some(tgt_id) = self.store.title_to_page(namespace, &title)? else {
                stats.record_skip(SkipReason::UnresolvedTitle);
                continue;
            };

            writer.write_record([
                src_buf.format(link.source_page_id),
                tgt_buf.format(tgt_id),
            ])?;
            stats.inc_edges();

            if (line_no as u64) % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
        }

        writer.flush()?;
        pb.finish_and_clear();
        guard.disarm();
        log_summary(self.name(), stats);
        Ok(())
    }
}

fn log_summary(strategy: &str, stats: &JoinStats) {
    info!(
        strategy,
        edges = stats.edges(),
        malformed = stats.malformed(),
        missing_source = stats.missing_source_count(),
        unknown_link_target = stats.unknown_link_target_count(),
        unresolved_title = stats.unresolved_title_count(),
        "Join finished"
    );
}
