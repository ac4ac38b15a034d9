//! Link aggregator: merges grouped outgoing and incoming edge streams into
//! one summary row per page.
//!
//! Each input is TSV of `page_id \t id|id|...`, grouped one row per key and
//! sorted ascending by key (the caller produces them by sorting the edge
//! relation once by source and once by destination). A two-pointer merge
//! walks both streams and emits the union of keys: a page present on only
//! one side still gets a row, with the absent side empty and counted zero.

use crate::config::{LIST_DELIMITER, PROGRESS_INTERVAL, RECORD_EXTENSION};
use crate::models::PageLinkSummary;
use crate::stats::CombineStats;
use crate::tsv;
use anyhow::{bail, Result};
use indicatif::ProgressBar;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// One grouped row: a key and its serialized id list, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupedRow {
    key: u64,
    ids: Vec<u64>,
}

/// Decodes `key \t id|id|...`. An empty list field is a valid empty list; a
/// missing field or unparsable entry is malformed.
fn decode_grouped(record: &csv::StringRecord) -> Option<GroupedRow> {
    if record.len() != 2 {
        return None;
    }
    let key = record[0].parse().ok()?;
    let list = &record[1];
    let ids = if list.is_empty() {
        Vec::new()
    } else {
        list.split(LIST_DELIMITER)
            .map(|part| part.parse().ok())
            .collect::<Option<Vec<u64>>>()?
    };
    Some(GroupedRow { key, ids })
}

/// Pull-based reader over one grouped stream, skipping malformed rows and
/// enforcing strictly ascending keys.
struct GroupedStream<'a, R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    stats: &'a CombineStats,
    last_key: Option<u64>,
    side: &'static str,
}

impl<'a, R: Read> GroupedStream<'a, R> {
    fn new(reader: csv::Reader<R>, stats: &'a CombineStats, side: &'static str) -> Self {
        Self {
            records: reader.into_records(),
            stats,
            last_key: None,
            side,
        }
    }

    fn next_row(&mut self) -> Result<Option<GroupedRow>> {
        loop {
            let Some(result) = self.records.next() else {
                return Ok(None);
            };
            let Some(record) = tsv::row_or_skip(result)? else {
                self.stats.inc_malformed();
                continue;
            };
            let Some(row) = decode_grouped(&record) else {
                debug!(side = self.side, raw = ?record, "Skipping malformed grouped row");
                self.stats.inc_malformed();
                continue;
            };
            if let Some(last) = self.last_key {
                if row.key <= last {
                    bail!(
                        "{} stream is not sorted: key {} after {}",
                        self.side,
                        row.key,
                        last
                    );
                }
            }
            self.last_key = Some(row.key);
            return Ok(Some(row));
        }
    }
}

fn encode_list(ids: &[u64]) -> String {
    let mut buf = itoa::Buffer::new();
    let mut encoded = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            encoded.push(LIST_DELIMITER);
        }
        encoded.push_str(buf.format(*id));
    }
    encoded
}

fn write_summary<W: Write>(writer: &mut csv::Writer<W>, summary: &PageLinkSummary) -> Result<()> {
    let mut id_buf = itoa::Buffer::new();
    let mut out_buf = itoa::Buffer::new();
    let mut in_buf = itoa::Buffer::new();
    let outgoing = encode_list(&summary.outgoing_ids);
    let incoming = encode_list(&summary.incoming_ids);
    writer.write_record([
        id_buf.format(summary.page_id),
        out_buf.format(summary.outgoing_count),
        in_buf.format(summary.incoming_count),
        outgoing.as_str(),
        incoming.as_str(),
    ])?;
    Ok(())
}

fn summary(page_id: u64, outgoing_ids: Vec<u64>, incoming_ids: Vec<u64>) -> PageLinkSummary {
    PageLinkSummary {
        page_id,
        outgoing_count: outgoing_ids.len() as u32,
        incoming_count: incoming_ids.len() as u32,
        outgoing_ids,
        incoming_ids,
    }
}

/// Merges the two grouped streams into summary rows on `out`.
pub fn combine_streams<R1: Read, R2: Read, W: Write>(
    outgoing: csv::Reader<R1>,
    incoming: csv::Reader<R2>,
    out: W,
) -> Result<CombineStats> {
    let stats = CombineStats::new();
    let mut writer = tsv::tsv_writer(out);
    let pb = ProgressBar::new_spinner();

    let mut out_stream = GroupedStream::new(outgoing, &stats, "outgoing");
    let mut in_stream = GroupedStream::new(incoming, &stats, "incoming");
    let mut next_out = out_stream.next_row()?;
    let mut next_in = in_stream.next_row()?;

    enum Pick {
        Both,
        OutgoingOnly,
        IncomingOnly,
    }

    loop {
        let pick = match (&next_out, &next_in) {
            (Some(o), Some(i)) if o.key == i.key => Pick::Both,
            (Some(o), Some(i)) if o.key < i.key => Pick::OutgoingOnly,
            (Some(_), Some(_)) => Pick::IncomingOnly,
            (Some(_), None) => Pick::OutgoingOnly,
            (None, Some(_)) => Pick::IncomingOnly,
            (None, None) => break,
        };

        let row = match pick {
            Pick::Both => {
                let o = next_out.take().unwrap();
                let i = next_in.take().unwrap();
                next_out = out_stream.next_row()?;
                next_in = in_stream.next_row()?;
                summary(o.key, o.ids, i.ids)
            }
            Pick::OutgoingOnly => {
                let o = next_out.take().unwrap();
                next_out = out_stream.next_row()?;
                stats.inc_outgoing_only();
                summary(o.key, o.ids, Vec::new())
            }
            Pick::IncomingOnly => {
                let i = next_in.take().unwrap();
                next_in = in_stream.next_row()?;
                stats.inc_incoming_only();
                summary(i.key, Vec::new(), i.ids)
            }
        };

        write_summary(&mut writer, &row)?;
        stats.inc_pages();
        if stats.pages() % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    }

    writer.flush()?;
    pb.finish_and_clear();
    info!(
        pages = stats.pages(),
        outgoing_only = stats.outgoing_only_count(),
        incoming_only = stats.incoming_only_count(),
        malformed = stats.malformed_count(),
        "Link streams combined"
    );
    Ok(stats)
}

/// File-level entry point: opens both compressed grouped streams and merges
/// them onto `out`.
pub fn combine_links<W: Write>(
    outgoing_path: &Path,
    incoming_path: &Path,
    out: W,
) -> Result<CombineStats> {
    tsv::check_extension(outgoing_path, RECORD_EXTENSION)?;
    tsv::check_extension(incoming_path, RECORD_EXTENSION)?;
    let outgoing = tsv::open_tsv(outgoing_path)?;
    let incoming = tsv::open_tsv(incoming_path)?;
    combine_streams(outgoing, incoming, out)
}
