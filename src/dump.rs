//! Dump extractor: turns MediaWiki SQL bulk-insert dumps into TSV records.
//!
//! A dump file is a sequence of lines; the only lines that matter are
//! `INSERT INTO `table` VALUES (...),(...),...;` statements, one per line.
//! Everything else (schema DDL, comments, other tables) is ignored verbatim.
//!
//! Memory stays bounded by the longest single statement line: tuples are
//! scanned and emitted one at a time, never collected.

use crate::config::{DUMP_EXTENSION, PROGRESS_INTERVAL, WRITE_BUF_SIZE};
use crate::stats::ExtractStats;
use crate::tsv;
use anyhow::{Context, Result};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use indicatif::ProgressBar;
use memchr::{memchr, memchr2};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use tracing::info;

// Field patterns applied to a single value tuple. Namespace 0 is baked into
// each pattern: tuples from any other namespace simply fail to match and are
// skipped, which is how non-article pages are excluded.
static PAGE_TUPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+),0,'((?:[^'\\]|\\.)*)',([01]),").unwrap());

static LINK_TUPLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+),0,(\d+)$").unwrap());

static LINK_TARGET_TUPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+),0,'((?:[^'\\]|\\.)*)'$").unwrap());

static REDIRECT_TUPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+),0,'((?:[^'\\]|\\.)*)',").unwrap());

/// Which record kind to pull out of a dump file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    /// `page` table: page id, namespace, title, redirect flag
    Pages,
    /// `pagelinks` table: source page id, namespace, link-target id
    Links,
    /// `linktarget` table: link-target id, namespace, title
    LinkTargets,
    /// `redirect` table: source page id, namespace, target title
    Redirects,
}

impl DumpKind {
    pub fn table(self) -> &'static str {
        match self {
            DumpKind::Pages => "page",
            DumpKind::Links => "pagelinks",
            DumpKind::LinkTargets => "linktarget",
            DumpKind::Redirects => "redirect",
        }
    }
}

/// Iterator over the value tuples of one insert statement.
///
/// Yields the text between each balanced `(` and `)` pair, honoring
/// single-quoted strings with backslash escapes, so a title like
/// `'Signal_(1),(2)'` does not split the tuple early.
pub struct Tuples<'a> {
    rest: &'a str,
}

pub fn tuples(values: &str) -> Tuples<'_> {
    Tuples { rest: values }
}

impl<'a> Iterator for Tuples<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.rest.as_bytes();
        let start = memchr(b'(', bytes)?;
        let mut i = start + 1;
        let mut in_quote = false;

        while i < bytes.len() {
            if in_quote {
                // Jump to the next quote or escape inside the string
                match memchr2(b'\'', b'\\', &bytes[i..]) {
                    Some(off) => {
                        let j = i + off;
                        if bytes[j] == b'\\' {
                            i = j + 2;
                        } else {
                            in_quote = false;
                            i = j + 1;
                        }
                    }
                    None => break,
                }
            } else {
                match memchr2(b'\'', b')', &bytes[i..]) {
                    Some(off) => {
                        let j = i + off;
                        if bytes[j] == b'\'' {
                            in_quote = true;
                            i = j + 1;
                        } else {
                            let tuple = &self.rest[start + 1..j];
                            self.rest = &self.rest[j + 1..];
                            return Some(tuple);
                        }
                    }
                    None => break,
                }
            }
        }

        self.rest = "";
        None
    }
}

/// Writes one TSV record if the tuple matches the kind's pattern.
///
/// Returns `false` for tuples that fail to match (wrong namespace, truncated
/// tuple, unexpected field shape). Quoted titles are emitted exactly as they
/// appear in the dump, escapes included, so every later stage joins on the
/// same byte sequence.
fn emit_tuple<W: Write>(kind: DumpKind, tuple: &str, out: &mut W) -> Result<bool> {
    let matched = match kind {
        DumpKind::Pages => {
            if let Some(caps) = PAGE_TUPLE.captures(tuple) {
                writeln!(out, "{}\t0\t{}\t{}", &caps[1], &caps[2], &caps[3])?;
                true
            } else {
                false
            }
        }
        DumpKind::Links => {
            if let Some(caps) = LINK_TUPLE.captures(tuple) {
                writeln!(out, "{}\t0\t{}", &caps[1], &caps[2])?;
                true
            } else {
                false
            }
        }
        DumpKind::LinkTargets => {
            if let Some(caps) = LINK_TARGET_TUPLE.captures(tuple) {
                writeln!(out, "{}\t0\t{}", &caps[1], &caps[2])?;
                true
            } else {
                false
            }
        }
        DumpKind::Redirects => {
            if let Some(caps) = REDIRECT_TUPLE.captures(tuple) {
                writeln!(out, "{}\t0\t{}", &caps[1], &caps[2])?;
                true
            } else {
                false
            }
        }
    };
    Ok(matched)
}

/// Streams one dump file, writing accepted records to a bz2-compressed TSV.
pub fn run_extract(kind: DumpKind, input: &Path, output: &Path) -> Result<ExtractStats> {
    tsv::check_extension(input, DUMP_EXTENSION)?;
    let mut reader = tsv::open_bz2(input)?;

    let out_file = File::create(output)
        .with_context(|| format!("Failed to create output file: {:?}", output))?;
    let mut writer = BzEncoder::new(
        BufWriter::with_capacity(WRITE_BUF_SIZE, out_file),
        Compression::default(),
    );

    info!(table = kind.table(), input = ?input, "Extracting records");

    let stats = ExtractStats::new();
    let prefix = format!("INSERT INTO `{}` VALUES ", kind.table());
    let pb = ProgressBar::new_spinner();
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .with_context(|| format!("Failed to read dump file: {:?}", input))?;
        if n == 0 {
            break;
        }
        let Some(values) = line.strip_prefix(&prefix) else {
            continue;
        };

        stats.inc_statements();
        for tuple in tuples(values) {
            if emit_tuple(kind, tuple, &mut writer)? {
                stats.inc_accepted();
            } else {
                stats.inc_skipped();
            }
            if (stats.accepted() + stats.skipped()) % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
        }
    }

    let inner = writer
        .finish()
        .with_context(|| format!("Failed to finish compressed output: {:?}", output))?;
    inner
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to flush output file: {:?}", output))?;

    pb.finish_and_clear();
    info!(
        statements = stats.statements(),
        accepted = stats.accepted(),
        skipped = stats.skipped(),
        "Extraction finished"
    );

    Ok(stats)
}
