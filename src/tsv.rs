//! Shared tab-separated I/O plumbing: bz2 decompression, extension checks,
//! reader/writer construction, and line counting for the relation cache gate.
//!
//! Every intermediate file in the pipeline is headerless, unquoted TSV. Titles
//! straight out of a dump can contain quote characters, so quoting is disabled
//! on both sides; MediaWiki titles cannot contain tabs or newlines.

use crate::config::READ_BUF_SIZE;
use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use memchr::memchr_iter;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

pub type BzReader = BufReader<BzDecoder<File>>;

/// Fails fast when an input file does not carry the extension a stage expects.
pub fn check_extension(path: &Path, expected: &str) -> Result<()> {
    let name = path.to_string_lossy();
    if !name.ends_with(expected) {
        bail!("Expected a {} file, got: {}", expected, name);
    }
    Ok(())
}

pub fn open_bz2(path: &Path) -> Result<BzReader> {
    let file =
        File::open(path).with_context(|| format!("Failed to open input file: {:?}", path))?;
    Ok(BufReader::with_capacity(READ_BUF_SIZE, BzDecoder::new(file)))
}

/// TSV reader over a decompressed stream. Flexible so that short rows reach
/// the typed decoders as skip candidates instead of aborting the read.
pub fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader)
}

pub fn open_tsv(path: &Path) -> Result<csv::Reader<BzReader>> {
    Ok(tsv_reader(open_bz2(path)?))
}

pub fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer)
}

/// Separates fatal I/O failures from row-level decode noise.
///
/// Returns `Ok(None)` for rows the csv layer itself rejects (bad UTF-8 and the
/// like); callers count those as malformed and move on. Underlying I/O errors
/// stay fatal.
pub fn row_or_skip(result: csv::Result<csv::StringRecord>) -> Result<Option<csv::StringRecord>> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                Err(e.into())
            } else {
                Ok(None)
            }
        }
    }
}

/// Counts lines in a bz2-compressed file.
///
/// Used as the relation-cache validity gate: a cached relation is reused only
/// when its row count equals this number. A trailing partial line counts.
pub fn count_lines(path: &Path) -> Result<u64> {
    let mut reader = open_bz2(path)?;
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut lines = 0u64;
    let mut last_byte = b'\n';

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read input file: {:?}", path))?;
        if n == 0 {
            break;
        }
        lines += memchr_iter(b'\n', &buf[..n]).count() as u64;
        last_byte = buf[n - 1];
    }

    if last_byte != b'\n' {
        lines += 1;
    }
    Ok(lines)
}
