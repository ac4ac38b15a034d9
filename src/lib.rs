//! Ariadne: Wikipedia SQL-dump to link-graph pipeline
//!
//! This crate turns the raw MediaWiki database export dumps (`page`,
//! `pagelinks`, `linktarget`, `redirect`) into a compact directed graph of
//! article-to-article links, ready for shortest-path search. Five chained
//! transforms, each a subcommand, composable through shell pipelines:
//!
//! 1. **Extract** -- Parse SQL bulk-insert statements into tab-separated
//!    records for pages, raw links, link targets, and redirects
//! 2. **Resolve redirects** -- Join redirect target titles against the page
//!    set and collapse transitive chains to their terminal page
//! 3. **Prune pages** -- Drop redirect markers that resolved to nothing
//! 4. **Join links** -- Resolve raw (page, link-target) pairs into page-id
//!    edges, with two interchangeable strategies
//! 5. **Combine links** -- Merge grouped outgoing and incoming edge streams
//!    into one per-page summary
//!
//! # Architecture
//!
//! Every stage is a single-pass streaming transform over bz2-compressed TSV:
//!
//! - **Bounded memory parsing** -- The extractor never holds more than one
//!   insert statement; tuples are scanned and emitted one at a time
//! - **Typed stage boundaries** -- Each row becomes a typed record or a
//!   categorized skip reason at a single validation point
//! - **Silent referential gaps** -- Dead links, red links, and broken
//!   redirects are counted conditions, never errors
//! - **Composable output** -- Data goes to stdout; diagnostics, progress, and
//!   skip statistics go to stderr
//! - **Relation caching** -- The streaming join strategy reuses materialized
//!   SQLite relations across runs, gated on row count
//!
//! # Key Modules
//!
//! - [`dump`] -- SQL insert-statement scanner and per-table field extraction
//! - [`redirects`] -- Title-to-id index and redirect chain collapsing
//! - [`prune`] -- Orphaned-redirect removal
//! - [`join`] -- The join contract and both strategies
//! - [`store`] -- SQLite relation store with row-count cache gate
//! - [`combine`] -- Sorted-stream merge into per-page link summaries
//! - [`models`] -- Core record types and skip reasons
//! - [`stats`] -- Atomic per-stage counters
//! - [`tsv`] -- Compressed TSV plumbing shared by every stage
//! - [`config`] -- Pipeline constants
//!
//! # Example Usage
//!
//! ```bash
//! # Extract the record kinds
//! ariadne extract -k pages -i enwiki-latest-page.sql.bz2 -o pages.tsv.bz2
//! ariadne extract -k links -i enwiki-latest-pagelinks.sql.bz2 -o links.tsv.bz2
//! ariadne extract -k link-targets -i enwiki-latest-linktarget.sql.bz2 -o linktargets.tsv.bz2
//! ariadne extract -k redirects -i enwiki-latest-redirect.sql.bz2 -o redirects.tsv.bz2
//!
//! # Resolve, prune, join, combine
//! ariadne resolve-redirects -p pages.tsv.bz2 -r redirects.tsv.bz2 | bzip2 > resolved.tsv.bz2
//! ariadne prune-pages -p pages.tsv.bz2 -r resolved.tsv.bz2 | bzip2 > pruned.tsv.bz2
//! ariadne join-links -p pruned.tsv.bz2 -t linktargets.tsv.bz2 -l links.tsv.bz2 > edges.tsv
//! ariadne combine-links --outgoing outgoing.tsv.bz2 --incoming incoming.tsv.bz2 | bzip2 > links.tsv.bz2
//! ```

pub mod combine;
pub mod config;
pub mod dump;
pub mod join;
pub mod models;
pub mod prune;
pub mod redirects;
pub mod stats;
pub mod store;
pub mod tsv;
