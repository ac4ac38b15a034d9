//! Integration tests for the full Ariadne pipeline.
//!
//! These tests drive the complete data flow from bz2-compressed SQL dump
//! fixtures through extraction, redirect resolution, pruning, both join
//! strategies, and link aggregation. Tests are organized into sections:
//!
//! - **Extraction** -- insert-statement scanning, namespace filtering,
//!   escape preservation
//! - **Resolution** -- redirect candidate filtering and chain collapse
//! - **Pruning** -- orphaned-redirect removal
//! - **Join** -- both strategies on the same fixtures, skip accounting
//! - **Combine** -- sorted-stream aggregation into summaries
//! - **End to end** -- the whole chain on one consistent fixture world
//!
//! The shared fixture world:
//! - pages 10 "A" and 20 "B" are ordinary articles
//! - page 30 "Rust" redirects to "B"
//! - page 40 "Dead_redirect" redirects to a title that does not exist
//! - page 50 lives in namespace 14 and must never be extracted
//! - link targets: 100->"B", 101->"A", 102->"Rust", 103->"Nonexistent"
//! - raw links: 10->100, 20->101, 10->102, 40->100, 10->999

use ariadne::combine::combine_links;
use ariadne::dump::{run_extract, DumpKind};
use ariadne::join::{IndexedJoin, JoinInputs, JoinStrategy, MemoryJoin};
use ariadne::prune::prune_pages;
use ariadne::redirects::resolve_redirects;
use ariadne::stats::JoinStats;
use ariadne::store::RelationStore;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_bz2(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = BzEncoder::new(file, Compression::fast());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

fn read_bz2(path: &Path) -> String {
    use bzip2::read::BzDecoder;
    use std::io::Read;
    let mut decoder = BzDecoder::new(File::open(path).unwrap());
    let mut content = String::new();
    decoder.read_to_string(&mut content).unwrap();
    content
}

fn page_dump() -> &'static str {
    "-- MySQL dump of table `page`\n\
     DROP TABLE IF EXISTS `page`;\n\
     CREATE TABLE `page` (`page_id` int unsigned NOT NULL);\n\
     INSERT INTO `page` VALUES (10,0,'A',0,0,0.1,'20240101000000',NULL,1,10,'wikitext',NULL),(20,0,'B',0,0,0.2,'20240101000000',NULL,2,20,'wikitext',NULL),(30,0,'Rust',1,0,0.3,'20240101000000',NULL,3,30,'wikitext',NULL),(40,0,'Dead_redirect',1,0,0.4,'20240101000000',NULL,4,40,'wikitext',NULL),(50,14,'Category_page',0,0,0.5,'20240101000000',NULL,5,50,'wikitext',NULL);\n\
     UNLOCK TABLES;\n"
}

fn redirect_dump() -> &'static str {
    "-- MySQL dump of table `redirect`\n\
     INSERT INTO `redirect` VALUES (30,0,'B','',''),(40,0,'Nonexistent','',''),(50,14,'Other','','');\n"
}

fn linktarget_dump() -> &'static str {
    "INSERT INTO `linktarget` VALUES (100,0,'B'),(101,0,'A'),(102,0,'Rust'),(103,0,'Nonexistent'),(104,10,'Template_page');\n"
}

fn pagelinks_dump() -> &'static str {
    "INSERT INTO `pagelinks` VALUES (10,0,100),(20,0,101),(10,0,102),(40,0,100),(10,0,999);\n"
}

/// Runs extraction for all four kinds, returning the extracted TSV paths.
struct ExtractedWorld {
    pages: PathBuf,
    links: PathBuf,
    link_targets: PathBuf,
    redirects: PathBuf,
}

fn extract_world(dir: &Path) -> ExtractedWorld {
    let page_sql = write_bz2(dir, "page.sql.bz2", page_dump());
    let links_sql = write_bz2(dir, "pagelinks.sql.bz2", pagelinks_dump());
    let lt_sql = write_bz2(dir, "linktarget.sql.bz2", linktarget_dump());
    let rd_sql = write_bz2(dir, "redirect.sql.bz2", redirect_dump());

    let pages = dir.join("pages.tsv.bz2");
    let links = dir.join("links.tsv.bz2");
    let link_targets = dir.join("linktargets.tsv.bz2");
    let redirects = dir.join("redirects.tsv.bz2");

    run_extract(DumpKind::Pages, &page_sql, &pages).unwrap();
    run_extract(DumpKind::Links, &links_sql, &links).unwrap();
    run_extract(DumpKind::LinkTargets, &lt_sql, &link_targets).unwrap();
    run_extract(DumpKind::Redirects, &rd_sql, &redirects).unwrap();

    ExtractedWorld {
        pages,
        links,
        link_targets,
        redirects,
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[test]
fn extract_pages_filters_namespace_and_keeps_flags() {
    let dir = TempDir::new().unwrap();
    let world = extract_world(dir.path());

    let pages = read_bz2(&world.pages);
    assert_eq!(
        pages,
        "10\t0\tA\t0\n20\t0\tB\t0\n30\t0\tRust\t1\n40\t0\tDead_redirect\t1\n"
    );
}

#[test]
fn extract_counts_statements_and_skips() {
    let dir = TempDir::new().unwrap();
    let page_sql = write_bz2(dir.path(), "page.sql.bz2", page_dump());
    let out = dir.path().join("pages.tsv.bz2");

    let stats = run_extract(DumpKind::Pages, &page_sql, &out).unwrap();
    assert_eq!(stats.statements(), 1);
    assert_eq!(stats.accepted(), 4);
    // The namespace-14 page fails the pattern and is skipped
    assert_eq!(stats.skipped(), 1);
}

#[test]
fn extract_links_and_link_targets() {
    let dir = TempDir::new().unwrap();
    let world = extract_world(dir.path());

    assert_eq!(
        read_bz2(&world.links),
        "10\t0\t100\n20\t0\t101\n10\t0\t102\n40\t0\t100\n10\t0\t999\n"
    );
    assert_eq!(
        read_bz2(&world.link_targets),
        "100\t0\tB\n101\t0\tA\n102\t0\tRust\n103\t0\tNonexistent\n"
    );
}

#[test]
fn extract_redirects_ignores_other_namespaces() {
    let dir = TempDir::new().unwrap();
    let world = extract_world(dir.path());
    assert_eq!(
        read_bz2(&world.redirects),
        "30\t0\tB\n40\t0\tNonexistent\n"
    );
}

#[test]
fn extract_preserves_escaped_titles() {
    let dir = TempDir::new().unwrap();
    let sql = write_bz2(
        dir.path(),
        "page.sql.bz2",
        r"INSERT INTO `page` VALUES (7,0,'O\'Hare_(airport)',0,0,0.1,'x',NULL,1,1,'wikitext',NULL);
",
    );
    let out = dir.path().join("pages.tsv.bz2");
    run_extract(DumpKind::Pages, &sql, &out).unwrap();
    assert_eq!(read_bz2(&out), "7\t0\tO\\'Hare_(airport)\t0\n");
}

#[test]
fn extract_rejects_wrong_extension() {
    let dir = TempDir::new().unwrap();
    let sql = write_bz2(dir.path(), "page.sql.gz2", page_dump());
    let out = dir.path().join("pages.tsv.bz2");
    assert!(run_extract(DumpKind::Pages, &sql, &out).is_err());
}

// ---------------------------------------------------------------------------
// Redirect resolution
// ---------------------------------------------------------------------------

#[test]
fn resolve_keeps_only_resolvable_redirects() {
    let dir = TempDir::new().unwrap();
    let world = extract_world(dir.path());

    let mut out = Vec::new();
    let stats = resolve_redirects(&world.pages, &world.redirects, &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "30\t20\n");
    assert_eq!(stats.resolved_count(), 1);
    assert_eq!(stats.unresolved_title_count(), 1);
}

#[test]
fn resolve_collapses_chains_and_drops_cycles() {
    let dir = TempDir::new().unwrap();
    // 1 "A" is an article; 2 -> "A"; 3 -> title of 2, so 3 collapses to 1.
    // 4 and 5 redirect to each other and must both vanish.
    let pages = write_bz2(
        dir.path(),
        "pages.tsv.bz2",
        "1\t0\tA\t0\n2\t0\tB\t1\n3\t0\tC\t1\n4\t0\tD\t1\n5\t0\tE\t1\n",
    );
    let redirects = write_bz2(
        dir.path(),
        "redirects.tsv.bz2",
        "2\t0\tA\n3\t0\tB\n4\t0\tE\n5\t0\tD\n",
    );

    let mut out = Vec::new();
    let stats = resolve_redirects(&pages, &redirects, &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "2\t1\n3\t1\n");
    assert_eq!(stats.resolved_count(), 2);
    assert_eq!(stats.broken_chain_count(), 2);
}

#[test]
fn resolve_drops_missing_source() {
    let dir = TempDir::new().unwrap();
    let pages = write_bz2(dir.path(), "pages.tsv.bz2", "1\t0\tA\t0\n");
    let redirects = write_bz2(dir.path(), "redirects.tsv.bz2", "99\t0\tA\n");

    let mut out = Vec::new();
    let stats = resolve_redirects(&pages, &redirects, &mut out).unwrap();
    assert!(out.is_empty());
    assert_eq!(stats.missing_source_count(), 1);
}

#[test]
fn resolve_tolerates_malformed_rows() {
    let dir = TempDir::new().unwrap();
    let pages = write_bz2(dir.path(), "pages.tsv.bz2", "1\t0\tA\t0\n2\t0\n");
    let redirects = write_bz2(dir.path(), "redirects.tsv.bz2", "only_two\tfields\n");

    let mut out = Vec::new();
    let stats = resolve_redirects(&pages, &redirects, &mut out).unwrap();
    assert!(out.is_empty());
    assert_eq!(stats.malformed_count(), 2);
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

#[test]
fn prune_keeps_resolved_redirects_and_articles() {
    let dir = TempDir::new().unwrap();
    let pages = write_bz2(dir.path(), "pages.tsv.bz2", "1\t0\tA\t1\n2\t0\tB\t0\n");
    let resolved = write_bz2(dir.path(), "resolved.tsv.bz2", "1\t2\n");

    let mut out = Vec::new();
    let stats = prune_pages(&pages, &resolved, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1\t0\tA\t1\n2\t0\tB\t0\n");
    assert_eq!(stats.kept_count(), 2);
    assert_eq!(stats.dropped_count(), 0);
}

#[test]
fn prune_drops_orphaned_redirect() {
    let dir = TempDir::new().unwrap();
    let pages = write_bz2(dir.path(), "pages.tsv.bz2", "1\t0\tA\t1\n2\t0\tB\t0\n");
    let resolved = write_bz2(dir.path(), "resolved.tsv.bz2", "");

    let mut out = Vec::new();
    let stats = prune_pages(&pages, &resolved, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "2\t0\tB\t0\n");
    assert_eq!(stats.kept_count(), 1);
    assert_eq!(stats.dropped_count(), 1);
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

fn join_with<S: JoinStrategy>(mut strategy: S, inputs: &JoinInputs) -> (String, JoinStats) {
    let stats = JoinStats::new();
    let mut out = Vec::new();
    strategy.run(inputs, &mut out, &stats).unwrap();
    (String::from_utf8(out).unwrap(), stats)
}

fn pruned_world(dir: &Path) -> JoinInputs {
    let world = extract_world(dir);

    let mut resolved = Vec::new();
    resolve_redirects(&world.pages, &world.redirects, &mut resolved).unwrap();
    let resolved_path = write_bz2(dir, "resolved.tsv.bz2", &String::from_utf8(resolved).unwrap());

    let mut pruned = Vec::new();
    prune_pages(&world.pages, &resolved_path, &mut pruned).unwrap();
    let pruned_path = write_bz2(dir, "pruned.tsv.bz2", &String::from_utf8(pruned).unwrap());

    JoinInputs {
        pages: pruned_path,
        link_targets: world.link_targets,
        links: world.links,
    }
}

#[test]
fn memory_join_resolves_edges_and_counts_skips() {
    let dir = TempDir::new().unwrap();
    let inputs = pruned_world(dir.path());

    let (out, stats) = join_with(MemoryJoin::new(), &inputs);
    // Page 40 was pruned, so its link is a missing source; link target 999
    // does not exist. The link to "Rust" resolves to the redirect page's own
    // id, not its final destination.
    assert_eq!(out, "10\t20\n20\t10\n10\t30\n");
    assert_eq!(stats.edges(), 3);
    assert_eq!(stats.missing_source_count(), 1);
    assert_eq!(stats.unknown_link_target_count(), 1);
    assert_eq!(stats.unresolved_title_count(), 0);
}

#[test]
fn indexed_join_matches_memory_join() {
    let dir = TempDir::new().unwrap();
    let inputs = pruned_world(dir.path());

    let (memory_out, memory_stats) = join_with(MemoryJoin::new(), &inputs);
    let store = RelationStore::open(&dir.path().join("relations.db")).unwrap();
    let (indexed_out, indexed_stats) = join_with(IndexedJoin::new(store), &inputs);

    assert_eq!(memory_out, indexed_out);
    assert_eq!(memory_stats.edges(), indexed_stats.edges());
    assert_eq!(memory_stats.skip_counts(), indexed_stats.skip_counts());
}

#[test]
fn indexed_join_reuses_cached_relations() {
    let dir = TempDir::new().unwrap();
    let inputs = pruned_world(dir.path());
    let store_path = dir.path().join("relations.db");

    let store = RelationStore::open(&store_path).unwrap();
    let (first, _) = join_with(IndexedJoin::new(store), &inputs);

    // Second run hits the row-count gate and reuses both relations
    let store = RelationStore::open(&store_path).unwrap();
    let (second, _) = join_with(IndexedJoin::new(store), &inputs);
    assert_eq!(first, second);
}

#[test]
fn join_is_idempotent_per_strategy() {
    let dir = TempDir::new().unwrap();
    let inputs = pruned_world(dir.path());

    let (first, _) = join_with(MemoryJoin::new(), &inputs);
    let (second, _) = join_with(MemoryJoin::new(), &inputs);
    assert_eq!(first, second);
}

#[test]
fn join_tolerates_malformed_link_rows() {
    let dir = TempDir::new().unwrap();
    let pages = write_bz2(dir.path(), "pages.tsv.bz2", "10\t0\tA\t0\n20\t0\tB\t0\n");
    let lts = write_bz2(dir.path(), "lt.tsv.bz2", "100\t0\tB\n");
    let links = write_bz2(dir.path(), "links.tsv.bz2", "10\t0\t100\nbad\t\n10\t0\t100\n");
    let inputs = JoinInputs {
        pages,
        link_targets: lts,
        links,
    };

    let (out, stats) = join_with(MemoryJoin::new(), &inputs);
    assert_eq!(out, "10\t20\n10\t20\n");
    assert_eq!(stats.malformed(), 1);
    assert_eq!(stats.edges(), 2);
}

// ---------------------------------------------------------------------------
// Combine
// ---------------------------------------------------------------------------

#[test]
fn combine_emits_union_of_pages() {
    let dir = TempDir::new().unwrap();
    let outgoing = write_bz2(dir.path(), "outgoing.tsv.bz2", "1\t2|3\n");
    let incoming = write_bz2(dir.path(), "incoming.tsv.bz2", "2\t1\n");

    let mut out = Vec::new();
    let stats = combine_links(&outgoing, &incoming, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "1\t2\t0\t2|3\t\n2\t0\t1\t\t1\n"
    );
    assert_eq!(stats.pages(), 2);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

/// Groups an edge list by one column, mirroring the external sort/group step
/// that normally sits between the join and the combiner.
fn group_edges(edges: &str, by_source: bool) -> String {
    use std::collections::BTreeMap;
    let mut grouped: BTreeMap<u64, Vec<&str>> = BTreeMap::new();
    for line in edges.lines() {
        let (src, tgt) = line.split_once('\t').unwrap();
        let (key, value) = if by_source {
            (src.parse().unwrap(), tgt)
        } else {
            (tgt.parse().unwrap(), src)
        };
        grouped.entry(key).or_default().push(value);
    }
    let mut out = String::new();
    for (key, values) in grouped {
        out.push_str(&format!("{}\t{}\n", key, values.join("|")));
    }
    out
}

#[test]
fn full_pipeline_produces_expected_summaries() {
    let dir = TempDir::new().unwrap();
    let inputs = pruned_world(dir.path());

    let (edges, _) = join_with(MemoryJoin::new(), &inputs);
    let outgoing = write_bz2(dir.path(), "outgoing.tsv.bz2", &group_edges(&edges, true));
    let incoming = write_bz2(dir.path(), "incoming.tsv.bz2", &group_edges(&edges, false));

    let mut out = Vec::new();
    combine_links(&outgoing, &incoming, &mut out).unwrap();

    // Page 10 links to 20 and 30 and is linked from 20; page 30 (a valid
    // redirect page) only receives links; page 40 is gone entirely.
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "10\t2\t1\t20|30\t20\n20\t1\t1\t10\t10\n30\t0\t1\t\t10\n"
    );
}
