//! Core record types for every pipeline stage.
//!
//! Each stage decodes its tab-separated input into one of these types at the
//! boundary, through a single validation point. A row either becomes a typed
//! record or a [`SkipReason`]; no stage indexes into raw split fields.

use csv::StringRecord;

/// Why a row was skipped instead of producing a record or an edge.
///
/// All of these are expected, non-fatal conditions in real dump data. They are
/// counted per reason and reported on the diagnostic stream, never raised as
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Wrong column count or an unparsable field
    MalformedLine,
    /// Source page id does not exist in the page set
    MissingSource,
    /// Link-target id has no corresponding link-target record
    UnknownLinkTarget,
    /// Link-target (namespace, title) pair resolves to no page
    UnresolvedTitle,
}

/// One row of the article page table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page_id: u64,
    pub namespace: i32,
    pub title: String,
    pub is_redirect: bool,
}

impl PageRecord {
    /// Decodes `page_id \t namespace \t title \t is_redirect` or returns `None`.
    pub fn decode(record: &StringRecord) -> Option<Self> {
        if record.len() != 4 {
            return None;
        }
        let page_id = record[0].parse().ok()?;
        let namespace = record[1].parse().ok()?;
        let is_redirect = match &record[3] {
            "0" => false,
            "1" => true,
            _ => return None,
        };
        Some(Self {
            page_id,
            namespace,
            title: record[2].to_string(),
            is_redirect,
        })
    }
}

/// Maps a numeric link-target id to the (namespace, title) it denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTargetRecord {
    pub lt_id: u64,
    pub namespace: i32,
    pub title: String,
}

impl LinkTargetRecord {
    pub fn decode(record: &StringRecord) -> Option<Self> {
        if record.len() != 3 {
            return None;
        }
        Some(Self {
            lt_id: record[0].parse().ok()?,
            namespace: record[1].parse().ok()?,
            title: record[2].to_string(),
        })
    }
}

/// One raw outgoing link occurrence, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLinkRecord {
    pub source_page_id: u64,
    pub namespace: i32,
    pub target_lt_id: u64,
}

impl RawLinkRecord {
    pub fn decode(record: &StringRecord) -> Option<Self> {
        if record.len() != 3 {
            return None;
        }
        Some(Self {
            source_page_id: record[0].parse().ok()?,
            namespace: record[1].parse().ok()?,
            target_lt_id: record[2].parse().ok()?,
        })
    }
}

/// A redirect as extracted from the dump: source page id to target title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRedirectRecord {
    pub source_page_id: u64,
    pub namespace: i32,
    pub target_title: String,
}

impl RawRedirectRecord {
    pub fn decode(record: &StringRecord) -> Option<Self> {
        if record.len() != 3 {
            return None;
        }
        Some(Self {
            source_page_id: record[0].parse().ok()?,
            namespace: record[1].parse().ok()?,
            target_title: record[2].to_string(),
        })
    }
}

/// A redirect collapsed to its terminal non-redirect destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRedirect {
    pub source_page_id: u64,
    pub target_page_id: u64,
}

impl ResolvedRedirect {
    pub fn decode(record: &StringRecord) -> Option<Self> {
        if record.len() != 2 {
            return None;
        }
        Some(Self {
            source_page_id: record[0].parse().ok()?,
            target_page_id: record[1].parse().ok()?,
        })
    }
}

/// A resolved directed link between two page ids, the unit of the output graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub src_id: u64,
    pub tgt_id: u64,
}

/// Per-page roll-up of both edge directions, the terminal artifact handed to
/// the path solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLinkSummary {
    pub page_id: u64,
    pub outgoing_count: u32,
    pub incoming_count: u32,
    pub outgoing_ids: Vec<u64>,
    pub incoming_ids: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn decode_page_record() {
        let page = PageRecord::decode(&record(&["101", "0", "Rust_(programming_language)", "0"]));
        assert_eq!(
            page,
            Some(PageRecord {
                page_id: 101,
                namespace: 0,
                title: "Rust_(programming_language)".to_string(),
                is_redirect: false,
            })
        );
    }

    #[test]
    fn decode_page_redirect_flag() {
        let page = PageRecord::decode(&record(&["7", "0", "Rust", "1"])).unwrap();
        assert!(page.is_redirect);
        assert!(PageRecord::decode(&record(&["7", "0", "Rust", "2"])).is_none());
    }

    #[test]
    fn decode_page_wrong_column_count() {
        assert!(PageRecord::decode(&record(&["7", "0"])).is_none());
        assert!(PageRecord::decode(&record(&["7", "0", "Rust", "0", "extra"])).is_none());
    }

    #[test]
    fn decode_page_non_numeric_id() {
        assert!(PageRecord::decode(&record(&["abc", "0", "Rust", "0"])).is_none());
    }

    #[test]
    fn decode_link_target() {
        let lt = LinkTargetRecord::decode(&record(&["55", "0", "Mozilla"])).unwrap();
        assert_eq!(lt.lt_id, 55);
        assert_eq!(lt.title, "Mozilla");
    }

    #[test]
    fn decode_raw_link() {
        let link = RawLinkRecord::decode(&record(&["101", "0", "55"])).unwrap();
        assert_eq!(link.source_page_id, 101);
        assert_eq!(link.target_lt_id, 55);
        assert!(RawLinkRecord::decode(&record(&["101", "55"])).is_none());
    }

    #[test]
    fn decode_raw_redirect() {
        let rd = RawRedirectRecord::decode(&record(&["7", "0", "Rust_(programming_language)"]))
            .unwrap();
        assert_eq!(rd.source_page_id, 7);
        assert_eq!(rd.target_title, "Rust_(programming_language)");
    }

    #[test]
    fn decode_resolved_redirect() {
        let rd = ResolvedRedirect::decode(&record(&["7", "101"])).unwrap();
        assert_eq!(rd.source_page_id, 7);
        assert_eq!(rd.target_page_id, 101);
        assert!(ResolvedRedirect::decode(&record(&["7"])).is_none());
    }

    #[test]
    fn titles_keep_escapes_verbatim() {
        let page = PageRecord::decode(&record(&["3", "0", r"O\'Hare", "0"])).unwrap();
        assert_eq!(page.title, r"O\'Hare");
    }
}
