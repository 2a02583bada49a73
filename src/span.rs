use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Inclusive interval of token positions (corpus positions, "cpos").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidSpan { start, end });
        }
        Ok(Span { start, end })
    }

    pub fn contains(&self, cpos: usize) -> bool {
        self.start <= cpos && cpos <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + use<> {
        self.start..=self.end
    }
}

/// Signed distance between a node span and another span.
///
/// Zero means the spans overlap at one or more positions; a negative value
/// means `other` ends before the node starts, a positive value means `other`
/// starts after the node ends. Magnitude is measured between the facing
/// edges of the two spans.
pub fn offset(node: Span, other: Span) -> i64 {
    if other.end < node.start {
        other.end as i64 - node.start as i64
    } else if other.start > node.end {
        other.start as i64 - node.end as i64
    } else {
        0
    }
}

/// One matched span together with the context region that encloses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpanRow {
    /// The matched interval (`match`..`matchend`).
    pub span: Span,
    /// Identifier of the enclosing context region, shared by all rows from
    /// the same region.
    pub contextid: usize,
    /// The context window (`context`..`contextend`).
    pub window: Span,
}

/// Raw TSV record: match, matchend, contextid, context, contextend.
#[derive(Debug, Deserialize)]
struct RawSpanRow {
    #[serde(rename = "match")]
    start: usize,
    matchend: usize,
    contextid: usize,
    context: usize,
    contextend: usize,
}

/// A table of matched token spans, keyed by `(match, matchend)`.
///
/// Span tables are produced externally (by a corpus query engine) and are
/// read-only inputs here: merging and grouping never mutate them.
#[derive(Debug, Clone, Default)]
pub struct SpanTable {
    rows: Vec<SpanRow>,
}

impl SpanTable {
    /// Build a table from rows, sorted and deduplicated by `(match, matchend)`.
    pub fn new(mut rows: Vec<SpanRow>) -> Self {
        rows.sort_by_key(|r| r.span);
        rows.dedup_by_key(|r| r.span);
        SpanTable { rows }
    }

    pub fn rows(&self) -> &[SpanRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All token positions covered by any matched span in this table.
    pub fn positions(&self) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        for row in &self.rows {
            set.extend(row.span.positions());
        }
        set
    }

    /// Read a table from a TSV file with header columns
    /// `match  matchend  contextid  context  contextend`.
    pub fn from_tsv_path(path: &Path) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let raw: RawSpanRow = record.map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let span = Span::new(raw.start, raw.matchend)?;
            let window = Span::new(raw.context, raw.contextend)?;
            rows.push(SpanRow {
                span,
                contextid: raw.contextid,
                window,
            });
        }
        Ok(SpanTable::new(rows))
    }
}
