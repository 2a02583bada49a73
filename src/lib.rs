#![forbid(unsafe_code)]
//! # discoursemes
//!
//! Analysis of positional corpus query results: several independently
//! queried phenomena ("discoursemes") are joined into one constellation via
//! their shared textual contexts, rendered as role-annotated concordance
//! lines, and scored for statistically significant co-occurrence within
//! configurable distance windows around the node.
//!
//! The corpus query engine itself is an external collaborator: span tables
//! arrive as tables of token-offset intervals with per-row context
//! identifiers, and token attributes are fetched through the
//! [`AttributeLookup`] boundary.
//!
//! ## Example
//! ```
//! use discoursemes::{Constellation, Span, SpanRow, SpanTable};
//!
//! let row = |start, end, contextid, context, contextend| SpanRow {
//!     span: Span::new(start, end).unwrap(),
//!     contextid,
//!     window: Span::new(context, contextend).unwrap(),
//! };
//! let node = SpanTable::new(vec![row(10, 12, 0, 0, 20), row(35, 36, 1, 30, 50)]);
//! let disc = SpanTable::new(vec![row(5, 6, 0, 0, 20)]);
//!
//! let mut constellation = Constellation::new(node, "topic");
//! constellation.add_discourseme("disc", disc).unwrap();
//!
//! // only the first context contains both discoursemes
//! assert_eq!(constellation.group_lines().len(), 1);
//! ```

mod concordance;
mod constellation;
mod cooc;
mod corpus;
mod error;
mod export;
mod keywords;
mod score;
mod span;

pub use concordance::{
    ConcordanceLine, ConcordanceOptions, LineOrder, Role, assign_roles, render_line,
};
pub use constellation::{
    Constellation, GroupedLine, JoinMode, JoinedRow, Member, constellation_merge,
};
pub use cooc::{CollocatesOptions, ContextWindow, CoocPair, distinct_contexts, node_to_cooc};
pub use corpus::{AttributeLookup, TokenCorpus};
pub use error::Error;
pub use export::{ExportFormat, export_keywords, export_lines, export_scored, timestamped_path};
pub use keywords::{
    FrequencyList, KeywordResult, KeywordRow, KeywordsOptions, LonelyRow, keywords_first,
    keywords_second, lonely_items,
};
pub use score::{Counts, ItemCounts, Measure, ScorePolicy, ScoredRow, score, score_counts};
pub use span::{Span, SpanRow, SpanTable, offset};
