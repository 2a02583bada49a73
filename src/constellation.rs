use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use clap::ValueEnum;
use serde::Serialize;

use crate::error::Error;
use crate::span::{Span, SpanTable, offset};

/// How an additional span table is joined onto the constellation.
///
/// `Left` keeps every constellation row and re-keys the result by the node's
/// `(match, matchend)`; `Outer` additionally keeps rows for contexts that only
/// the new table knows about. Outer output is a flat table: rows without a
/// node key are not collapsed, so only left-mode output is guaranteed
/// unique-keyed after grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum JoinMode {
    #[default]
    Left,
    Outer,
}

/// One discourseme occurrence joined onto a constellation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Member {
    pub span: Span,
    /// Signed distance to the node span, 0 on overlap.
    pub offset: i64,
}

/// One row of the wide joined table: node interval, context fields, and one
/// (possibly missing) occurrence per registered discourseme.
#[derive(Debug, Clone, Serialize)]
pub struct JoinedRow {
    /// Absent only for outer-mode rows whose context has no node match.
    pub node: Option<Span>,
    pub contextid: usize,
    /// Context window bounds; absent together with `node`.
    pub window: Option<Span>,
    /// Discourseme name -> occurrence; `None` records an incomplete join.
    pub members: BTreeMap<String, Option<Member>>,
}

/// Join a new named span table onto the current wide table via `contextid`.
///
/// Every pairing of a constellation row with a same-context row of `table`
/// produces one output row (one node match fans out over multiple occurrences
/// of the same discourseme within one context). With `drop`, rows with any
/// missing field are removed, as are rows whose new occurrence lies outside
/// the node's declared context window.
pub fn constellation_merge(
    df: &[JoinedRow],
    table: &SpanTable,
    name: &str,
    drop: bool,
    how: JoinMode,
) -> Vec<JoinedRow> {
    let mut by_context: HashMap<usize, Vec<Span>> = HashMap::new();
    for row in table.rows() {
        by_context.entry(row.contextid).or_default().push(row.span);
    }

    let mut out = Vec::new();
    let mut seen: HashSet<usize> = HashSet::new();
    for row in df {
        seen.insert(row.contextid);
        match by_context.get(&row.contextid) {
            Some(spans) => {
                for &span in spans {
                    let mut joined = row.clone();
                    let off = match row.node {
                        Some(node) => offset(node, span),
                        None => 0,
                    };
                    joined
                        .members
                        .insert(name.to_string(), Some(Member { span, offset: off }));
                    out.push(joined);
                }
            }
            None => {
                let mut joined = row.clone();
                joined.members.insert(name.to_string(), None);
                out.push(joined);
            }
        }
    }

    if how == JoinMode::Outer {
        for row in table.rows() {
            if !seen.contains(&row.contextid) {
                let mut members = BTreeMap::new();
                members.insert(
                    name.to_string(),
                    Some(Member {
                        span: row.span,
                        offset: 0,
                    }),
                );
                out.push(JoinedRow {
                    node: None,
                    contextid: row.contextid,
                    window: None,
                    members,
                });
            }
        }
    }

    if drop {
        out.retain(|row| {
            let (Some(_), Some(window)) = (row.node, row.window) else {
                return false;
            };
            if row.members.values().any(Option::is_none) {
                return false;
            }
            // the new occurrence must overlap the node's context window;
            // note the strict bound on the right edge
            match row.members.get(name).copied().flatten() {
                Some(member) => member.span.end >= window.start && member.span.start < window.end,
                None => false,
            }
        });
    }

    if how == JoinMode::Left {
        out.sort_by_key(|row| row.node);
    }
    out
}

/// One row per distinct node match, with each discourseme's occurrences
/// collapsed to a set of `(offset, match, matchend)` triples.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedLine {
    pub node: Span,
    pub contextid: usize,
    pub window: Span,
    pub members: BTreeMap<String, BTreeSet<(i64, usize, usize)>>,
}

/// A node span table plus named discoursemes, accumulated into one wide
/// joined table keyed by the node's `(match, matchend)`.
#[derive(Debug, Clone)]
pub struct Constellation {
    df: Vec<JoinedRow>,
    discoursemes: Vec<(String, SpanTable)>,
}

impl Constellation {
    /// Create a constellation around a node table. The node is registered as
    /// the first discourseme under `name` and merged against itself, so node
    /// co-occurrences within shared contexts are part of the table from the
    /// start.
    pub fn new(node: SpanTable, name: &str) -> Self {
        let df = node
            .rows()
            .iter()
            .map(|row| JoinedRow {
                node: Some(row.span),
                contextid: row.contextid,
                window: Some(row.window),
                members: BTreeMap::new(),
            })
            .collect();
        let mut constellation = Constellation {
            df,
            discoursemes: Vec::new(),
        };
        constellation.register(name, node, true, JoinMode::Left);
        constellation
    }

    fn register(&mut self, name: &str, table: SpanTable, drop: bool, how: JoinMode) {
        self.df = constellation_merge(&self.df, &table, name, drop, how);
        self.discoursemes.push((name.to_string(), table));
    }

    /// Register an additional discourseme with the default policy
    /// (`drop = true`, left join).
    pub fn add_discourseme(&mut self, name: &str, table: SpanTable) -> Result<(), Error> {
        self.add_discourseme_with(name, table, true, JoinMode::Left)
    }

    /// Register an additional discourseme. Fails without changing any state
    /// if the name is already taken.
    pub fn add_discourseme_with(
        &mut self,
        name: &str,
        table: SpanTable,
        drop: bool,
        how: JoinMode,
    ) -> Result<(), Error> {
        if self.discoursemes.iter().any(|(n, _)| n == name) {
            log::error!("name \"{name}\" already taken; cannot register discourseme");
            return Err(Error::NameConflict(name.to_string()));
        }
        self.register(name, table, drop, how);
        Ok(())
    }

    /// The current wide joined table.
    pub fn joined(&self) -> &[JoinedRow] {
        &self.df
    }

    /// Registered discourseme names, in registration order (the node first).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.discoursemes.iter().map(|(name, _)| name.as_str())
    }

    pub fn discoursemes(&self) -> &[(String, SpanTable)] {
        &self.discoursemes
    }

    /// Collapse the wide table to one row per distinct node match, sorted by
    /// node key. Fanned-out occurrences of a discourseme deduplicate into a
    /// set; missing occurrences contribute nothing. Rows without a node key
    /// (outer-mode leftovers) are skipped.
    pub fn group_lines(&self) -> Vec<GroupedLine> {
        let mut groups: BTreeMap<(usize, usize), GroupedLine> = BTreeMap::new();
        for row in &self.df {
            let (Some(node), Some(window)) = (row.node, row.window) else {
                continue;
            };
            let group = groups
                .entry((node.start, node.end))
                .or_insert_with(|| GroupedLine {
                    node,
                    contextid: row.contextid,
                    window,
                    members: self
                        .discoursemes
                        .iter()
                        .map(|(name, _)| (name.clone(), BTreeSet::new()))
                        .collect(),
                });
            for (name, member) in &row.members {
                if let Some(member) = member {
                    group
                        .members
                        .entry(name.clone())
                        .or_default()
                        .insert((member.offset, member.span.start, member.span.end));
                }
            }
        }
        groups.into_values().collect()
    }
}
