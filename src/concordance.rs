use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use clap::ValueEnum;
use serde::{Serialize, Serializer};

use crate::constellation::{Constellation, GroupedLine};
use crate::corpus::AttributeLookup;
use crate::error::Error;

/// Role of one token position within a concordance line.
///
/// A position can carry several roles at once (the node span of a
/// discourseme that is itself registered, a discourseme occurrence beyond
/// the display window, ...), so lines store a set per position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Node,
    OutOfWindow,
    Discourseme(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Node => f.write_str("node"),
            Role::OutOfWindow => f.write_str("out_of_window"),
            Role::Discourseme(name) => f.write_str(name),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One rendered concordance line: the node's context window as parallel
/// per-position vectors, plus per-position role sets.
#[derive(Debug, Clone, Serialize)]
pub struct ConcordanceLine {
    /// Node interval, for reference.
    pub node: (usize, usize),
    /// Absolute token positions of the context window.
    pub cpos: Vec<usize>,
    /// Signed distance of each position to the node span.
    pub offset: Vec<i64>,
    /// Positional attribute layer -> token values, parallel to `cpos`.
    pub layers: BTreeMap<String, Vec<String>>,
    /// Requested structural attributes, copied through unchanged.
    pub structural: BTreeMap<String, String>,
    /// Role set per position, parallel to `cpos`.
    pub roles: Vec<BTreeSet<Role>>,
}

/// Render one grouped row against the corpus: expand its context window to
/// positions with continuous offsets and look up the shown attributes.
pub fn render_line<C: AttributeLookup>(
    corpus: &C,
    line: &GroupedLine,
    p_show: &[&str],
    s_show: &[&str],
) -> ConcordanceLine {
    let cpos: Vec<usize> = line.window.positions().collect();
    let offset: Vec<i64> = cpos
        .iter()
        .map(|&p| {
            if p < line.node.start {
                p as i64 - line.node.start as i64
            } else if p > line.node.end {
                p as i64 - line.node.end as i64
            } else {
                0
            }
        })
        .collect();

    let mut layers = BTreeMap::new();
    for &layer in p_show {
        let tokens: Vec<String> = cpos
            .iter()
            .map(|&p| corpus.token(p, layer).unwrap_or_default().to_string())
            .collect();
        layers.insert(layer.to_string(), tokens);
    }

    let mut structural = BTreeMap::new();
    for &attr in s_show {
        if let Some(value) = corpus.structural(line.contextid, attr) {
            structural.insert(attr.to_string(), value.to_string());
        }
    }

    ConcordanceLine {
        node: (line.node.start, line.node.end),
        cpos,
        offset,
        layers,
        structural,
        roles: Vec::new(),
    }
}

/// Assign per-position role sets to a rendered line.
///
/// Positions further than `window` from the node are `out_of_window`; the
/// node span itself always wins over that default; every discourseme
/// occurrence labels its positions with the discourseme's name. The final
/// role of a position is the set union of all labels.
pub fn assign_roles(line: &mut ConcordanceLine, grouped: &GroupedLine, window: usize) {
    let mut base: Vec<Option<Role>> = line
        .offset
        .iter()
        .map(|o| (o.unsigned_abs() > window as u64).then_some(Role::OutOfWindow))
        .collect();
    for (i, &cpos) in line.cpos.iter().enumerate() {
        if grouped.node.contains(cpos) {
            base[i] = Some(Role::Node);
        }
    }

    let mut roles: Vec<BTreeSet<Role>> =
        base.into_iter().map(|r| r.into_iter().collect()).collect();
    for (name, occurrences) in &grouped.members {
        for &(_, start, end) in occurrences {
            for (i, &cpos) in line.cpos.iter().enumerate() {
                if start <= cpos && cpos <= end {
                    roles[i].insert(Role::Discourseme(name.clone()));
                }
            }
        }
    }
    line.roles = roles;
}

/// Deterministic ordering of concordance lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LineOrder {
    #[default]
    First,
    Last,
}

/// Options for concordance retrieval.
#[derive(Debug, Clone)]
pub struct ConcordanceOptions {
    /// Positions further away from the node are marked `out_of_window`.
    pub window: usize,
    pub p_show: Vec<String>,
    pub s_show: Vec<String>,
    pub order: LineOrder,
    pub cut_off: Option<usize>,
}

impl Default for ConcordanceOptions {
    fn default() -> Self {
        ConcordanceOptions {
            window: 5,
            p_show: vec!["word".to_string(), "lemma".to_string()],
            s_show: Vec::new(),
            order: LineOrder::First,
            cut_off: Some(100),
        }
    }
}

impl Constellation {
    /// Render role-annotated concordance lines, one per distinct node match.
    pub fn concordance<C: AttributeLookup>(
        &self,
        corpus: &C,
        options: &ConcordanceOptions,
    ) -> Result<Vec<ConcordanceLine>, Error> {
        if options.window == 0 {
            return Err(Error::Configuration("unsupported window size 0".into()));
        }
        let p_show: Vec<&str> = options.p_show.iter().map(String::as_str).collect();
        let s_show: Vec<&str> = options.s_show.iter().map(String::as_str).collect();

        let mut grouped = self.group_lines();
        if options.order == LineOrder::Last {
            grouped.reverse();
        }
        if let Some(cut_off) = options.cut_off {
            grouped.truncate(cut_off);
        }

        Ok(grouped
            .iter()
            .map(|group| {
                let mut line = render_line(corpus, group, &p_show, &s_show);
                assign_roles(&mut line, group, options.window);
                line
            })
            .collect())
    }
}
