use std::collections::{BTreeMap, BTreeSet, HashSet};

use rayon::prelude::*;

use crate::constellation::{Constellation, JoinedRow};
use crate::corpus::AttributeLookup;
use crate::error::Error;
use crate::score::{ItemCounts, Measure, ScorePolicy, ScoredRow, score_counts};
use crate::span::Span;

/// One token position inside a context window, tagged with its signed
/// distance to that context's node span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoocPair {
    pub cpos: usize,
    pub offset: i64,
}

/// A distinct context window together with its node span.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow {
    pub node: Span,
    pub window: Span,
}

/// Deduplicate the joined table's contexts by `(context, contextend)`,
/// keeping the first node span seen per window.
pub fn distinct_contexts(df: &[JoinedRow]) -> Vec<ContextWindow> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in df {
        let (Some(node), Some(window)) = (row.node, row.window) else {
            continue;
        };
        if seen.insert((window.start, window.end)) {
            out.push(ContextWindow { node, window });
        }
    }
    out
}

/// Expand context windows into flat `(cpos, offset)` pairs. Offsets are
/// continuous across the window: 0 inside the node span, negative to its
/// left, positive to its right.
pub fn node_to_cooc(contexts: &[ContextWindow]) -> Vec<CoocPair> {
    let mut pairs = Vec::new();
    for context in contexts {
        for cpos in context.window.positions() {
            let offset = if cpos < context.node.start {
                cpos as i64 - context.node.start as i64
            } else if cpos > context.node.end {
                cpos as i64 - context.node.end as i64
            } else {
                0
            };
            pairs.push(CoocPair { cpos, offset });
        }
    }
    pairs
}

/// Options for windowed collocate retrieval.
#[derive(Debug, Clone)]
pub struct CollocatesOptions {
    /// Window sizes to score independently.
    pub windows: Vec<usize>,
    /// Positional attribute layers forming the candidate key.
    pub p_show: Vec<String>,
    pub min_freq: usize,
    pub order: Measure,
    pub cut_off: Option<usize>,
    /// Measures to compute; empty means all.
    pub measures: Vec<Measure>,
    /// Join observed in-node counts and corpus marginals onto the result.
    pub frequencies: bool,
}

impl Default for CollocatesOptions {
    fn default() -> Self {
        CollocatesOptions {
            windows: vec![3, 5, 7],
            p_show: vec!["lemma".to_string()],
            min_freq: 2,
            order: Measure::LogLikelihood,
            cut_off: None,
            measures: Vec::new(),
            frequencies: true,
        }
    }
}

impl Constellation {
    /// Score collocates of the constellation per requested window size.
    ///
    /// Positions claimed by any registered discourseme (the node included)
    /// are excluded from both the positional universe and the background
    /// frequencies. Windows are independent and evaluated in parallel; a
    /// window with no surviving positions yields an empty table.
    pub fn collocates<C>(
        &self,
        corpus: &C,
        options: &CollocatesOptions,
    ) -> Result<BTreeMap<usize, Vec<ScoredRow>>, Error>
    where
        C: AttributeLookup + Sync,
    {
        if options.windows.is_empty() {
            return Err(Error::Configuration("empty set of window sizes".into()));
        }
        if let Some(&w) = options.windows.iter().find(|&&w| w == 0) {
            return Err(Error::Configuration(format!("unsupported window size {w}")));
        }
        let policy = ScorePolicy {
            min_freq: options.min_freq,
            order: options.order,
            cut_off: options.cut_off,
            measures: options.measures.clone(),
            anti_collocates: true,
        };
        // fail fast on a mis-specified ordering measure, before any counting
        crate::score::effective_measures(&policy)?;

        let layers: Vec<&str> = options.p_show.iter().map(String::as_str).collect();

        // positions consumed by any discourseme are not collocate candidates
        let mut excluded: BTreeSet<usize> = BTreeSet::new();
        for (_, table) in self.discoursemes() {
            excluded.extend(table.positions());
        }
        log::info!("excluding {} positions claimed by discoursemes", excluded.len());

        let contexts = distinct_contexts(self.joined());
        let pairs: Vec<CoocPair> = node_to_cooc(&contexts)
            .into_iter()
            .filter(|pair| !excluded.contains(&pair.cpos))
            .collect();

        let n = corpus.corpus_size().saturating_sub(excluded.len());
        let excluded_positions: Vec<usize> = excluded.iter().copied().collect();
        let in_nodes = corpus.frequencies(&excluded_positions, &layers);

        let tables: Result<Vec<(usize, Vec<ScoredRow>)>, Error> = options
            .windows
            .par_iter()
            .map(|&window| {
                let table =
                    window_collocates(corpus, &pairs, &in_nodes, window, &layers, n, &policy, options.frequencies)?;
                Ok((window, table))
            })
            .collect();
        Ok(tables?.into_iter().collect())
    }
}

/// Count and score one window size.
#[allow(clippy::too_many_arguments)]
fn window_collocates<C: AttributeLookup>(
    corpus: &C,
    pairs: &[CoocPair],
    in_nodes: &BTreeMap<String, usize>,
    window: usize,
    layers: &[&str],
    n: usize,
    policy: &ScorePolicy,
    frequencies: bool,
) -> Result<Vec<ScoredRow>, Error> {
    let relevant: Vec<usize> = pairs
        .iter()
        .filter(|pair| pair.offset.unsigned_abs() <= window as u64)
        .map(|pair| pair.cpos)
        .collect();
    let f1 = relevant.len();
    if f1 == 0 {
        return Ok(Vec::new());
    }

    let observed = corpus.frequencies(&relevant, layers);
    let values: Vec<&str> = observed.keys().map(String::as_str).collect();
    let marginals = corpus.marginals(&values, layers);

    let items: Vec<ItemCounts> = observed
        .iter()
        .map(|(value, &o11)| {
            let marginal = marginals.get(value).copied().unwrap_or(0);
            let consumed = in_nodes.get(value).copied().unwrap_or(0);
            ItemCounts {
                item: value.clone(),
                o11,
                f1,
                f2: marginal.saturating_sub(consumed),
                in_nodes: frequencies.then_some(consumed),
                marginal: frequencies.then_some(marginal),
            }
        })
        .collect();

    score_counts(items, n, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(node: (usize, usize), window: (usize, usize)) -> ContextWindow {
        ContextWindow {
            node: Span::new(node.0, node.1).unwrap(),
            window: Span::new(window.0, window.1).unwrap(),
        }
    }

    #[test]
    fn expansion_tags_continuous_offsets() {
        let pairs = node_to_cooc(&[ctx((5, 6), (2, 9))]);
        let offsets: Vec<i64> = pairs.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![-3, -2, -1, 0, 0, 1, 2, 3]);
        let cpos: Vec<usize> = pairs.iter().map(|p| p.cpos).collect();
        assert_eq!(cpos, vec![2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn contexts_dedup_by_window_bounds() {
        use crate::constellation::JoinedRow;
        use std::collections::BTreeMap;
        let row = |node: (usize, usize), window: (usize, usize), contextid| JoinedRow {
            node: Some(Span::new(node.0, node.1).unwrap()),
            contextid,
            window: Some(Span::new(window.0, window.1).unwrap()),
            members: BTreeMap::new(),
        };
        let df = vec![
            row((5, 6), (0, 10), 0),
            row((5, 6), (0, 10), 0),
            row((20, 21), (15, 30), 1),
        ];
        let contexts = distinct_contexts(&df);
        assert_eq!(contexts.len(), 2);
    }
}
