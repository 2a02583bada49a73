use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::Error;

/// Association measures over a 2x2 contingency table.
///
/// Each measure is a pure function of the four counts `(O11, f1, f2, N)`;
/// everything else (expected frequencies, marginal totals) derives from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Measure {
    LogLikelihood,
    LogRatio,
    MutualInformation,
    Dice,
    LogDice,
    TScore,
    ZScore,
}

impl Measure {
    pub fn all() -> &'static [Measure] {
        &[
            Measure::LogLikelihood,
            Measure::LogRatio,
            Measure::MutualInformation,
            Measure::Dice,
            Measure::LogDice,
            Measure::TScore,
            Measure::ZScore,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Measure::LogLikelihood => "log_likelihood",
            Measure::LogRatio => "log_ratio",
            Measure::MutualInformation => "mutual_information",
            Measure::Dice => "dice",
            Measure::LogDice => "log_dice",
            Measure::TScore => "t_score",
            Measure::ZScore => "z_score",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Measure::all()
            .iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| Error::Configuration(format!("unknown association measure `{s}`")))
    }
}

/// Counts of a 2x2 contingency table: `O11` observed co-occurrences, `f1`
/// first marginal (window size in positions), `f2` second marginal
/// (background frequency), `N` universe size.
#[derive(Debug, Clone, Copy)]
pub struct Counts {
    pub o11: f64,
    pub f1: f64,
    pub f2: f64,
    pub n: f64,
}

impl Counts {
    /// Expected co-occurrence count under independence.
    pub fn expected(&self) -> f64 {
        self.f1 * self.f2 / self.n
    }
}

/// Evaluate one measure on one table.
pub fn score(measure: Measure, c: &Counts) -> f64 {
    match measure {
        Measure::LogLikelihood => log_likelihood(c),
        Measure::LogRatio => log_ratio(c),
        Measure::MutualInformation => mutual_information(c),
        Measure::Dice => dice(c),
        Measure::LogDice => 14.0 + dice(c).log2(),
        Measure::TScore => t_score(c),
        Measure::ZScore => z_score(c),
    }
}

/// Log-likelihood ratio statistic (G2) over the full 2x2 table.
fn log_likelihood(c: &Counts) -> f64 {
    let observed = [
        [c.o11, c.f1 - c.o11],
        [c.f2 - c.o11, c.n - c.f1 - c.f2 + c.o11],
    ];
    let rows = [c.f1, c.n - c.f1];
    let cols = [c.f2, c.n - c.f2];
    let mut g2 = 0.0;
    for (i, row) in observed.iter().enumerate() {
        for (j, &o) in row.iter().enumerate() {
            if o > 0.0 {
                let e = rows[i] * cols[j] / c.n;
                g2 += o * (o / e).ln();
            }
        }
    }
    2.0 * g2
}

/// Binary log of relative risk, zero cells discounted to 0.5.
fn log_ratio(c: &Counts) -> f64 {
    let o21 = c.f2 - c.o11;
    let o11 = if c.o11 == 0.0 { 0.5 } else { c.o11 };
    let o21 = if o21 == 0.0 { 0.5 } else { o21 };
    ((o11 / c.f1) / (o21 / (c.n - c.f1))).log2()
}

fn mutual_information(c: &Counts) -> f64 {
    (c.o11 / c.expected()).log10()
}

fn dice(c: &Counts) -> f64 {
    2.0 * c.o11 / (c.f1 + c.f2)
}

fn t_score(c: &Counts) -> f64 {
    if c.o11 == 0.0 {
        return 0.0;
    }
    (c.o11 - c.expected()) / c.o11.sqrt()
}

fn z_score(c: &Counts) -> f64 {
    (c.o11 - c.expected()) / c.expected().sqrt()
}

/// Observed counts for one candidate item, before scoring.
#[derive(Debug, Clone)]
pub struct ItemCounts {
    pub item: String,
    pub o11: usize,
    pub f1: usize,
    pub f2: usize,
    /// Frequency inside the excluded node/discourseme positions, carried
    /// through for display when requested.
    pub in_nodes: Option<usize>,
    /// Corpus-wide marginal, carried through for display when requested.
    pub marginal: Option<usize>,
}

/// Filtering, ordering and truncation policy for scored tables.
#[derive(Debug, Clone)]
pub struct ScorePolicy {
    /// Minimum observed co-occurrence frequency.
    pub min_freq: usize,
    /// Measure used for descending ranking; must be among `measures`.
    pub order: Measure,
    /// Keep at most this many rows; `None` keeps all.
    pub cut_off: Option<usize>,
    /// Measures to compute; empty means all.
    pub measures: Vec<Measure>,
    /// Discard items observed less often than chance predicts (`O11 < E11`).
    pub anti_collocates: bool,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        ScorePolicy {
            min_freq: 2,
            order: Measure::LogLikelihood,
            cut_off: None,
            measures: Vec::new(),
            anti_collocates: true,
        }
    }
}

/// One scored item in a ranked table.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRow {
    pub item: String,
    pub o11: usize,
    pub e11: f64,
    /// Measure name -> value, for every computed measure.
    pub scores: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal: Option<usize>,
}

impl ScoredRow {
    pub fn score(&self, measure: Measure) -> Option<f64> {
        self.scores.get(measure.name()).copied()
    }
}

/// Resolve the requested measure selection, checking that the ordering
/// measure is actually computed.
pub fn effective_measures(policy: &ScorePolicy) -> Result<Vec<Measure>, Error> {
    let measures = if policy.measures.is_empty() {
        Measure::all().to_vec()
    } else {
        policy.measures.clone()
    };
    if !measures.contains(&policy.order) {
        return Err(Error::Configuration(format!(
            "ordering measure `{}` is not among the computed measures",
            policy.order
        )));
    }
    Ok(measures)
}

/// Score, filter, rank and truncate candidate items.
///
/// Applies the `min_freq` floor, computes expected frequencies and all
/// requested measures, optionally removes anti-collocates, sorts descending
/// by the ordering measure (ties broken by item, ascending) and truncates
/// to `cut_off`.
pub fn score_counts(items: Vec<ItemCounts>, n: usize, policy: &ScorePolicy) -> Result<Vec<ScoredRow>, Error> {
    let measures = effective_measures(policy)?;
    let order = policy.order.name();

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        if item.o11 < policy.min_freq {
            continue;
        }
        let counts = Counts {
            o11: item.o11 as f64,
            f1: item.f1 as f64,
            f2: item.f2 as f64,
            n: n as f64,
        };
        let e11 = counts.expected();
        if policy.anti_collocates && (item.o11 as f64) < e11 {
            continue;
        }
        let scores = measures
            .iter()
            .map(|m| (m.name().to_string(), score(*m, &counts)))
            .collect();
        rows.push(ScoredRow {
            item: item.item,
            o11: item.o11,
            e11,
            scores,
            in_nodes: item.in_nodes,
            marginal: item.marginal,
        });
    }

    rows.sort_by(|a, b| {
        let sa = a.scores[order];
        let sb = b.scores[order];
        sb.total_cmp(&sa).then_with(|| a.item.cmp(&b.item))
    });
    if let Some(cut_off) = policy.cut_off {
        rows.truncate(cut_off);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(o11: usize, f1: usize, f2: usize, n: usize) -> Counts {
        Counts {
            o11: o11 as f64,
            f1: f1 as f64,
            f2: f2 as f64,
            n: n as f64,
        }
    }

    fn item(name: &str, o11: usize, f1: usize, f2: usize) -> ItemCounts {
        ItemCounts {
            item: name.to_string(),
            o11,
            f1,
            f2,
            in_nodes: None,
            marginal: None,
        }
    }

    #[test]
    fn expected_frequency_scenario() {
        let c = counts(10, 100, 50, 10_000);
        assert_eq!(c.expected(), 0.5);
        // O11 >= E11: survives the anti-collocate filter
        let rows = score_counts(
            vec![item("x", 10, 100, 50)],
            10_000,
            &ScorePolicy::default(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].e11, 0.5);
    }

    #[test]
    fn log_likelihood_positive_for_attraction() {
        let attracted = counts(10, 100, 50, 10_000);
        assert!(score(Measure::LogLikelihood, &attracted) > 0.0);
        // independence: O11 == E11 gives G2 of zero
        let independent = counts(5, 100, 500, 10_000);
        assert!(score(Measure::LogLikelihood, &independent).abs() < 1e-9);
    }

    #[test]
    fn mutual_information_of_chance_is_zero() {
        let independent = counts(5, 100, 500, 10_000);
        assert!(score(Measure::MutualInformation, &independent).abs() < 1e-9);
        let attracted = counts(50, 100, 500, 10_000);
        assert!((score(Measure::MutualInformation, &attracted) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn log_ratio_discounts_zero_reference_cell() {
        // all f2 occurrences inside the window: O21 == 0 gets the 0.5 discount
        let c = counts(8, 100, 8, 10_000);
        let lr = score(Measure::LogRatio, &c);
        assert!(lr.is_finite());
        assert!(lr > 0.0);
    }

    #[test]
    fn anti_collocate_rows_are_dropped() {
        // O11 far below E11
        let rows = score_counts(
            vec![item("rare", 2, 1_000, 5_000)],
            10_000,
            &ScorePolicy::default(),
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn min_freq_is_monotone() {
        let items: Vec<ItemCounts> = (1..=5)
            .map(|i| item(&format!("w{i}"), i, 100, 10))
            .collect();
        let mut previous = usize::MAX;
        for min_freq in 0..=6 {
            let policy = ScorePolicy {
                min_freq,
                ..ScorePolicy::default()
            };
            let rows = score_counts(items.clone(), 10_000, &policy).unwrap();
            assert!(rows.len() <= previous);
            previous = rows.len();
        }
    }

    #[test]
    fn ranking_is_deterministic_with_item_tie_break() {
        // identical counts: ordering falls back to the item, ascending
        let items = vec![
            item("zeta", 5, 100, 20),
            item("alpha", 5, 100, 20),
            item("mid", 5, 100, 20),
        ];
        let rows = score_counts(items.clone(), 10_000, &ScorePolicy::default()).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(order, vec!["alpha", "mid", "zeta"]);
        let again = score_counts(items, 10_000, &ScorePolicy::default()).unwrap();
        let order_again: Vec<&str> = again.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(order, order_again);
    }

    #[test]
    fn unknown_order_measure_is_a_configuration_error() {
        let policy = ScorePolicy {
            order: Measure::LogDice,
            measures: vec![Measure::LogLikelihood],
            ..ScorePolicy::default()
        };
        let result = score_counts(vec![item("x", 5, 100, 20)], 10_000, &policy);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn cut_off_truncates_after_ranking() {
        let items = vec![
            item("a", 20, 100, 30),
            item("b", 5, 100, 30),
            item("c", 10, 100, 30),
        ];
        let policy = ScorePolicy {
            cut_off: Some(2),
            min_freq: 0,
            ..ScorePolicy::default()
        };
        let rows = score_counts(items, 10_000, &policy).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item, "a");
        assert_eq!(rows[1].item, "c");
    }

    #[test]
    fn measure_names_round_trip() {
        for m in Measure::all() {
            assert_eq!(m.name().parse::<Measure>().unwrap(), *m);
        }
        assert!("tf_idf".parse::<Measure>().is_err());
    }
}
