use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::Error;
use crate::score::{Counts, Measure, ScorePolicy, effective_measures, score};

/// A pre-aggregated frequency list: item -> count, with the total corpus
/// size the counts were drawn from.
#[derive(Debug, Clone, Default)]
pub struct FrequencyList {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl FrequencyList {
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let counts: BTreeMap<String, usize> =
            counts.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let total = counts.values().sum();
        FrequencyList { counts, total }
    }

    /// Read a TSV frequency list without header: count first, then one or
    /// more item columns which are joined with a space.
    pub fn from_tsv_path(path: &Path) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() < 2 {
                return Err(Error::Parse {
                    path: path.to_path_buf(),
                    message: format!("row {i} has fewer than 2 columns"),
                });
            }
            let count: usize = record[0].trim().parse().map_err(|_| Error::Parse {
                path: path.to_path_buf(),
                message: format!("row {i}: `{}` is not a count", &record[0]),
            })?;
            let item = record.iter().skip(1).collect::<Vec<_>>().join(" ");
            *counts.entry(item).or_insert(0) += count;
        }
        Ok(FrequencyList::from_counts(counts))
    }

    /// Total size of the underlying corpus.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn get(&self, item: &str) -> Option<usize> {
        self.counts.get(item).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Policy for keyword comparison.
#[derive(Debug, Clone)]
pub struct KeywordsOptions {
    /// Minimum frequency in the reference list (drops hapax legomena).
    pub min_freq: usize,
    pub order: Measure,
    pub cut_off: Option<usize>,
    /// Measures to compute; empty means all.
    pub measures: Vec<Measure>,
    /// Also report items attested only in the target list.
    pub lonely: bool,
}

impl Default for KeywordsOptions {
    fn default() -> Self {
        KeywordsOptions {
            min_freq: 2,
            order: Measure::LogRatio,
            cut_off: None,
            measures: Vec::new(),
            lonely: true,
        }
    }
}

/// One item scored for keyness between two corpora.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordRow {
    pub item: String,
    /// Frequency in the target corpus.
    pub o11: usize,
    /// Frequency in the reference corpus.
    pub o12: usize,
    /// Parts per million in target and reference.
    pub ppm1: f64,
    pub ppm2: f64,
    pub e11: f64,
    pub scores: BTreeMap<String, f64>,
}

/// An item attested only in the target list.
#[derive(Debug, Clone, Serialize)]
pub struct LonelyRow {
    pub item: String,
    pub freq: usize,
    pub ppm: f64,
}

/// Result of a keyword comparison.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordResult {
    pub keywords: Vec<KeywordRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lonely: Option<Vec<LonelyRow>>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Binary log of the ratio of per-corpus rates, zero cells discounted to 0.5.
fn keyness_log_ratio(o11: usize, o12: usize, c1: usize, c2: usize) -> f64 {
    let o11 = if o11 == 0 { 0.5 } else { o11 as f64 };
    let o12 = if o12 == 0 { 0.5 } else { o12 as f64 };
    ((o11 / c1 as f64) / (o12 / c2 as f64)).log2()
}

/// Keywords of `target` against `reference`.
///
/// Items are compared on the 2x2 table `O11` (target frequency), `O12`
/// (reference frequency), `f1 = O11 + O12`, `f2 = C1`, `N = C1 + C2`, scored
/// with the same measures as collocates but without the anti-collocate
/// filter: keyness ranking is two-sided, negative keywords stay in the table.
pub fn keywords_first(
    target: &FrequencyList,
    reference: &FrequencyList,
    options: &KeywordsOptions,
) -> Result<KeywordResult, Error> {
    let policy = ScorePolicy {
        min_freq: options.min_freq,
        order: options.order,
        cut_off: options.cut_off,
        measures: options.measures.clone(),
        anti_collocates: false,
    };
    let measures = effective_measures(&policy)?;
    let order = options.order.name();

    let c1 = target.total();
    let c2 = reference.total();
    let n = c1 + c2;

    let mut keywords = Vec::new();
    for (item, &o11) in &target.counts {
        let Some(o12) = reference.get(item) else {
            continue;
        };
        if o12 < options.min_freq {
            continue;
        }
        let counts = Counts {
            o11: o11 as f64,
            f1: (o11 + o12) as f64,
            f2: c1 as f64,
            n: n as f64,
        };
        let e11 = counts.expected();
        let mut scores: BTreeMap<String, f64> = measures
            .iter()
            .map(|m| (m.name().to_string(), score(*m, &counts)))
            .collect();
        // keyness log-ratio compares rates per corpus, not per item row
        if scores.contains_key(Measure::LogRatio.name()) {
            scores.insert(
                Measure::LogRatio.name().to_string(),
                round2(keyness_log_ratio(o11, o12, c1, c2)),
            );
        }
        keywords.push(KeywordRow {
            item: item.clone(),
            o11,
            o12,
            ppm1: round2(o11 as f64 / c1 as f64 * 1_000_000.0),
            ppm2: round2(o12 as f64 / c2 as f64 * 1_000_000.0),
            e11,
            scores,
        });
    }

    keywords.sort_by(|a, b| {
        let sa = a.scores[order];
        let sb = b.scores[order];
        sb.total_cmp(&sa).then_with(|| a.item.cmp(&b.item))
    });
    if let Some(cut_off) = options.cut_off {
        keywords.truncate(cut_off);
    }

    let lonely = options
        .lonely
        .then(|| lonely_items(target, reference));

    Ok(KeywordResult { keywords, lonely })
}

/// Keywords of `reference` against `target`: the explicit counterpart of
/// [`keywords_first`] with the two lists swapped.
pub fn keywords_second(
    target: &FrequencyList,
    reference: &FrequencyList,
    options: &KeywordsOptions,
) -> Result<KeywordResult, Error> {
    keywords_first(reference, target, options)
}

/// Items attested only in the target list, ranked by frequency (descending,
/// then item descending), with parts-per-million normalization.
pub fn lonely_items(target: &FrequencyList, reference: &FrequencyList) -> Vec<LonelyRow> {
    let c1 = target.total();
    let mut rows: Vec<LonelyRow> = target
        .counts
        .iter()
        .filter(|(item, _)| reference.get(item).is_none())
        .map(|(item, &freq)| LonelyRow {
            item: item.clone(),
            freq,
            ppm: round2(freq as f64 / c1 as f64 * 1_000_000.0),
        })
        .collect();
    rows.sort_by(|a, b| b.freq.cmp(&a.freq).then_with(|| b.item.cmp(&a.item)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> FrequencyList {
        FrequencyList::from_counts(vec![
            ("government", 40_usize),
            ("people", 30),
            ("quango", 5),
            ("the", 425),
        ])
    }

    fn reference() -> FrequencyList {
        FrequencyList::from_counts(vec![
            ("government", 10_usize),
            ("people", 35),
            ("the", 455),
        ])
    }

    #[test]
    fn contingency_fill_in() {
        let result = keywords_first(&target(), &reference(), &KeywordsOptions::default()).unwrap();
        let row = result
            .keywords
            .iter()
            .find(|r| r.item == "government")
            .unwrap();
        assert_eq!(row.o11, 40);
        assert_eq!(row.o12, 10);
        // f1 = 50, f2 = C1 = 500, N = 1000 => E11 = 25
        assert_eq!(row.e11, 25.0);
        assert_eq!(row.ppm1, 80_000.0);
        assert_eq!(row.ppm2, 20_000.0);
        // (40/500) / (10/500) = 4
        assert_eq!(row.scores["log_ratio"], 2.0);
    }

    #[test]
    fn positive_keywords_rank_first_by_log_ratio() {
        let result = keywords_first(&target(), &reference(), &KeywordsOptions::default()).unwrap();
        let items: Vec<&str> = result.keywords.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(items[0], "government");
        // negative keyness stays in the table (no anti-collocate filter)
        assert!(items.contains(&"people"));
    }

    #[test]
    fn second_entry_point_swaps_the_lists() {
        let options = KeywordsOptions {
            lonely: false,
            ..KeywordsOptions::default()
        };
        let swapped = keywords_second(&target(), &reference(), &options).unwrap();
        let direct = keywords_first(&reference(), &target(), &options).unwrap();
        let a: Vec<&str> = swapped.keywords.iter().map(|r| r.item.as_str()).collect();
        let b: Vec<&str> = direct.keywords.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn min_freq_drops_reference_hapaxes() {
        let reference = FrequencyList::from_counts(vec![("government", 1_usize), ("the", 455)]);
        let result = keywords_first(&target(), &reference, &KeywordsOptions::default()).unwrap();
        assert!(result.keywords.iter().all(|r| r.item != "government"));
    }

    #[test]
    fn lonely_items_are_ppm_normalized() {
        let result = keywords_first(&target(), &reference(), &KeywordsOptions::default()).unwrap();
        let lonely = result.lonely.unwrap();
        assert_eq!(lonely.len(), 1);
        assert_eq!(lonely[0].item, "quango");
        assert_eq!(lonely[0].freq, 5);
        // 5 / 500 * 1e6
        assert_eq!(lonely[0].ppm, 10_000.0);
    }
}
