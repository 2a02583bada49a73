use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Error;

/// Frequency access to positional (and optionally structural) attributes.
///
/// This is the boundary to the corpus engine: the constellation core only
/// ever asks for sizes, frequencies at given positions, and corpus-wide
/// marginals. Composite keys over several attribute layers are joined with
/// a single space.
pub trait AttributeLookup {
    /// Total number of token positions in the corpus.
    fn corpus_size(&self) -> usize;

    /// Attribute value at one position, `None` if out of range.
    fn token(&self, cpos: usize, layer: &str) -> Option<&str>;

    /// Frequency of each attribute-value combination at the given positions.
    /// Positions outside the corpus are skipped.
    fn frequencies(&self, positions: &[usize], layers: &[&str]) -> BTreeMap<String, usize>;

    /// Corpus-wide frequency of each of the given values. Values without any
    /// occurrence map to 0.
    fn marginals(&self, values: &[&str], layers: &[&str]) -> BTreeMap<String, usize>;

    /// Value of a structural attribute for a context region, if annotated.
    fn structural(&self, _contextid: usize, _attr: &str) -> Option<&str> {
        None
    }
}

/// In-memory corpus: parallel attribute layers over a shared position axis.
///
/// Stands in for the external corpus engine in tests and in the CLI, where
/// tokens arrive pre-annotated as a TSV stream (one row per position, one
/// column per layer).
#[derive(Debug, Clone, Default)]
pub struct TokenCorpus {
    layers: Vec<(String, Vec<String>)>,
    size: usize,
    structural: BTreeMap<String, BTreeMap<usize, String>>,
}

impl TokenCorpus {
    /// Build a corpus from named layers; all layers must have equal length.
    pub fn from_layers(layers: Vec<(String, Vec<String>)>) -> Result<Self, Error> {
        let size = layers.first().map(|(_, v)| v.len()).unwrap_or(0);
        if layers.iter().any(|(_, v)| v.len() != size) {
            return Err(Error::Configuration(
                "attribute layers differ in length".into(),
            ));
        }
        Ok(TokenCorpus {
            layers,
            size,
            structural: BTreeMap::new(),
        })
    }

    /// Read a token stream from a TSV file without header: one row per
    /// position, columns in the order of `layer_names`.
    pub fn from_tsv_path(path: &Path, layer_names: &[String]) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)?;
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); layer_names.len()];
        for (cpos, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() < layer_names.len() {
                return Err(Error::Parse {
                    path: path.to_path_buf(),
                    message: format!(
                        "row {} has {} columns, expected {}",
                        cpos,
                        record.len(),
                        layer_names.len()
                    ),
                });
            }
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(record[i].to_string());
            }
        }
        let layers = layer_names
            .iter()
            .cloned()
            .zip(columns)
            .collect::<Vec<_>>();
        Self::from_layers(layers)
    }

    /// Annotate a context region with a structural attribute value.
    pub fn set_structural(&mut self, attr: &str, contextid: usize, value: &str) {
        self.structural
            .entry(attr.to_string())
            .or_default()
            .insert(contextid, value.to_string());
    }

    fn layer(&self, name: &str) -> Option<&[String]> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Composite key at one position, layer values joined with a space.
    fn key(&self, cpos: usize, layers: &[&str]) -> Option<String> {
        let mut parts = Vec::with_capacity(layers.len());
        for layer in layers {
            parts.push(self.layer(layer)?.get(cpos)?.as_str());
        }
        Some(parts.join(" "))
    }
}

impl AttributeLookup for TokenCorpus {
    fn corpus_size(&self) -> usize {
        self.size
    }

    fn token(&self, cpos: usize, layer: &str) -> Option<&str> {
        self.layer(layer)?.get(cpos).map(String::as_str)
    }

    fn frequencies(&self, positions: &[usize], layers: &[&str]) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for &cpos in positions {
            if let Some(key) = self.key(cpos, layers) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    fn marginals(&self, values: &[&str], layers: &[&str]) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> =
            values.iter().map(|v| (v.to_string(), 0)).collect();
        for cpos in 0..self.size {
            if let Some(key) = self.key(cpos, layers) {
                if let Some(count) = counts.get_mut(&key) {
                    *count += 1;
                }
            }
        }
        counts
    }

    fn structural(&self, contextid: usize, attr: &str) -> Option<&str> {
        self.structural
            .get(attr)
            .and_then(|m| m.get(&contextid))
            .map(String::as_str)
    }
}
