use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use clap::ValueEnum;

use crate::concordance::ConcordanceLine;
use crate::error::Error;
use crate::keywords::KeywordResult;
use crate::score::ScoredRow;

/// Output format for exported result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Txt,
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            ExportFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Output path `<prefix>_<YYYYmmdd_HHMMSS>_<table>.<ext>`.
pub fn timestamped_path(prefix: &str, table: &str, format: ExportFormat) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{prefix}_{stamp}_{table}.{}", format.extension()))
}

/// Export one ranked collocate table.
pub fn export_scored(rows: &[ScoredRow], format: ExportFormat, path: &Path) -> Result<(), Error> {
    match format {
        ExportFormat::Json => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, rows)?;
        }
        ExportFormat::Csv | ExportFormat::Tsv => {
            let measure_names: Vec<&str> = rows
                .first()
                .map(|r| r.scores.keys().map(String::as_str).collect())
                .unwrap_or_default();
            let with_frequencies = rows.first().is_some_and(|r| r.marginal.is_some());
            let mut writer = csv::WriterBuilder::new()
                .delimiter(format.delimiter())
                .from_path(path)?;
            let mut header = vec!["item", "O11", "E11"];
            header.extend(&measure_names);
            if with_frequencies {
                header.extend(["in_nodes", "marginal"]);
            }
            writer.write_record(&header)?;
            for row in rows {
                let mut record = vec![
                    row.item.clone(),
                    row.o11.to_string(),
                    row.e11.to_string(),
                ];
                for name in &measure_names {
                    record.push(row.scores[*name].to_string());
                }
                if with_frequencies {
                    record.push(row.in_nodes.unwrap_or(0).to_string());
                    record.push(row.marginal.unwrap_or(0).to_string());
                }
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
        ExportFormat::Txt => {
            let mut out = String::new();
            for row in rows {
                let scores: Vec<String> = row
                    .scores
                    .iter()
                    .map(|(name, value)| format!("{name}: {value:.4}"))
                    .collect();
                let _ = writeln!(
                    out,
                    "Item: {:?}, O11: {}, E11: {:.4}, {}",
                    row.item,
                    row.o11,
                    row.e11,
                    scores.join(", ")
                );
            }
            File::create(path)?.write_all(out.as_bytes())?;
        }
    }
    Ok(())
}

/// Export a keyword comparison result.
pub fn export_keywords(
    result: &KeywordResult,
    format: ExportFormat,
    path: &Path,
) -> Result<(), Error> {
    match format {
        ExportFormat::Json => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, result)?;
        }
        ExportFormat::Csv | ExportFormat::Tsv => {
            let measure_names: Vec<&str> = result
                .keywords
                .first()
                .map(|r| r.scores.keys().map(String::as_str).collect())
                .unwrap_or_default();
            let mut writer = csv::WriterBuilder::new()
                .delimiter(format.delimiter())
                .from_path(path)?;
            let mut header = vec!["rank", "item", "O11", "ppm_1", "O12", "ppm_2", "E11"];
            header.extend(&measure_names);
            writer.write_record(&header)?;
            for (rank, row) in result.keywords.iter().enumerate() {
                let mut record = vec![
                    (rank + 1).to_string(),
                    row.item.clone(),
                    row.o11.to_string(),
                    row.ppm1.to_string(),
                    row.o12.to_string(),
                    row.ppm2.to_string(),
                    row.e11.to_string(),
                ];
                for name in &measure_names {
                    record.push(row.scores[*name].to_string());
                }
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
        ExportFormat::Txt => {
            let mut out = String::new();
            for (rank, row) in result.keywords.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {:?}: {} vs. {} ({} vs. {} ppm)",
                    rank + 1,
                    row.item,
                    row.o11,
                    row.o12,
                    row.ppm1,
                    row.ppm2
                );
            }
            if let Some(lonely) = &result.lonely {
                let _ = writeln!(out, "\nOnly attested in the target corpus:");
                for row in lonely {
                    let _ = writeln!(out, "{:?}: {} ({} ppm)", row.item, row.freq, row.ppm);
                }
            }
            File::create(path)?.write_all(out.as_bytes())?;
        }
    }
    Ok(())
}

/// Export annotated concordance lines. JSON keeps the full per-position
/// structure; tabular formats get a compact one-row-per-line rendering.
pub fn export_lines(
    lines: &[ConcordanceLine],
    primary_layer: &str,
    format: ExportFormat,
    path: &Path,
) -> Result<(), Error> {
    match format {
        ExportFormat::Json => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, lines)?;
        }
        ExportFormat::Csv | ExportFormat::Tsv => {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(format.delimiter())
                .from_path(path)?;
            writer.write_record(["match", "matchend", "text", "roles"])?;
            for line in lines {
                writer.write_record([
                    line.node.0.to_string(),
                    line.node.1.to_string(),
                    compact_text(line, primary_layer),
                    compact_roles(line),
                ])?;
            }
            writer.flush()?;
        }
        ExportFormat::Txt => {
            let mut out = String::new();
            for line in lines {
                let _ = writeln!(
                    out,
                    "[{}, {}] {}\n    {}",
                    line.node.0,
                    line.node.1,
                    compact_text(line, primary_layer),
                    compact_roles(line)
                );
            }
            File::create(path)?.write_all(out.as_bytes())?;
        }
    }
    Ok(())
}

fn compact_text(line: &ConcordanceLine, primary_layer: &str) -> String {
    line.layers
        .get(primary_layer)
        .map(|tokens| tokens.join(" "))
        .unwrap_or_default()
}

/// `cpos:role|role` for every position that carries at least one role.
fn compact_roles(line: &ConcordanceLine) -> String {
    let mut parts = Vec::new();
    for (i, roles) in line.roles.iter().enumerate() {
        if roles.is_empty() {
            continue;
        }
        let labels: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        parts.push(format!("{}:{}", line.cpos[i], labels.join("|")));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoredRow;
    use std::collections::BTreeMap;

    #[test]
    fn timestamped_path_carries_table_and_extension() {
        let path = timestamped_path("out/results", "collocates_w5", ExportFormat::Tsv);
        let name = path.to_string_lossy().into_owned();
        assert!(name.starts_with("out/results_"));
        assert!(name.ends_with("_collocates_w5.tsv"));
    }

    #[test]
    fn scored_rows_export_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let rows = vec![ScoredRow {
            item: "alpha".into(),
            o11: 3,
            e11: 0.5,
            scores: BTreeMap::from([("log_likelihood".to_string(), 12.5)]),
            in_nodes: Some(1),
            marginal: Some(10),
        }];
        export_scored(&rows, ExportFormat::Csv, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("item,O11,E11,log_likelihood,in_nodes,marginal"));
        assert!(content.contains("alpha,3,0.5,12.5,1,10"));
    }
}
