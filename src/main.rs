#![forbid(unsafe_code)]
//! # discoursemes CLI
//!
//! Command-line interface for the `discoursemes` crate: build a discourseme
//! constellation from span tables, export role-annotated concordance lines
//! and windowed collocate rankings, or compare two frequency lists.
//!
//! Inputs are plain TSV: a token stream (one row per corpus position, one
//! column per attribute layer), span tables with header
//! `match matchend contextid context contextend`, and headerless frequency
//! lists (count first, item columns after).
//!
//! ## Example
//! ```bash
//! discoursemes collocates corpus.tsv nodes.tsv \
//!     --discourseme law=law.tsv --windows 3,5 --order log_likelihood
//! ```
//!
//! See `--help` for all available options.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::error;

use discoursemes::{
    CollocatesOptions, ConcordanceOptions, Constellation, Error, ExportFormat, FrequencyList,
    KeywordsOptions, LineOrder, Measure, SpanTable, TokenCorpus, export_keywords, export_lines,
    export_scored, keywords_first, keywords_second, timestamped_path,
};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score collocates of a constellation per window size
    Collocates {
        #[command(flatten)]
        constellation: ConstellationArgs,

        /// Window sizes around the node
        #[arg(long, value_delimiter = ',', default_value = "3,5,7")]
        windows: Vec<usize>,

        /// Positional attribute layers forming the candidate key
        #[arg(long = "p-show", value_delimiter = ',', default_value = "lemma")]
        p_show: Vec<String>,

        /// Minimum observed co-occurrence frequency
        #[arg(long, default_value_t = 2)]
        min_freq: usize,

        /// Association measure used for ranking
        #[arg(long, value_enum, default_value_t = Measure::LogLikelihood)]
        order: Measure,

        /// Keep at most this many collocates per window
        #[arg(long)]
        cut_off: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Export role-annotated concordance lines
    Concordance {
        #[command(flatten)]
        constellation: ConstellationArgs,

        /// Positions further away from the node are marked out_of_window
        #[arg(long, default_value_t = 5)]
        window: usize,

        /// Positional attribute layers to render
        #[arg(long = "p-show", value_delimiter = ',', default_value = "word,lemma")]
        p_show: Vec<String>,

        /// Line order before the cut-off
        #[arg(long, value_enum, default_value_t = LineOrder::First)]
        order: LineOrder,

        /// Keep at most this many lines
        #[arg(long, default_value_t = 100)]
        cut_off: usize,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compare two frequency lists for keywords
    Keywords {
        /// Target frequency list (TSV: count, item columns)
        target: PathBuf,

        /// Reference frequency list
        reference: PathBuf,

        /// Minimum frequency in the reference list
        #[arg(long, default_value_t = 2)]
        min_freq: usize,

        /// Association measure used for ranking
        #[arg(long, value_enum, default_value_t = Measure::LogRatio)]
        order: Measure,

        /// Keep at most this many keywords
        #[arg(long)]
        cut_off: Option<usize>,

        /// Rank the reference list against the target instead
        #[arg(long)]
        reverse: bool,

        /// Do not report items attested in only one list
        #[arg(long)]
        no_lonely: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args)]
struct ConstellationArgs {
    /// Token corpus TSV, one row per position
    corpus: PathBuf,

    /// Node span table TSV
    nodes: PathBuf,

    /// Additional discourseme span tables, NAME=PATH (repeatable)
    #[arg(long = "discourseme", value_name = "NAME=PATH")]
    discoursemes: Vec<String>,

    /// Attribute layer names of the corpus columns
    #[arg(long, value_delimiter = ',', default_value = "word,lemma")]
    layers: Vec<String>,

    /// Name of the node discourseme
    #[arg(long, default_value = "topic")]
    node_name: String,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output format for export
    #[arg(long, value_enum, default_value_t = ExportFormat::Txt)]
    export_format: ExportFormat,

    /// Output path prefix (default: "discoursemes" in the working directory)
    #[arg(long, default_value = "discoursemes")]
    out: String,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Collocates {
            constellation,
            windows,
            p_show,
            min_freq,
            order,
            cut_off,
            output,
        } => {
            let corpus = TokenCorpus::from_tsv_path(&constellation.corpus, &constellation.layers)?;
            let built = build_constellation(&constellation)?;
            let options = CollocatesOptions {
                windows,
                p_show,
                min_freq,
                order,
                cut_off,
                ..CollocatesOptions::default()
            };
            let tables = built.collocates(&corpus, &options)?;
            for (window, rows) in &tables {
                let path = timestamped_path(
                    &output.out,
                    &format!("collocates_w{window}"),
                    output.export_format,
                );
                export_scored(rows, output.export_format, &path)?;
                println!("window {window}: {} collocates -> {}", rows.len(), path.display());
            }
        }
        Command::Concordance {
            constellation,
            window,
            p_show,
            order,
            cut_off,
            output,
        } => {
            let corpus = TokenCorpus::from_tsv_path(&constellation.corpus, &constellation.layers)?;
            let built = build_constellation(&constellation)?;
            let primary_layer = p_show.first().cloned().unwrap_or_else(|| "word".to_string());
            let options = ConcordanceOptions {
                window,
                p_show,
                s_show: Vec::new(),
                order,
                cut_off: Some(cut_off),
            };
            let lines = built.concordance(&corpus, &options)?;
            let path = timestamped_path(&output.out, "concordance", output.export_format);
            export_lines(&lines, &primary_layer, output.export_format, &path)?;
            println!("{} concordance lines -> {}", lines.len(), path.display());
        }
        Command::Keywords {
            target,
            reference,
            min_freq,
            order,
            cut_off,
            reverse,
            no_lonely,
            output,
        } => {
            let target = FrequencyList::from_tsv_path(&target)?;
            let reference = FrequencyList::from_tsv_path(&reference)?;
            let options = KeywordsOptions {
                min_freq,
                order,
                cut_off,
                measures: Vec::new(),
                lonely: !no_lonely,
            };
            let result = if reverse {
                keywords_second(&target, &reference, &options)?
            } else {
                keywords_first(&target, &reference, &options)?
            };
            let path = timestamped_path(&output.out, "keywords", output.export_format);
            export_keywords(&result, output.export_format, &path)?;
            println!("{} keywords -> {}", result.keywords.len(), path.display());
        }
    }
    Ok(())
}

fn build_constellation(args: &ConstellationArgs) -> Result<Constellation, Error> {
    let node = SpanTable::from_tsv_path(&args.nodes)?;
    let mut constellation = Constellation::new(node, &args.node_name);
    for spec in &args.discoursemes {
        let Some((name, path)) = spec.split_once('=') else {
            return Err(Error::Configuration(format!(
                "expected NAME=PATH for --discourseme, got `{spec}`"
            )));
        };
        let table = SpanTable::from_tsv_path(&PathBuf::from(path))?;
        constellation.add_discourseme(name, table)?;
    }
    Ok(constellation)
}
