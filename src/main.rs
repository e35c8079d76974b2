//! Command line front end: label a candump log with a YAML rule file.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use j1939_labeler::candump::read_frames;
use j1939_labeler::dataset::LayerSet;
use j1939_labeler::labeling::{output, records_from_frames, DEFAULT_ANOMALY_LABEL};
use j1939_labeler::{Labeler, LabelerConfig, Summary};

#[derive(Parser, Debug)]
#[command(
    name = "j1939-label",
    author,
    version,
    about = "Label CAN logs using rule-based engine.",
    long_about = "Parse a candump capture, decode the J1939 identifiers and label every message with the rules of a YAML file.\n\nExamples:\n  j1939-label --input drive.log --output drive.csv\n  j1939-label --input flood.log --rules rules.yaml --output flood.csv --layers network --summary"
)]
struct Cli {
    /// Path to candump log file
    #[arg(long)]
    input: PathBuf,

    /// Path to rules.yaml
    #[arg(long, default_value = "rules.yaml")]
    rules: PathBuf,

    /// Output CSV path
    #[arg(long)]
    output: PathBuf,

    /// Comma-separated attack layers whose rules are applied
    #[arg(long, default_value = "all")]
    layers: LayerSet,

    /// Label for firing rules that do not name one
    #[arg(long, default_value = DEFAULT_ANOMALY_LABEL)]
    default_label: String,

    /// Print label statistics when done
    #[arg(long)]
    summary: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli, &mut io::stdout().lock()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let config = LabelerConfig {
        layers: cli.layers,
        default_label: cli.default_label,
    };
    let labeler = Labeler::from_rules_file(config, &cli.rules)
        .with_context(|| format!("loading rules from {}", cli.rules.display()))?;
    info!(
        "Loaded {} rules, applying layers {:?}",
        labeler.rules().len(),
        labeler.config().layers
    );

    let log = read_frames(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let mut records = records_from_frames(log.frames);
    writeln!(out, "Parsed {} messages from log.", records.len())?;

    let annotations = labeler.apply(&mut records);
    info!("{} rule annotations", annotations);

    output::write_csv_file(&cli.output, &records)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    writeln!(out, "Labeled file written to {}", cli.output.display())?;

    if cli.summary {
        write!(out, "{}", Summary::from_records(&records, log.skipped))?;
    }
    Ok(())
}
