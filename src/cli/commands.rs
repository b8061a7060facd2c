//! CLI command definitions for coverforge.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogOptions};
use crate::model::builder::DEFAULT_THRESHOLD;
use crate::pipeline::{self, CurationConfig, CurationReport};
use crate::solver::SolveStatus;

/// Default number of rows printed by `coverforge labels`.
const DEFAULT_TOP: usize = 20;

/// Minimum-size subset selection for labeled datasets.
#[derive(Parser)]
#[command(name = "coverforge")]
#[command(about = "Select the smallest subset of labeled items that still covers every frequent label")]
#[command(version)]
#[command(
    long_about = "coverforge reads one comma-separated label file per item, finds every label that occurs at least --threshold times, and selects the fewest items such that each of those labels appears at least --minimum times.\n\nExample usage:\n  coverforge select ./dataset ./curated --threshold 250 --minimum 100"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Solve for a minimum covering subset and write the selection.
    Select(SelectArgs),

    /// Show label frequencies and which labels would require coverage.
    Labels(LabelsArgs),
}

/// Arguments for `coverforge select`.
///
/// Options left unset fall back to the config file, then to defaults.
#[derive(Parser, Debug)]
pub struct SelectArgs {
    /// Directory or glob of label files.
    pub source: Option<String>,

    /// Directory receiving hard links of every selected item's files.
    pub destination: Option<PathBuf>,

    /// YAML file providing defaults for any option not given here.
    #[arg(short = 'c', long, env = "COVERFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Labels occurring at least this many times must be covered [default: 250].
    #[arg(short = 't', long)]
    pub threshold: Option<usize>,

    /// Items that must carry each required label [default: 100].
    #[arg(short = 'm', long)]
    pub minimum: Option<u32>,

    /// Prove optimality instead of accepting the default gap.
    #[arg(long)]
    pub exact: bool,

    /// Selection list path [default: selection.txt].
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Label-file extension when SOURCE is a directory [default: txt].
    #[arg(long)]
    pub extension: Option<String>,

    /// Comma-separated labels to exclude from counting.
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Do not apply the built-in denylist of metadata labels.
    #[arg(long)]
    pub no_default_denylist: bool,

    /// Skip the continuous relaxation stage.
    #[arg(long)]
    pub no_relax: bool,

    /// Maximum number of objective-integrality cuts [default: 0].
    #[arg(long)]
    pub cut_rounds: Option<u32>,

    /// Keep constraints that are implied by others.
    #[arg(long)]
    pub no_reduce: bool,

    /// Seed for branching tie-breaks.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop the search after this many nodes.
    #[arg(long)]
    pub node_limit: Option<u64>,

    /// Stop the search after this many seconds.
    #[arg(long)]
    pub time_limit: Option<u64>,

    /// Milliseconds between progress reports [default: 1000].
    #[arg(long)]
    pub progress_interval_ms: Option<u64>,

    /// Write the model in LP format; a post-cut copy goes to <stem>.cuts.lp.
    #[arg(long)]
    pub write_model: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `coverforge labels`.
#[derive(Parser, Debug)]
pub struct LabelsArgs {
    /// Directory or glob of label files.
    pub source: String,

    /// Threshold used to mark required labels.
    #[arg(short = 't', long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: usize,

    /// Number of labels to list.
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP)]
    pub top: usize,

    /// Label-file extension when SOURCE is a directory.
    #[arg(long, default_value = "txt")]
    pub extension: String,

    /// Comma-separated labels to exclude from counting.
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Do not apply the built-in denylist of metadata labels.
    #[arg(long)]
    pub no_default_denylist: bool,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Select(args) => run_select_command(args).await,
        Commands::Labels(args) => run_labels_command(args),
    }
}

// ============================================================================
// select
// ============================================================================

/// Layers command-line values over the config file (or defaults).
fn build_config(args: &SelectArgs) -> anyhow::Result<CurationConfig> {
    let mut config = match &args.config {
        Some(path) => CurationConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => CurationConfig::default(),
    };

    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if let Some(destination) = &args.destination {
        config.destination = Some(destination.clone());
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(minimum) = args.minimum {
        config.minimum = minimum;
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(extension) = &args.extension {
        config.extension = extension.clone();
    }
    if let Some(rounds) = args.cut_rounds {
        config.cut_rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(limit) = args.node_limit {
        config.node_limit = Some(limit);
    }
    if let Some(secs) = args.time_limit {
        config.time_limit_secs = Some(secs);
    }
    if let Some(ms) = args.progress_interval_ms {
        config.progress_interval_ms = ms;
    }
    if let Some(path) = &args.write_model {
        config.write_model = Some(path.clone());
    }

    config.exact |= args.exact;
    config.no_default_denylist |= args.no_default_denylist;
    config.no_reduce |= args.no_reduce;
    if args.no_relax {
        config.relax = false;
    }
    for label in &args.ignore {
        if !config.ignore_labels.contains(label) {
            config.ignore_labels.push(label.clone());
        }
    }

    config.validate()?;
    Ok(config)
}

async fn run_select_command(args: SelectArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    info!(
        source = %config.source,
        threshold = config.threshold,
        minimum = config.minimum,
        exact = config.exact,
        "Starting selection"
    );

    let abort = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&abort);
    let listener = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received; keeping the best selection found so far");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });

    let run_flag = Arc::clone(&abort);
    let result = tokio::task::spawn_blocking(move || pipeline::run(&config, &run_flag))
        .await
        .context("Selection task panicked")?;
    listener.abort();
    let report = result?;

    if args.json {
        let json_output = serde_json::to_string_pretty(&report)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        print_report(&report);
    }

    if report.status == SolveStatus::Infeasible {
        anyhow::bail!("No selection satisfies every coverage constraint");
    }
    Ok(())
}

fn print_report(report: &CurationReport) {
    let mark = match report.status {
        SolveStatus::Optimal | SolveStatus::FeasibleWithinGap => "✓",
        SolveStatus::Aborted => "!",
        SolveStatus::Infeasible => "✗",
    };
    println!("{} Selection {}", mark, report.status);
    println!(
        "  Items: {} selected of {}",
        report.selected.len(),
        report.items
    );
    println!(
        "  Labels: {} counted, {} required",
        report.labels, report.required_labels
    );
    println!(
        "  Constraints: {} -> {} after reduction",
        report.reduction.before, report.reduction.after
    );
    if let Some(relaxation) = &report.relaxation {
        if let Some(bound) = relaxation.initial_bound {
            println!("  Relaxation bound: {:.3}", bound);
        }
        if !relaxation.cuts.is_empty() {
            println!(
                "  Cuts: {} added, bound {:.3}",
                relaxation.cuts.len(),
                relaxation.final_bound.unwrap_or(f64::NAN)
            );
        }
    }
    if let Some(objective) = report.objective {
        print!("  Objective: {}", objective.round());
        match report.gap {
            Some(gap) => println!(" (gap {:.3})", gap),
            None => println!(),
        }
    }
    println!(
        "  Search: {} nodes, {} LP solves, {:.2}s",
        report.nodes, report.iterations, report.solve_secs
    );
    match &report.selection_path {
        Some(path) => println!("  Selection list: {}", path.display()),
        None => println!("  Selection list: not written"),
    }
    if let Some(linked) = report.linked {
        println!(
            "  Linked files: {} ({} failed)",
            linked,
            report.materialize_failures.len()
        );
    }
    for shortfall in &report.shortfalls {
        println!(
            "  Under-covered: {} ({} of {})",
            shortfall.label, shortfall.covered, shortfall.required
        );
    }
}

// ============================================================================
// labels
// ============================================================================

/// One row of the `labels` output.
#[derive(Debug, Serialize)]
struct LabelRow {
    name: String,
    count: usize,
    required: bool,
}

#[derive(Debug, Serialize)]
struct LabelsOutput {
    items: usize,
    labels: usize,
    required: usize,
    threshold: usize,
    top: Vec<LabelRow>,
}

fn run_labels_command(args: LabelsArgs) -> anyhow::Result<()> {
    let mut options = CatalogOptions::default()
        .with_extension(args.extension.as_str())
        .deny(args.ignore.iter().cloned());
    if args.no_default_denylist {
        options = options.with_denylist(args.ignore.iter().cloned().collect());
    }

    let catalog = Catalog::load(&args.source, &options)
        .with_context(|| format!("Failed to load label files from '{}'", args.source))?;
    let table = catalog.labels();

    let output = LabelsOutput {
        items: catalog.len(),
        labels: table.len(),
        required: table.required(args.threshold).len(),
        threshold: args.threshold,
        top: table
            .top(args.top)
            .into_iter()
            .map(|label| LabelRow {
                required: label.count >= args.threshold,
                name: label.name,
                count: label.count,
            })
            .collect(),
    };

    if args.json {
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        println!(
            "{} items, {} labels, {} required at threshold {}",
            output.items, output.labels, output.required, output.threshold
        );
        for row in &output.top {
            let mark = if row.required { "*" } else { " " };
            println!("  {} {:>8}  {}", mark, row.count, row.name);
        }
    }
    Ok(())
}
