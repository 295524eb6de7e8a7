use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use covreport::config::{self, Config};
use covreport::coverage::{evaluate_thresholds, format_pct, parse_coverage, Metric, Summary, ThresholdMap};
use covreport::notifications::{post_or_update_comment, CommentAction, GithubTarget};
use covreport::report::{self, CommentOptions};

const CONFIG_FILE: &str = "covreport.toml";

#[derive(Parser)]
#[command(name = "covreport")]
#[command(about = "LCOV coverage summaries, threshold checks and pull request comments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: covreport.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// LCOV report to read (default: coverage/lcov.info)
    #[arg(long, global = true)]
    lcov_path: Option<PathBuf>,

    /// Minimum line coverage percentage
    #[arg(long, global = true)]
    min_coverage: Option<f64>,

    /// Metric threshold as <metric>=<pct> (repeatable)
    #[arg(long = "threshold", global = true, value_name = "METRIC=PCT")]
    thresholds: Vec<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, check thresholds, post the pull request comment, fail on unmet thresholds
    Run {
        /// Also write the rendered comment to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print coverage per metric and fail on unmet thresholds
    Check,

    /// Render the pull request comment
    Render {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the JSON coverage summary
    Summary,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match cli.config {
        Some(ref path) => {
            Config::load(path).with_context(|| format!("Could not load {}", path.display()))?
        }
        None => Config::load_or_default(Path::new(CONFIG_FILE))?,
    };

    let thresholds = resolve_thresholds(&config, cli.min_coverage, &cli.thresholds)?;
    let lcov_path = cli
        .lcov_path
        .unwrap_or_else(|| config.coverage.lcov_path.clone());

    log::info!("Reading LCOV file from: {}", lcov_path.display());
    let summary = parse_coverage(&lcov_path)?;
    log::info!("Parsed coverage data for {} files", summary.files.len());

    match cli.command {
        Commands::Run { output } => cmd_run(&config, &summary, &thresholds, output.as_deref()),
        Commands::Check => cmd_check(&summary, &thresholds),
        Commands::Render { output } => {
            cmd_render(&summary, &config.comment_options(&thresholds), output.as_deref())
        }
        Commands::Summary => cmd_summary(&summary),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Config thresholds, then `--min-coverage` (lines), then `--threshold` flags
fn resolve_thresholds(
    config: &Config,
    min_coverage: Option<f64>,
    args: &[String],
) -> Result<ThresholdMap> {
    let mut thresholds = config.thresholds.to_map();

    if let Some(pct) = min_coverage {
        config::validate_threshold(Metric::Lines, pct)?;
        thresholds.set(Metric::Lines, pct);
    }

    for arg in args {
        let (metric, pct) = config::parse_threshold_arg(arg)?;
        thresholds.set(metric, pct);
    }

    Ok(thresholds)
}

fn cmd_run(
    config: &Config,
    summary: &Summary,
    thresholds: &ThresholdMap,
    output: Option<&Path>,
) -> Result<()> {
    let verdict = evaluate_thresholds(summary, Some(thresholds));
    log::info!("Threshold check: {}", verdict.summary);

    let options = config.comment_options(thresholds);
    let body = report::render_comment(summary, &options);
    log::info!("Generated coverage comment");

    if let Some(path) = output {
        fs::write(path, &body)
            .with_context(|| format!("Failed to write comment to {}", path.display()))?;
    }

    let env = |key: &str| std::env::var(key).ok();
    match config.github_target(env) {
        Some(target) => {
            let pr_number = config.pr_number(env);
            match publish_comment(&target, &options.marker, pr_number, &body) {
                Ok(CommentAction::Created(id)) => {
                    println!("{} Posted coverage comment {}", "✓".green(), id)
                }
                Ok(CommentAction::Updated(id)) => {
                    println!("{} Updated coverage comment {}", "✓".green(), id)
                }
                Ok(CommentAction::Skipped) => {
                    log::info!("No PR context found, skipping comment creation")
                }
                Err(e) => log::warn!("Failed to post comment: {:#}", e),
            }
        }
        None => log::warn!("No GitHub token or repository provided, skipping comment creation"),
    }

    if !verdict.passed {
        eprintln!("{}", "Coverage thresholds not met:".red().bold());
        for failure in &verdict.failures {
            eprintln!("{}", failure);
        }
        std::process::exit(1);
    }

    println!("{} Coverage report completed successfully", "✓".green());
    Ok(())
}

#[tokio::main]
async fn publish_comment(
    target: &GithubTarget,
    marker: &str,
    pr_number: Option<u64>,
    body: &str,
) -> Result<CommentAction> {
    post_or_update_comment(target, marker, pr_number, body).await
}

fn cmd_check(summary: &Summary, thresholds: &ThresholdMap) -> Result<()> {
    println!(
        "\n{} {} ({} files)\n",
        "📊".cyan(),
        "Coverage".bold(),
        summary.files.len()
    );

    for metric in Metric::ALL {
        let record = summary.total.metric(metric);
        let counts = format!("{}/{}", record.covered, record.total).dimmed();

        match thresholds.get(metric) {
            Some(min) => {
                let status = if record.pct >= min { "✓".green() } else { "✗".red() };
                println!(
                    "  {} {}: {}% {} (threshold: {}%)",
                    status,
                    metric.display_name(),
                    format_pct(record.pct),
                    counts,
                    format_pct(min)
                );
            }
            None => println!(
                "  {} {}: {}% {}",
                "•".cyan(),
                metric.display_name(),
                format_pct(record.pct),
                counts
            ),
        }
    }
    println!();

    let verdict = evaluate_thresholds(summary, Some(thresholds));
    verdict.print_summary();

    if !verdict.passed {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_render(summary: &Summary, options: &CommentOptions, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            report::write_comment(summary, options, path)?;
            println!(
                "{} Comment written: {}",
                "📝".cyan(),
                path.display().to_string().green()
            );
        }
        None => println!("{}", report::render_comment(summary, options)),
    }

    Ok(())
}

fn cmd_summary(summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    println!("{}", json);
    Ok(())
}
