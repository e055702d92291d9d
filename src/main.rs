use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use covmark::action::run_action;
use covmark::github::{GithubClient, DEFAULT_API_URL};
use covmark::{evaluate, load_reports, markdown_report, Config, CoverageReport};

const CONFIG_FILE: &str = "covmark.toml";

#[derive(Parser)]
#[command(name = "covmark")]
#[command(about = "Render coverage reports as pull request markdown and enforce a minimum")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: covmark.toml, optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the markdown report
    Render {
        /// Normalized coverage reports (JSON)
        #[arg(short, long)]
        reports: PathBuf,

        /// Commit the report is rendered against
        #[arg(long)]
        commit: String,

        /// Emit the collapsible variant instead of the flat one
        #[arg(long)]
        structured: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate the minimum coverage threshold
    Check {
        /// Normalized coverage reports (JSON)
        #[arg(short, long)]
        reports: PathBuf,
    },

    /// Comment on the pull request and create a check run
    Action {
        /// Normalized coverage reports (JSON)
        #[arg(short, long)]
        reports: PathBuf,

        /// Workflow event payload (default: $GITHUB_EVENT_PATH)
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = Config::resolve(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    match cli.command {
        Commands::Render {
            reports,
            commit,
            structured,
            output,
        } => cmd_render(&config, &reports, &commit, structured, output.as_deref()),
        Commands::Check { reports } => cmd_check(&config, &reports),
        Commands::Action { reports, event } => cmd_action(&config, &reports, event),
    }
}

fn read_reports(path: &Path) -> Result<Vec<CoverageReport>> {
    load_reports(path).with_context(|| format!("Failed to load reports from {}", path.display()))
}

fn cmd_render(
    config: &Config,
    reports_path: &Path,
    commit: &str,
    structured: bool,
    output: Option<&Path>,
) -> Result<()> {
    let reports = read_reports(reports_path)?;
    let report = markdown_report(&reports, commit, &config.render)?;
    let body = if structured {
        report.structured
    } else {
        report.flat
    };

    match output {
        Some(path) => {
            fs::write(path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Report written: {}",
                "📊".cyan(),
                path.display().to_string().green()
            );
        }
        None => println!("{}", body),
    }

    Ok(())
}

fn cmd_check(config: &Config, reports_path: &Path) -> Result<()> {
    let reports = read_reports(reports_path)?;
    let verdict = evaluate(
        &reports,
        config.render.minimum_coverage,
        &config.render.report_name,
    )?;

    println!("{}", "Coverage threshold:".bold());
    verdict.print_summary();

    if config.action.fail_below_threshold && verdict.below_threshold {
        eprintln!(
            "{} Minimum coverage requirement was not satisfied",
            "✗".red()
        );
        std::process::exit(1);
    }

    Ok(())
}

#[tokio::main]
async fn cmd_action(config: &Config, reports_path: &Path, event: Option<PathBuf>) -> Result<()> {
    let reports = read_reports(reports_path)?;

    let token = config
        .action
        .repo_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GitHub token not found (set INPUT_REPO_TOKEN or GITHUB_TOKEN)"))?;
    let repository = config
        .render
        .repository
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GITHUB_REPOSITORY not set"))?;
    let api_url = std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let client = GithubClient::with_api_url(token, repository, api_url);

    let event_path = event.or_else(|| std::env::var_os("GITHUB_EVENT_PATH").map(PathBuf::from));
    let payload = match event_path {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read event payload: {}", path.display()))?;
            serde_json::from_str(&content).context("Failed to parse event payload")?
        }
        None => serde_json::json!({}),
    };

    let outcome = run_action(&client, config, &reports, &payload).await?;

    if let Some(ref verdict) = outcome.verdict {
        verdict.print_summary();
    }

    if outcome.should_fail(config.action.fail_below_threshold) {
        eprintln!(
            "{} Minimum coverage requirement was not satisfied",
            "✗".red()
        );
        std::process::exit(1);
    }

    Ok(())
}
