//! postcheck
//!
//! Runs the `/posts` contract suite against a live REST server.

use clap::{Parser, Subcommand};
use postcheck_harness::{HarnessConfig, LiveStateReader, Scenario, Suite, SuiteReport, init_logging};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "postcheck")]
#[command(about = "Contract suite for a bearer-protected /posts REST endpoint")]
struct Cli {
    #[command(flatten)]
    config: HarnessConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provision a principal and run the scenarios (default).
    Run {
        /// Only run scenarios whose name starts with PATTERN (repeatable).
        #[arg(long = "only", value_name = "PATTERN")]
        only: Vec<String>,
    },
    /// Provision a principal, reset the collection to the baseline and verify it.
    Resync,
    /// List the scenario catalogue.
    List,
    /// Compare the store file with the baseline.
    Inspect,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    if let Err(errors) = cli.config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let command = cli.command.unwrap_or(Command::Run { only: Vec::new() });
    let ok = match command {
        Command::Run { only } => run(&cli.config, &only).await?,
        Command::Resync => resync(&cli.config).await?,
        Command::List => {
            list();
            true
        }
        Command::Inspect => inspect(&cli.config)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: &HarnessConfig, only: &[String]) -> anyhow::Result<bool> {
    let scenarios = Scenario::select(only);
    if scenarios.is_empty() {
        anyhow::bail!("No scenario matches {:?}; see `postcheck list`", only);
    }

    info!(
        base_url = %config.base_url,
        scenarios = scenarios.len(),
        live_state = config.db_path.is_some(),
        "Starting suite"
    );

    let suite = Suite::new(config)?;
    let report = suite.run(&scenarios).await?;
    print_report(&report);
    Ok(report.is_success())
}

async fn resync(config: &HarnessConfig) -> anyhow::Result<bool> {
    let suite = Suite::new(config)?;
    let credential = suite.setup().await?;
    let report = suite.synchronizer().resync(&credential).await?;
    suite.synchronizer().verify(&credential).await?;
    println!(
        "resync: drained {} post(s), seeded {} post(s); collection matches baseline",
        report.drained, report.seeded
    );
    Ok(true)
}

fn list() {
    for scenario in Scenario::ALL {
        println!("{:<34} {}", scenario.name(), scenario.endpoint());
    }
}

fn inspect(config: &HarnessConfig) -> anyhow::Result<bool> {
    let Some(path) = &config.db_path else {
        anyhow::bail!("inspect needs a store file: pass --db-path or set POSTCHECK_DB_PATH");
    };

    let baseline = config.load_baseline()?;
    let items = LiveStateReader::new(path).post_items()?;
    let diff = baseline.diff_items(&items);

    println!(
        "{}: {} post(s), baseline has {}; {}",
        path.display(),
        items.len(),
        baseline.len(),
        diff.summary()
    );
    Ok(diff.is_clean())
}

fn print_report(report: &SuiteReport) {
    for result in &report.results {
        println!(
            "{:<34} {:>6}ms  {}",
            result.scenario.name(),
            result.duration.as_millis(),
            result.outcome
        );
    }

    if let Some(abort) = &report.aborted {
        println!("aborted before {}: {}", abort.scenario.name(), abort.error);
        for scenario in &report.skipped {
            println!("{:<34} skipped", scenario.name());
        }
    }

    println!(
        "\n{} passed, {} failed, {} errored, {} skipped",
        report.passed(),
        report.failed(),
        report.errored(),
        report.skipped.len()
    );
}
