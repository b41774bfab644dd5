//! Tradebot CLI: live trading, backtests, logs and configuration.
//!
//! Commands:
//! - `run`: trade live against Alpaca on the configured cadence (or `--once`)
//! - `backtest`: replay CSV bars through the same iteration loop
//! - `logs`: tail the log file or the iteration journal
//! - `config show|init`: print the effective config or write the defaults

mod logging;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use tradebot_core::config::{BotConfig, ConfigRegistry};
use tradebot_core::data::{
    AlpacaClient, HostedSentimentClassifier, NeutralClassifier, SentimentClassifier,
};
use tradebot_core::engine::{Collaborators, IterationReport, TradingIterationController};
use tradebot_core::optimizer::MaxSharpeOptimizer;
use tradebot_core::reviewer::{AzureCompleter, PlanReviewer};
use tradebot_core::rng::SeedHierarchy;
use tradebot_runner::{
    load_dir, run_backtest, BacktestSetup, BacktestWindow, IterationJournal, NewsArchive,
    Scheduler,
};

#[derive(Parser)]
#[command(
    name = "tradebot",
    about = "Tradebot: daily trading bot aggregating news, momentum and risk signals"
)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "tradebot.toml")]
    config: PathBuf,

    /// Override a setting, e.g. `--set momentum.threshold=0.5`. Repeatable.
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Log at debug level (ignored when RUST_LOG is set).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trade live on the configured cadence.
    Run {
        /// Run a single iteration, print its report and exit.
        #[arg(long, default_value_t = false)]
        once: bool,

        /// Stop after this many iterations.
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Replay daily CSV bars through the trading loop with a paper broker.
    Backtest {
        /// Directory holding one `<SYMBOL>.csv` per watchlist symbol.
        #[arg(long)]
        data_dir: PathBuf,

        /// First trading day (YYYY-MM-DD). Defaults to the first bar.
        #[arg(long)]
        start: Option<String>,

        /// Last trading day (YYYY-MM-DD). Defaults to the last bar.
        #[arg(long)]
        end: Option<String>,

        /// Starting cash.
        #[arg(long, default_value_t = 100_000.0)]
        cash: f64,

        /// JSONL headline archive for the news module.
        #[arg(long)]
        news: Option<PathBuf>,

        /// Also append every iteration report to this journal.
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Where to write the result JSON.
        #[arg(long, default_value = "results/backtest.json")]
        output: PathBuf,
    },
    /// Show recent log lines or iteration reports.
    Logs {
        /// Number of lines (or reports with --journal) to show.
        #[arg(long, default_value_t = 50)]
        lines: usize,

        /// Read the iteration journal instead of the log file.
        #[arg(long, default_value_t = false)]
        journal: bool,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (file plus --set overrides).
    Show,
    /// Write the default configuration to the --config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Config {
        action: ConfigAction::Init { force },
    } = &cli.command
    {
        return run_config_init(&cli.config, *force);
    }

    let config = load_config(&cli.config, &cli.overrides)?;
    match cli.command {
        Commands::Logs { lines, journal } => run_logs(&config, lines, journal),
        Commands::Config { .. } => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Run { once, cycles } => {
            logging::init(&config.bot.log_file, cli.verbose)?;
            run_live(config, once, cycles)
        }
        Commands::Backtest {
            data_dir,
            start,
            end,
            cash,
            news,
            journal,
            output,
        } => {
            logging::init(&config.bot.log_file, cli.verbose)?;
            let window = BacktestWindow {
                start: parse_date(start.as_deref())?,
                end: parse_date(end.as_deref())?,
                initial_cash: cash,
            };
            run_backtest_cmd(config, &data_dir, window, news, journal, &output)
        }
    }
}

fn load_config(path: &Path, overrides: &[String]) -> Result<BotConfig> {
    let mut config = if path.exists() {
        BotConfig::load(path).with_context(|| format!("failed to load {}", path.display()))?
    } else {
        BotConfig::default()
    };
    for assignment in overrides {
        config.apply_override(assignment)?;
    }
    config.validate()?;
    Ok(config)
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("dates must be YYYY-MM-DD")
}

/// Configured seed, or a fresh one that is logged so the run can be repeated.
fn seeds(config: &BotConfig) -> SeedHierarchy {
    let seed = config.bot.seed.unwrap_or_else(|| {
        let drawn = rand::random::<u64>();
        tracing::info!(seed = drawn, "no seed configured, drew one (set bot.seed to repeat)");
        drawn
    });
    SeedHierarchy::new(seed)
}

fn classifier(config: &BotConfig) -> Result<Arc<dyn SentimentClassifier>> {
    let classifier: Arc<dyn SentimentClassifier> = match &config.sentiment.endpoint {
        Some(endpoint) => Arc::new(HostedSentimentClassifier::from_env(endpoint.clone())?),
        None => {
            tracing::info!("no sentiment endpoint configured, news reads as neutral");
            Arc::new(NeutralClassifier)
        }
    };
    Ok(classifier)
}

fn reviewer(config: &BotConfig) -> Result<Option<PlanReviewer>> {
    if !config.reviewer.enabled {
        return Ok(None);
    }
    let completer = AzureCompleter::from_env(&config.reviewer)?;
    Ok(Some(PlanReviewer::new(
        Arc::new(completer),
        &config.bot.watchlist,
    )))
}

fn run_live(config: BotConfig, once: bool, cycles: Option<usize>) -> Result<()> {
    let alpaca = Arc::new(AlpacaClient::from_env(config.alpaca.clone())?);
    let collaborators = Collaborators {
        market: alpaca.clone(),
        news: alpaca.clone(),
        classifier: classifier(&config)?,
        broker: alpaca,
        optimizer: Arc::new(MaxSharpeOptimizer::new(config.bot.risk_free_rate)),
    };
    let registry = Arc::new(ConfigRegistry::new(config.signals.clone()));
    let mut controller = TradingIterationController::new(
        config.bot.clone(),
        registry,
        collaborators,
        seeds(&config),
    );
    if let Some(reviewer) = reviewer(&config)? {
        controller = controller.with_reviewer(reviewer);
    }
    let journal = IterationJournal::new(&config.bot.journal_file);

    if once {
        let report = controller.run_iteration();
        record(&journal, &report);
        println!("{}", serde_json::to_string_pretty(&report)?);
        if let Some(abort) = &report.aborted {
            bail!("iteration aborted in {}: {}", abort.phase, abort.reason);
        }
        return Ok(());
    }

    let mut scheduler = Scheduler::with_cadence_hours(config.bot.cadence_hours);
    if let Some(n) = cycles {
        scheduler = scheduler.with_max_cycles(n);
    }
    let cancel = AtomicBool::new(false);
    tracing::info!(
        cadence_hours = config.bot.cadence_hours,
        symbols = config.bot.watchlist.len(),
        "live trading started"
    );
    let ran = scheduler.run(&mut controller, &cancel, |report| {
        record(&journal, report);
        println!("{}", summary_line(report));
    });
    tracing::info!(cycles = ran, "live trading stopped");
    Ok(())
}

fn record(journal: &IterationJournal, report: &IterationReport) {
    if let Err(e) = journal.append(report) {
        tracing::error!(path = %journal.path().display(), error = %e, "failed to journal iteration");
    }
}

fn summary_line(report: &IterationReport) -> String {
    let date = report
        .date
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    match &report.aborted {
        Some(abort) => format!("{date}  aborted in {}: {}", abort.phase, abort.reason),
        None => format!(
            "{date}  proposed {:>3}  orders {:>3}  skipped {:>3}  failed {:>3}",
            report.proposed.len(),
            report.orders.len(),
            report.skipped.len(),
            report.execution_failures.len()
        ),
    }
}

fn run_backtest_cmd(
    config: BotConfig,
    data_dir: &Path,
    window: BacktestWindow,
    news: Option<PathBuf>,
    journal: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let bars = load_dir(data_dir, &config.bot.watchlist)?;
    let news = match news {
        Some(path) => NewsArchive::load(&path)?,
        None => NewsArchive::empty(),
    };
    let setup = BacktestSetup {
        config: config.bot.clone(),
        registry: Arc::new(ConfigRegistry::new(config.signals.clone())),
        news: Arc::new(news),
        classifier: classifier(&config)?,
        optimizer: Arc::new(MaxSharpeOptimizer::new(config.bot.risk_free_rate)),
        reviewer: reviewer(&config)?,
        seeds: seeds(&config),
    };
    let journal = journal.map(IterationJournal::new);

    let result = run_backtest(setup, bars, &window, journal.as_ref())?;
    result.write_json(output)?;

    println!("Backtest {} to {}", result.start, result.end);
    println!("  Initial cash:  {:.2}", result.initial_cash);
    println!("  Final equity:  {:.2}", result.final_equity);
    println!("  Total return:  {:.2}%", result.total_return * 100.0);
    println!("  Fills:         {}", result.fills.len());
    println!("  Result:        {}", output.display());
    Ok(())
}

fn run_logs(config: &BotConfig, lines: usize, journal: bool) -> Result<()> {
    if journal {
        let journal = IterationJournal::new(&config.bot.journal_file);
        for report in journal.tail(lines)? {
            println!("{}", summary_line(&report));
        }
        return Ok(());
    }
    let path = &config.bot.log_file;
    let tail = logging::tail_lines(path, lines)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if tail.is_empty() {
        println!("No log entries yet ({}).", path.display());
    }
    for line in tail {
        println!("{line}");
    }
    Ok(())
}

fn run_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let text = BotConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
