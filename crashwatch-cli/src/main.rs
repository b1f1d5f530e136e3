//! Crashwatch CLI — scheduled market crash check and state inspection.
//!
//! Commands:
//! - `run` — one scheduled run: fetch, evaluate, persist, notify
//! - `state` — print the persisted crash state
//!
//! Credentials come from the environment (`BOT_TOKEN`, `CHAT_ID`); a `.env`
//! file in the working directory is honored for local runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crashwatch_core::data::CircuitBreaker;
use crashwatch_core::{
    market_now, run_once, Credentials, MonitorConfig, RunContext, RunError, RunMode, StateStore,
    TelegramNotifier, TranchePlan, YahooProvider,
};

#[derive(Parser)]
#[command(
    name = "crashwatch",
    about = "Crashwatch — scheduled market crash notifier with staged tranche tracking"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scheduled check and send the notification.
    Run {
        /// Message kind. `auto` sends the end-of-day summary at the configured time.
        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,

        /// Mark the run as manually dispatched.
        #[arg(long, default_value_t = false)]
        manual: bool,

        /// Print the message instead of sending it; never writes state.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Path to the persisted crash state.
        #[arg(long, default_value = "crash_state.json")]
        state_file: PathBuf,

        /// Optional TOML config overriding the compiled-in defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the persisted crash state.
    State {
        /// Path to the persisted crash state.
        #[arg(long, default_value = "crash_state.json")]
        state_file: PathBuf,

        /// Optional TOML config (for the tranche plan size).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Check,
    Eod,
    Auto,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Check => RunMode::Check,
            ModeArg::Eod => RunMode::Eod,
            ModeArg::Auto => RunMode::Auto,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            mode,
            manual,
            dry_run,
            state_file,
            config,
        } => run_check(mode.into(), manual, dry_run, &state_file, config.as_deref()),
        Commands::State { state_file, config } => show_state(&state_file, config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(MonitorConfig::default()),
    }
}

fn run_check(
    mode: RunMode,
    manual: bool,
    dry_run: bool,
    state_file: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let credentials = Credentials::from_env();
    if !credentials.is_complete() && !dry_run {
        warn!("BOT_TOKEN / CHAT_ID not set; the notification will not be delivered");
    }

    let provider = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
    let notifier = TelegramNotifier::new(credentials)?;
    let store = StateStore::new(state_file);

    let ctx = RunContext {
        config: &config,
        provider: &provider,
        store: &store,
        sink: &notifier,
        now: market_now(),
        mode,
        manual,
        dry_run,
    };

    let outcome = match run_once(&ctx) {
        Ok(outcome) => outcome,
        Err(RunError::Persistence(e)) => {
            return Err(anyhow::Error::new(e).context("crash state was NOT saved"));
        }
        Err(e) => return Err(e.into()),
    };

    if dry_run {
        println!("{}", outcome.message);
    }

    // Delivery failures are already logged; the state file must still be committed.
    info!(
        mode = ?outcome.mode,
        fired = outcome.fired,
        degraded = outcome.degraded,
        tranche_index = outcome.state.tranche_index,
        delivered = matches!(outcome.delivery, Some(Ok(()))),
        "run completed"
    );
    Ok(())
}

fn show_state(state_file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let plan = TranchePlan::from_config(&config);
    let state = StateStore::new(state_file)
        .load()
        .with_context(|| format!("reading {}", state_file.display()))?;

    println!("State file:      {}", state_file.display());
    println!("Schema version:  {}", state.schema_version);
    println!(
        "Last crash date: {}",
        state
            .last_crash_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".into())
    );
    println!(
        "Crashes used:    {}/{}",
        state.tranche_index,
        plan.total_tranches()
    );
    match plan.amount_for(state.tranche_index.saturating_add(1)) {
        Some(amount) => println!("Next tranche:    ₹{amount}"),
        None => println!("Next tranche:    none (plan exhausted)"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
