//! One scheduled run: collect → evaluate → apply → persist → format → deliver.
//!
//! Ordering: the state write happens before delivery, so a delivery failure
//! never loses a recorded crash. A failed state write is still announced in
//! the message and then returned as an error.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clock::{market_date, RunMode};
use crate::config::{ConfigError, MonitorConfig, CRASH_TRIGGER_PCT};
use crate::crash::{apply, evaluate, CrashState, PersistenceError, StateStore, TranchePlan};
use crate::data::{MarketCollector, MarketDataProvider};
use crate::notify::{DeliveryError, NotificationSink};
use crate::report::{append_state_warning, MessageFormatter};

/// Fatal run errors. Data and delivery failures are not fatal.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("state write failed: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Inputs of a single run.
pub struct RunContext<'a> {
    pub config: &'a MonitorConfig,
    pub provider: &'a dyn MarketDataProvider,
    pub store: &'a StateStore,
    pub sink: &'a dyn NotificationSink,
    /// Market-local time of the run.
    pub now: DateTime<FixedOffset>,
    pub mode: RunMode,
    pub manual: bool,
    /// Format only: no state write, no delivery.
    pub dry_run: bool,
}

/// What a completed run did.
#[derive(Debug)]
pub struct RunOutcome {
    /// Mode after resolving `Auto`.
    pub mode: RunMode,
    /// Crash state after the run (persisted unless dry run).
    pub state: CrashState,
    /// A new crash tranche was recorded.
    pub fired: bool,
    /// No snapshot; a data-unavailable notice was sent instead.
    pub degraded: bool,
    pub message: String,
    /// `None` on a dry run.
    pub delivery: Option<Result<(), DeliveryError>>,
}

/// Execute one scheduled run. The state is saved before the message is delivered.
pub fn run_once(ctx: &RunContext<'_>) -> Result<RunOutcome, RunError> {
    let config = ctx.config;
    let mode = ctx.mode.resolve(ctx.now, config.eod_hour_minute()?);
    let today = market_date(ctx.now);
    info!(?mode, %today, manual = ctx.manual, dry_run = ctx.dry_run, "starting run");

    let state = ctx.store.load_or_seed();
    let formatter = MessageFormatter::new(
        config.index_name.clone(),
        TranchePlan::from_config(config),
        ctx.now,
    )
    .manual(ctx.manual);

    let snapshot = match MarketCollector::new(ctx.provider, config).fetch() {
        Ok(snapshot) => snapshot,
        Err(unavailable) => {
            warn!(reason = %unavailable.reason, "sending degraded notice");
            let message = formatter.format_unavailable(&unavailable.reason, state.tranche_index);
            let delivery = deliver(ctx, &message);
            return Ok(RunOutcome {
                mode,
                state,
                fired: false,
                degraded: true,
                message,
                delivery,
            });
        }
    };

    let triggered = evaluate(snapshot.change_pct, CRASH_TRIGGER_PCT);
    let (next, fired) = apply(&state, today, triggered);
    if triggered && !fired {
        info!(%today, "crash trigger already handled today");
    }

    let mut save_error = None;
    if fired {
        info!(
            tranche_index = next.tranche_index,
            change_pct = ?snapshot.change_pct,
            "crash tranche fired"
        );
        if !ctx.dry_run {
            if let Err(e) = ctx.store.save(&next) {
                error!(error = %e, "failed to persist crash state");
                save_error = Some(e);
            }
        }
    }

    let mut message = match mode {
        RunMode::Eod => formatter.format_eod(&snapshot, fired, next.tranche_index),
        _ => formatter.format(&snapshot, fired, next.tranche_index),
    };
    if let Some(e) = &save_error {
        append_state_warning(&mut message, &e.to_string());
    }

    let delivery = deliver(ctx, &message);

    if let Some(e) = save_error {
        return Err(RunError::Persistence(e));
    }

    Ok(RunOutcome {
        mode,
        state: next,
        fired,
        degraded: false,
        message,
        delivery,
    })
}

fn deliver(ctx: &RunContext<'_>, message: &str) -> Option<Result<(), DeliveryError>> {
    if ctx.dry_run {
        info!("dry run: delivery skipped");
        return None;
    }
    let result = ctx.sink.send(message);
    if let Err(e) = &result {
        error!(error = %e, "notification delivery failed");
    }
    Some(result)
}
