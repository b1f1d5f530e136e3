//! Crashwatch Core — scheduled market check, crash tranche state, notifications.
//!
//! One scheduled run does, in order:
//! - Collect a market snapshot (index level and change, VIX, movers)
//! - Evaluate the day's change against the crash threshold
//! - Advance the tranche counter at most once per market date
//! - Persist the state atomically, before any delivery attempt
//! - Format and deliver a text notification

pub mod clock;
pub mod config;
pub mod crash;
pub mod data;
pub mod notify;
pub mod pipeline;
pub mod report;

pub use clock::{market_now, RunMode};
pub use config::{ConfigError, Fund, MonitorConfig, CRASH_TRIGGER_PCT};
pub use crash::{apply, evaluate, CrashState, PersistenceError, StateStore, TranchePlan};
pub use data::{DataUnavailable, MarketCollector, MarketSnapshot, Mover, YahooProvider};
pub use notify::{Credentials, DeliveryError, NotificationSink, TelegramNotifier};
pub use pipeline::{run_once, RunContext, RunError, RunOutcome};
pub use report::MessageFormatter;
