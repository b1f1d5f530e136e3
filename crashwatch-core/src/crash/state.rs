//! Persisted crash state and its transition function.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Current schema version of the state file.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// System of record for how many crash tranches have been deployed.
///
/// `tranche_index` never decreases; `last_crash_date` allows at most one
/// advance per market date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub last_crash_date: Option<NaiveDate>,
    pub tranche_index: u32,
}

impl CrashState {
    /// Initial state: no crash seen, no tranche deployed.
    pub fn seed() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_crash_date: None,
            tranche_index: 0,
        }
    }
}

impl Default for CrashState {
    fn default() -> Self {
        Self::seed()
    }
}

/// Crash state transition. Returns the next state and whether a tranche fired.
///
/// - not triggered: unchanged, not fired
/// - triggered, already fired on `today`: unchanged, not fired
/// - triggered, new date: `tranche_index + 1`, `last_crash_date = today`, fired
/// - triggered, counter at `u32::MAX`: unchanged, not fired
pub fn apply(state: &CrashState, today: NaiveDate, triggered: bool) -> (CrashState, bool) {
    if !triggered || state.last_crash_date == Some(today) {
        return (state.clone(), false);
    }
    let Some(tranche_index) = state.tranche_index.checked_add(1) else {
        error!(tranche_index = state.tranche_index, "tranche counter exhausted; crash not recorded");
        return (state.clone(), false);
    };
    let next = CrashState {
        schema_version: SCHEMA_VERSION,
        last_crash_date: Some(today),
        tranche_index,
    };
    (next, true)
}
