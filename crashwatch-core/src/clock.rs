//! Market-local time (India Standard Time) and run mode resolution.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// IST is UTC+05:30 all year.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is within range")
}

/// Current market-local time.
pub fn market_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist())
}

/// Market-local calendar date of an instant.
pub fn market_date(at: DateTime<FixedOffset>) -> NaiveDate {
    at.with_timezone(&ist()).date_naive()
}

/// Which message a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Intraday crash check.
    Check,
    /// End-of-day summary.
    Eod,
    /// `Eod` at the configured summary minute (or the minute after), else `Check`.
    Auto,
}

impl RunMode {
    /// Resolve `Auto` against the market-local time. Never returns `Auto`.
    pub fn resolve(self, at: DateTime<FixedOffset>, eod: (u32, u32)) -> RunMode {
        match self {
            RunMode::Auto => {
                let local = at.with_timezone(&ist());
                let minute_of_day = local.hour() * 60 + local.minute();
                let eod_minute = eod.0 * 60 + eod.1;
                if minute_of_day == eod_minute || minute_of_day == eod_minute + 1 {
                    RunMode::Eod
                } else {
                    RunMode::Check
                }
            }
            other => other,
        }
    }
}
