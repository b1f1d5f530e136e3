//! Notification text.
//!
//! Every formatter returns a non-empty string; missing figures render as `N/A`.

use crate::config::CRASH_TRIGGER_PCT;
use crate::crash::TranchePlan;
use crate::data::{MarketSnapshot, Mover};
use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

const NA: &str = "N/A";

/// Standing monthly SIP, shown in the EOD plan status.
const SIP_SUMMARY: &str = "SIP ₹500 ×4 = ₹2000";

/// Renders run results as notification text.
pub struct MessageFormatter {
    index_name: String,
    plan: TranchePlan,
    at: DateTime<FixedOffset>,
    manual: bool,
}

impl MessageFormatter {
    pub fn new(
        index_name: impl Into<String>,
        plan: TranchePlan,
        at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            plan,
            at,
            manual: false,
        }
    }

    /// Mark the message as coming from a manually dispatched run.
    pub fn manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    fn timestamp(&self) -> String {
        let mut ts = self.at.format("%Y-%m-%d %H:%M IST").to_string();
        if self.manual {
            ts.push_str(" (manual run)");
        }
        ts
    }

    fn crashes_used(&self, tranche_index: u32) -> String {
        format!(
            "Crashes used: {}/{}",
            tranche_index,
            self.plan.total_tranches()
        )
    }

    /// Intraday check message. The crash section appears only when `fired`.
    pub fn format(&self, snapshot: &MarketSnapshot, fired: bool, tranche_index: u32) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Market check — {}", self.timestamp());
        let _ = writeln!(
            text,
            "{}: {} ({})",
            self.index_name,
            fmt_level(snapshot.index_value),
            fmt_pct(snapshot.change_pct)
        );
        let _ = writeln!(text, "VIX: {}", fmt_level(snapshot.vix));
        let _ = writeln!(text, "Top gainers: {}", fmt_movers(&snapshot.top_gainers));
        let _ = writeln!(text, "Top losers: {}", fmt_movers(&snapshot.top_losers));
        if fired {
            text.push('\n');
            self.write_crash_section(&mut text, snapshot, tranche_index);
        }
        let _ = writeln!(text, "{}", self.crashes_used(tranche_index));
        text
    }

    /// End-of-day summary: headline, movers, macro/flows, plan status, next step.
    pub fn format_eod(&self, snapshot: &MarketSnapshot, fired: bool, tranche_index: u32) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "EOD Market Summary — {}", self.timestamp());
        let _ = writeln!(
            text,
            "1) Market headline: {} {} ({})",
            self.index_name,
            fmt_pct(snapshot.change_pct),
            fmt_level(snapshot.index_value)
        );
        let _ = writeln!(
            text,
            "2) Top gainers: {} | Top losers: {}",
            fmt_movers(&snapshot.top_gainers),
            fmt_movers(&snapshot.top_losers)
        );
        let regime = match snapshot.vix {
            Some(_) if self.plan.is_high_vix(snapshot.vix) => " (elevated)",
            Some(_) => " (normal)",
            None => "",
        };
        // No flows source is wired in; FII/DII stay N/A.
        let _ = writeln!(
            text,
            "3) Macro / flows: FII {NA} | DII {NA} | VIX {}{regime}",
            fmt_level(snapshot.vix)
        );
        let _ = writeln!(
            text,
            "4) Personal plan status: {SIP_SUMMARY} | {}",
            self.crashes_used(tranche_index)
        );
        let next_step = if fired {
            "Deploy today's crash tranche (see below)."
        } else {
            "No action."
        };
        let _ = writeln!(text, "5) Suggested next step: {next_step}");
        if fired {
            text.push('\n');
            self.write_crash_section(&mut text, snapshot, tranche_index);
        }
        text
    }

    /// Degraded notice when no snapshot could be collected.
    pub fn format_unavailable(&self, reason: &str, tranche_index: u32) -> String {
        let reason = if reason.trim().is_empty() {
            "unknown error"
        } else {
            reason.trim()
        };
        let mut text = String::new();
        let _ = writeln!(text, "Market data unavailable — {}", self.timestamp());
        let _ = writeln!(text, "Reason: {reason}");
        let _ = writeln!(text, "Crash check skipped for this run; state unchanged.");
        let _ = writeln!(text, "{}", self.crashes_used(tranche_index));
        text
    }

    fn write_crash_section(&self, text: &mut String, snapshot: &MarketSnapshot, tranche_index: u32) {
        let _ = writeln!(
            text,
            "MARKET DROP — {} {} (trigger {:.2}%)",
            self.index_name,
            fmt_pct(snapshot.change_pct),
            CRASH_TRIGGER_PCT
        );
        let Some(amount) = self.plan.amount_for(tranche_index) else {
            let _ = writeln!(
                text,
                "Crash #{tranche_index} recorded; all {} planned tranches already deployed. No new deployment.",
                self.plan.total_tranches()
            );
            return;
        };
        let _ = writeln!(text, "Action: Crash #{tranche_index} → Deploy ₹{amount}");
        let weighting = if self.plan.is_high_vix(snapshot.vix) {
            "VIX-adjusted"
        } else {
            "normal"
        };
        let _ = writeln!(text, "Allocations ({weighting}):");
        for allocation in self.plan.allocate(amount, snapshot.vix) {
            let _ = writeln!(text, "• {}: ₹{}", allocation.fund, allocation.amount);
        }
        let _ = writeln!(
            text,
            "Split roughly equally at 10:15 / 12:30 / 14:50 (adjust if close)."
        );
    }
}

/// Loud trailer for a run whose state write failed.
pub fn append_state_warning(text: &mut String, error: &str) {
    let _ = writeln!(
        text,
        "\n⚠ STATE NOT SAVED: {error}\nThis crash may be reported again on the next run."
    );
}

fn fmt_level(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => NA.to_string(),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:+.2}%"),
        _ => NA.to_string(),
    }
}

fn fmt_movers(movers: &[Mover]) -> String {
    if movers.is_empty() {
        return NA.to_string();
    }
    movers
        .iter()
        .map(|m| format!("{} {:+.2}%", m.symbol, m.change_pct))
        .collect::<Vec<_>>()
        .join(", ")
}
