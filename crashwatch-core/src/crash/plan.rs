//! Tranche plan: amount per crash tranche and its split across funds.

use crate::config::{Fund, MonitorConfig};
use serde::{Deserialize, Serialize};

/// Rupees going to one fund out of a tranche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub fund: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranchePlan {
    sequence: Vec<u64>,
    funds: Vec<Fund>,
    vix_threshold: f64,
}

impl TranchePlan {
    pub fn new(sequence: Vec<u64>, funds: Vec<Fund>, vix_threshold: f64) -> Self {
        Self {
            sequence,
            funds,
            vix_threshold,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.crash_sequence.clone(),
            config.funds.clone(),
            config.vix_threshold,
        )
    }

    pub fn total_tranches(&self) -> usize {
        self.sequence.len()
    }

    /// Amount for the 1-based tranche number; `None` once the plan is used up.
    pub fn amount_for(&self, tranche_index: u32) -> Option<u64> {
        let slot = (tranche_index as usize).checked_sub(1)?;
        self.sequence.get(slot).copied()
    }

    /// True when VIX is known and above the threshold.
    pub fn is_high_vix(&self, vix: Option<f64>) -> bool {
        vix.is_some_and(|v| v > self.vix_threshold)
    }

    /// Split `amount` across funds. Each share is floored; the remainder goes to
    /// the first fund, so the parts always sum to `amount`.
    pub fn allocate(&self, amount: u64, vix: Option<f64>) -> Vec<Allocation> {
        let high_vix = self.is_high_vix(vix);
        let mut allocations: Vec<Allocation> = self
            .funds
            .iter()
            .map(|fund| {
                let weight = if high_vix {
                    fund.high_vix_weight
                } else {
                    fund.weight
                };
                Allocation {
                    fund: fund.name.clone(),
                    amount: (amount as f64 * weight).floor() as u64,
                }
            })
            .collect();

        let assigned: u64 = allocations.iter().map(|a| a.amount).sum();
        if let Some(first) = allocations.first_mut() {
            // Floating-point weights can overshoot by a rupee; clamp before topping up.
            if assigned > amount {
                first.amount = first.amount.saturating_sub(assigned - amount);
            } else {
                first.amount += amount - assigned;
            }
        }
        allocations
    }
}
