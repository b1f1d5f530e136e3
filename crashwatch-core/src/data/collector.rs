//! Market snapshot collection.
//!
//! The index series is mandatory; VIX and watchlist movers are best-effort.

use super::provider::{DataError, MarketDataProvider};
use crate::config::MonitorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const MAX_MOVERS: usize = 3;

/// The collector could not produce a snapshot; the run degrades to a notice.
#[derive(Debug, Error)]
#[error("market data unavailable: {reason}")]
pub struct DataUnavailable {
    pub reason: String,
}

impl DataUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub change_pct: f64,
}

/// Market figures retrieved in one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub index_name: String,
    pub index_value: Option<f64>,
    pub change_pct: Option<f64>,
    pub vix: Option<f64>,
    pub top_gainers: Vec<Mover>,
    pub top_losers: Vec<Mover>,
}

/// Builds a [`MarketSnapshot`] from one provider using the monitor config.
pub struct MarketCollector<'a> {
    provider: &'a dyn MarketDataProvider,
    config: &'a MonitorConfig,
}

impl<'a> MarketCollector<'a> {
    /// Collector reading the index, VIX and watchlist named in `config`.
    pub fn new(provider: &'a dyn MarketDataProvider, config: &'a MonitorConfig) -> Self {
        Self { provider, config }
    }

    /// Fetch the index (mandatory), VIX and watchlist movers (best-effort).
    ///
    /// Fails with [`DataUnavailable`] when the index series cannot be fetched
    /// or carries no usable percent change.
    pub fn fetch(&self) -> Result<MarketSnapshot, DataUnavailable> {
        let index = self
            .provider
            .intraday(&self.config.index_symbol)
            .map_err(|e| {
                DataUnavailable::new(format!(
                    "{} from {}: {e}",
                    self.config.index_symbol,
                    self.provider.name()
                ))
            })?;

        let Some(change_pct) = index.change_pct() else {
            return Err(DataUnavailable::new(format!(
                "{}: no intraday change available",
                self.config.index_symbol
            )));
        };

        let mut snapshot = MarketSnapshot {
            index_name: self.config.index_name.clone(),
            index_value: index.last(),
            change_pct: Some(change_pct),
            ..Default::default()
        };

        if let Some(vix_symbol) = self.config.vix_symbol() {
            snapshot.vix = match self.provider.intraday(vix_symbol) {
                Ok(series) => series.last(),
                Err(e) => {
                    warn!(symbol = vix_symbol, error = %e, "VIX unavailable");
                    None
                }
            };
        }

        let (gainers, losers) = self.movers();
        snapshot.top_gainers = gainers;
        snapshot.top_losers = losers;

        info!(
            index = %snapshot.index_name,
            value = ?snapshot.index_value,
            change_pct = ?snapshot.change_pct,
            vix = ?snapshot.vix,
            "market snapshot collected"
        );
        Ok(snapshot)
    }

    fn movers(&self) -> (Vec<Mover>, Vec<Mover>) {
        let mut changes = Vec::with_capacity(self.config.watchlist.len());
        for symbol in &self.config.watchlist {
            if !self.provider.is_available() {
                warn!("provider unavailable; skipping remaining watchlist symbols");
                break;
            }
            match self.provider.intraday(symbol).map(|s| s.change_pct()) {
                Ok(Some(change_pct)) => changes.push(Mover {
                    symbol: symbol.clone(),
                    change_pct,
                }),
                Ok(None) => {}
                Err(DataError::CircuitBreakerTripped) => break,
                Err(e) => warn!(symbol = %symbol, error = %e, "watchlist symbol skipped"),
            }
        }
        rank_movers(changes)
    }
}

/// Split changes into (gainers highest first, losers lowest first), three each at most.
pub fn rank_movers(mut changes: Vec<Mover>) -> (Vec<Mover>, Vec<Mover>) {
    changes.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));
    let gainers: Vec<Mover> = changes
        .iter()
        .filter(|m| m.change_pct > 0.0)
        .take(MAX_MOVERS)
        .cloned()
        .collect();
    let losers: Vec<Mover> = changes
        .iter()
        .rev()
        .filter(|m| m.change_pct < 0.0)
        .take(MAX_MOVERS)
        .cloned()
        .collect();
    (gainers, losers)
}
