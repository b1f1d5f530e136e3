//! Market data provider trait and structured error types.
//!
//! The provider is an opaque collaborator: it returns today's intraday series
//! for a symbol or fails. Tests swap in an in-memory implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Today's intraday closes for one symbol, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradaySeries {
    pub symbol: String,
    pub closes: Vec<f64>,
    /// Provider's own last traded price, if reported.
    pub regular_market_price: Option<f64>,
}

impl IntradaySeries {
    pub fn new(symbol: impl Into<String>, closes: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            closes,
            regular_market_price: None,
        }
    }

    /// Latest level: the last usable close, else the regular market price.
    pub fn last(&self) -> Option<f64> {
        self.closes
            .iter()
            .rev()
            .copied()
            .find(|c| c.is_finite())
            .or(self.regular_market_price.filter(|p| p.is_finite()))
    }

    /// Percent change from the first to the last usable close, rounded to 2 decimals.
    pub fn change_pct(&self) -> Option<f64> {
        let mut usable = self.closes.iter().copied().filter(|c| c.is_finite());
        let first = usable.next()?;
        let last = usable.last().unwrap_or(first);
        if first == 0.0 {
            return None;
        }
        Some(((last - first) / first * 100.0 * 100.0).round() / 100.0)
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("data provider is refusing requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Source of intraday market data.
pub trait MarketDataProvider {
    fn name(&self) -> &str;

    fn intraday(&self, symbol: &str) -> Result<IntradaySeries, DataError>;

    /// False while the provider is blocked (rate limit, ban).
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_pct_uses_first_and_last_close() {
        let s = IntradaySeries::new("^NSEI", vec![22_000.0, 21_500.0, 21_120.0]);
        assert_eq!(s.change_pct(), Some(-4.0));
        assert_eq!(s.last(), Some(21_120.0));
    }

    #[test]
    fn change_pct_skips_missing_bars() {
        let s = IntradaySeries::new("^NSEI", vec![f64::NAN, 100.0, 101.234, f64::NAN]);
        assert_eq!(s.change_pct(), Some(1.23));
        assert_eq!(s.last(), Some(101.234));
    }

    #[test]
    fn single_close_is_flat() {
        let s = IntradaySeries::new("^NSEI", vec![100.0]);
        assert_eq!(s.change_pct(), Some(0.0));
    }

    #[test]
    fn empty_or_zero_open_has_no_change() {
        assert_eq!(IntradaySeries::new("X", vec![]).change_pct(), None);
        assert_eq!(IntradaySeries::new("X", vec![0.0, 5.0]).change_pct(), None);
    }

    #[test]
    fn last_falls_back_to_market_price() {
        let s = IntradaySeries {
            symbol: "^INDIAVIX".into(),
            closes: vec![],
            regular_market_price: Some(14.2),
        };
        assert_eq!(s.last(), Some(14.2));
    }
}
