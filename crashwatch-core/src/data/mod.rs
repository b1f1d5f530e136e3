//! Market data: provider trait, Yahoo Finance client, snapshot collection.

pub mod circuit_breaker;
pub mod collector;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use collector::{DataUnavailable, MarketCollector, MarketSnapshot, Mover};
pub use provider::{DataError, IntradaySeries, MarketDataProvider};
pub use yahoo::YahooProvider;
