//! Yahoo Finance intraday provider.
//!
//! Fetches today's 5-minute bars from Yahoo's v8 chart API. Retries timeouts,
//! 429 and 5xx with exponential backoff, and shares a circuit breaker across
//! every symbol fetched in the run.
//!
//! Yahoo has no official API and changes its format without notice; every
//! parse failure surfaces as `ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, IntradaySeries, MarketDataProvider};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point the provider at another host (mirrors, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn chart_url(base_url: &str, symbol: &str) -> String {
        let encoded = symbol.replace('^', "%5E");
        format!("{base_url}/v8/finance/chart/{encoded}?range=1d&interval=5m")
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<IntradaySeries, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let regular_market_price = data.meta.and_then(|m| m.regular_market_price);
        let closes: Vec<f64> = data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close.into_iter().flatten().collect())
            .unwrap_or_default();

        if closes.is_empty() && regular_market_price.is_none() {
            return Err(DataError::ResponseFormatChanged(format!(
                "no intraday closes for {symbol}"
            )));
        }

        Ok(IntradaySeries {
            symbol: symbol.to_string(),
            closes,
            regular_market_price,
        })
    }

    fn fetch_with_retry(&self, symbol: &str) -> Result<IntradaySeries, DataError> {
        let url = Self::chart_url(&self.base_url, symbol);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            debug!(symbol, attempt, "fetching intraday chart");
            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == StatusCode::FORBIDDEN {
                warn!(symbol, "provider returned 403; tripping circuit breaker");
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited { retry_after_secs });
                continue;
            }
            if status.is_server_error() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }
            if !status.is_success() {
                return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;
            let series = Self::parse_response(symbol, chart)?;
            self.circuit_breaker.record_success();
            return Ok(series);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn intraday(&self, symbol: &str) -> Result<IntradaySeries, DataError> {
        self.fetch_with_retry(symbol)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(symbol: &str, json: &str) -> Result<IntradaySeries, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response(symbol, resp)
    }

    #[test]
    fn url_encodes_index_caret() {
        assert_eq!(
            YahooProvider::chart_url(DEFAULT_BASE_URL, "^NSEI"),
            "https://query2.finance.yahoo.com/v8/finance/chart/%5ENSEI?range=1d&interval=5m"
        );
    }

    #[test]
    fn parses_closes_and_skips_nulls() {
        let series = parse(
            "^NSEI",
            r#"{"chart":{"result":[{
                "meta":{"regularMarketPrice":21120.5,"symbol":"^NSEI"},
                "timestamp":[1,2,3],
                "indicators":{"quote":[{"close":[22000.0,null,21120.0],"open":[1,2,3]}]}
            }],"error":null}}"#,
        )
        .unwrap();
        assert_eq!(series.closes, vec![22000.0, 21120.0]);
        assert_eq!(series.regular_market_price, Some(21120.5));
        assert_eq!(series.change_pct(), Some(-4.0));
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let err = parse(
            "^NOPE",
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn empty_quote_without_price_is_format_change() {
        let err = parse(
            "^NSEI",
            r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn tripped_breaker_short_circuits_fetch() {
        let cb = Arc::new(CircuitBreaker::new(Duration::from_secs(60), 3));
        cb.trip();
        let provider = YahooProvider::new(cb)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        assert!(!provider.is_available());
        assert!(matches!(
            provider.intraday("^NSEI"),
            Err(DataError::CircuitBreakerTripped)
        ));
    }
}
