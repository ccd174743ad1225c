//! Yahoo Finance price source.
//!
//! Fetches daily bars from Yahoo's v8 chart API with retries, exponential
//! backoff and a shared circuit breaker. Bare tickers are tried against each
//! market suffix in turn (`2330` → `2330.TWO`, `2330.TW`, `2330`) and the
//! first symbol that returns bars wins.
//!
//! Yahoo has no official API and changes its format without notice. The CSV
//! path is the fallback when it is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::{PriceSource, SourceError};
use adamlab_core::{BarCells, RawRecord, RawValue};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

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
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// One daily bar as fetched. Gaps stay `None`; the sanitizer handles them.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl From<&FetchedBar> for RawRecord {
    fn from(bar: &FetchedBar) -> Self {
        RawRecord::new(bar.date, RawValue::from_number(bar.close)).with_bar(BarCells {
            open: RawValue::from_number(bar.open),
            high: RawValue::from_number(bar.high),
            low: RawValue::from_number(bar.low),
            volume: RawValue::from_number(bar.volume.map(|v| v as f64)),
        })
    }
}

/// Bars for the symbol that actually answered.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub symbol: String,
    pub bars: Vec<FetchedBar>,
}

pub struct YahooSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
    days: u32,
    markets: Vec<String>,
}

impl YahooSource {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        days: u32,
        markets: Vec<String>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| SourceError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            days,
            markets,
        })
    }

    /// Symbols to try for a ticker, in order.
    ///
    /// A forced market wins; a ticker that already carries a suffix is used as is.
    pub fn candidates(ticker: &str, market: Option<&str>, markets: &[String]) -> Vec<String> {
        let ticker = ticker.trim().to_ascii_uppercase();
        if let Some(m) = market.map(str::trim).filter(|m| !m.is_empty()) {
            return vec![format!("{ticker}{}", m.to_ascii_uppercase())];
        }
        if ticker.contains('.') || markets.is_empty() {
            return vec![ticker];
        }
        let mut out: Vec<String> = Vec::with_capacity(markets.len());
        for m in markets {
            let symbol = format!("{ticker}{}", m.trim().to_ascii_uppercase());
            if !out.contains(&symbol) {
                out.push(symbol);
            }
        }
        out
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::default()).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::default()).and_utc().timestamp() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<FetchedBar>, SourceError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => SourceError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                SourceError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => SourceError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::ResponseFormatChanged("result array is empty".into()))?;

        // A valid symbol with no trading in range comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    SourceError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
            let bar = FetchedBar {
                date,
                open: quote.open.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                close: quote.close.get(i).copied().flatten().or(adj_close),
                volume: quote.volume.get(i).copied().flatten(),
            };

            // non-trading days come back with every field null
            if bar.open.is_none()
                && bar.high.is_none()
                && bar.low.is_none()
                && bar.close.is_none()
                && bar.volume.is_none()
            {
                continue;
            }
            bars.push(bar);
        }
        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FetchedBar>, SourceError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(SourceError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(SourceError::CircuitBreakerTripped);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        tracing::warn!(symbol, "provider returned 403, circuit breaker tripped");
                        return Err(SourceError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(SourceError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(SourceError::AuthenticationRequired(
                            "Yahoo Finance requires authentication".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(SourceError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error =
                            Some(SourceError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        SourceError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let bars = Self::parse_response(symbol, chart)?;
                    self.circuit_breaker.record_success();
                    return Ok(bars);
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(SourceError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => return Err(SourceError::NetworkUnreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::Other("max retries exceeded".into())))
    }

    /// Fetch the configured window for `ticker`, walking the market candidates.
    pub fn fetch(&self, ticker: &str, market: Option<&str>) -> Result<Fetched, SourceError> {
        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(i64::from(self.days));
        let tried = Self::candidates(ticker, market, &self.markets);

        for symbol in &tried {
            match self.fetch_with_retry(symbol, start, end) {
                Ok(bars) if !bars.is_empty() => {
                    tracing::info!(ticker, symbol, bars = bars.len(), "fetched");
                    return Ok(Fetched {
                        symbol: symbol.clone(),
                        bars,
                    });
                }
                Ok(_) => tracing::debug!(symbol, "no bars"),
                Err(SourceError::CircuitBreakerTripped) => {
                    return Err(SourceError::CircuitBreakerTripped)
                }
                Err(e @ SourceError::AuthenticationRequired(_)) => return Err(e),
                Err(e) => tracing::debug!(symbol, error = %e, "candidate failed"),
            }
        }

        Err(SourceError::NoData {
            symbol: ticker.to_string(),
            tried,
        })
    }
}

impl PriceSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn load(&self, symbol: &str) -> Result<Vec<RawRecord>, SourceError> {
        let fetched = self.fetch(symbol, None)?;
        Ok(fetched.bars.iter().map(RawRecord::from).collect())
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write bars as `Date,Open,High,Low,Close,Volume`, creating parent directories.
pub fn write_bars_csv(path: &Path, bars: &[FetchedBar]) -> Result<(), SourceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SourceError::io(parent, e))?;
    }
    let mut wtr = ::csv::Writer::from_path(path).map_err(|e| SourceError::io(path, e))?;
    let csv_err = |e: ::csv::Error| SourceError::Csv(e.to_string());

    wtr.write_record(["Date", "Open", "High", "Low", "Close", "Volume"])
        .map_err(csv_err)?;
    for bar in bars {
        wtr.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            cell(bar.open),
            cell(bar.high),
            cell(bar.low),
            cell(bar.close),
            bar.volume.map(|v| v.to_string()).unwrap_or_default(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| SourceError::io(path, e))?;
    Ok(())
}
