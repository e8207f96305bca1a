//! Eastmoney kline provider.
//!
//! Fetches daily bars from the push2his kline API. Handles rate limiting,
//! retries with exponential backoff, response parsing, and the circuit
//! breaker. The endpoint is unofficial and subject to unannounced format
//! changes; parse failures surface as `ResponseFormatChanged`.

use super::circuit_breaker::{CircuitBreaker, ProviderOutcome};
use super::provider::{DataError, QuoteProvider};
use crate::domain::{Bar, SubMarket, Symbol};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Kline API response envelope.
#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    /// Comma-joined rows: date,open,close,high,low,volume,amount,...,pct_change,...
    klines: Vec<String>,
}

/// Eastmoney daily-kline provider.
pub struct EastmoneyProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl EastmoneyProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Exchange-qualified security id the kline API expects.
    fn secid(symbol: &Symbol) -> String {
        let market_id = match symbol.sub_market {
            SubMarket::Sh => "1",
            SubMarket::Sz => "0",
            SubMarket::Hkex => "116",
            SubMarket::Nyse | SubMarket::Nasdaq => "105",
        };
        format!("{market_id}.{}", symbol.code)
    }

    fn kline_url(symbol: &Symbol, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://push2his.eastmoney.com/api/qt/stock/kline/get\
             ?secid={}&klt=101&fqt=1\
             &fields1=f1,f2,f3&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61\
             &beg={}&end={}",
            Self::secid(symbol),
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        )
    }

    /// Parse the comma-joined kline rows into Bars.
    ///
    /// Row layout: date,open,close,high,low,volume,amount,amplitude,
    /// pct_change,change,turnover. `prev_close` is reconstructed from
    /// close and change.
    fn parse_rows(symbol: &Symbol, rows: &[String]) -> Result<Vec<Bar>, DataError> {
        let mut bars = Vec::with_capacity(rows.len());

        for row in rows {
            let fields: Vec<&str> = row.split(',').collect();
            if fields.len() < 10 {
                return Err(DataError::ResponseFormatChanged(format!(
                    "kline row for {symbol} has {} fields, expected >= 10",
                    fields.len()
                )));
            }

            let parse_f64 = |idx: usize, name: &str| -> Result<f64, DataError> {
                fields[idx].parse::<f64>().map_err(|_| {
                    DataError::ResponseFormatChanged(format!(
                        "non-numeric {name} '{}' for {symbol}",
                        fields[idx]
                    ))
                })
            };

            let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d").map_err(|_| {
                DataError::ResponseFormatChanged(format!(
                    "unparseable date '{}' for {symbol}",
                    fields[0]
                ))
            })?;
            let open = parse_f64(1, "open")?;
            let close = parse_f64(2, "close")?;
            let high = parse_f64(3, "high")?;
            let low = parse_f64(4, "low")?;
            let volume = parse_f64(5, "volume")? as u64;
            let amount = parse_f64(6, "amount")?;
            let pct_change = parse_f64(8, "pct_change")?;
            let change = parse_f64(9, "change")?;

            bars.push(Bar {
                date,
                open,
                high,
                low,
                close,
                volume,
                amount,
                prev_close: close - change,
                pct_change,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn fetch_once(&self, symbol: &Symbol, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let url = Self::kline_url(symbol, start, end);
        let response = self.client.get(&url).send().map_err(|e| {
            self.circuit_breaker.record(ProviderOutcome::Transient);
            DataError::NetworkUnreachable(e.to_string())
        })?;

        match response.status().as_u16() {
            200 => {}
            // The endpoint answers 403 when it has banned the client IP.
            403 => {
                self.circuit_breaker.record(ProviderOutcome::Banned);
                return Err(DataError::CircuitBreakerTripped);
            }
            429 => {
                self.circuit_breaker.record(ProviderOutcome::Transient);
                return Err(DataError::RateLimited {
                    retry_after_secs: 60,
                });
            }
            status => {
                self.circuit_breaker.record(ProviderOutcome::Transient);
                return Err(DataError::NetworkUnreachable(format!("HTTP {status}")));
            }
        }

        let parsed: KlineResponse = response
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(e.to_string()))?;

        let data = parsed.data.ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;

        Self::parse_rows(symbol, &data.klines)
    }
}

impl QuoteProvider for EastmoneyProvider {
    fn name(&self) -> &str {
        "eastmoney"
    }

    fn fetch(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let mut last_err = DataError::NetworkUnreachable("no attempt made".into());
        for attempt in 0..self.max_retries {
            // Re-checked per attempt: if an earlier attempt was the
            // half-open probe and failed, the gate has re-opened and the
            // remaining retries must not go out.
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            match self.fetch_once(symbol, start, end) {
                Ok(bars) => {
                    self.circuit_breaker.record(ProviderOutcome::Ok);
                    return Ok(bars);
                }
                // Not retryable.
                Err(e @ (DataError::SymbolNotFound { .. } | DataError::CircuitBreakerTripped)) => {
                    return Err(e)
                }
                Err(e) => {
                    last_err = e;
                    if attempt + 1 < self.max_retries {
                        std::thread::sleep(self.base_delay * 2u32.pow(attempt));
                    }
                }
            }
        }

        Err(last_err)
    }

    fn is_available(&self) -> bool {
        // Status query only; must not claim the half-open probe slot.
        self.circuit_breaker.can_attempt()
    }
}
