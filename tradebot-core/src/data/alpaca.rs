//! Alpaca REST client: market data, news, account and orders.
//!
//! One blocking client implements [`MarketData`], [`NewsProvider`] and
//! [`Broker`]. Reads retry with exponential backoff on rate limiting, 5xx and
//! connection failures; order submission is never retried, so a timeout can
//! never turn into a duplicate order.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Broker, DataError, ExecutionError, MarketData, NewsProvider};
use crate::config::AlpacaConfig;
use crate::domain::{Order, OrderAck, Position, PriceHistory, PriceSeries};

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Vec<BarData>>,
}

#[derive(Debug, Deserialize)]
struct BarData {
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "c")]
    close: f64,
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: TradeData,
}

#[derive(Debug, Deserialize)]
struct TradeData {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct LatestQuoteResponse {
    quote: QuoteData,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(rename = "ap")]
    ask: f64,
    #[serde(rename = "bp")]
    bid: f64,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    cash: String,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    qty: String,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    headline: String,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    filled_avg_price: Option<String>,
}

/// Alpaca trading + market data client.
pub struct AlpacaClient {
    client: reqwest::blocking::Client,
    config: AlpacaConfig,
    key_id: String,
    secret: String,
    max_retries: u32,
    base_delay: Duration,
}

impl AlpacaClient {
    pub fn new(
        config: AlpacaConfig,
        key_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            key_id: key_id.into(),
            secret: secret.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Credentials from `ALPACA_API_KEY` / `ALPACA_API_SECRET`.
    pub fn from_env(config: AlpacaConfig) -> Result<Self, DataError> {
        let key_id = std::env::var("ALPACA_API_KEY")
            .map_err(|_| DataError::AuthenticationRequired("ALPACA_API_KEY is not set".into()))?;
        let secret = std::env::var("ALPACA_API_SECRET").map_err(|_| {
            DataError::AuthenticationRequired("ALPACA_API_SECRET is not set".into())
        })?;
        Self::new(config, key_id, secret)
    }

    fn authed(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        builder
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret)
    }

    /// GET a JSON document with retry. `Ok(None)` on 404.
    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            let request = self.authed(self.client.get(url).query(query));
            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::AuthenticationRequired(format!(
                            "HTTP {status} from {url}"
                        )));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status.is_server_error() {
                        last_error = Some(DataError::Other(format!("HTTP {status} from {url}")));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(DataError::Other(format!("HTTP {status} from {url}")));
                    }

                    let body = resp.json::<T>().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("failed to parse {url}: {e}"))
                    })?;
                    return Ok(Some(body));
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn symbol_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: DateTime<Utc>,
        lookback: usize,
    ) -> Result<Vec<f64>, DataError> {
        let url = format!("{}/v2/stocks/{symbol}/bars", self.config.data_url);
        let query = [
            ("timeframe", "1Day".to_string()),
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.to_rfc3339()),
            ("adjustment", "raw".to_string()),
            ("feed", "iex".to_string()),
            ("limit", "10000".to_string()),
        ];
        let resp: BarsResponse = self
            .get_json(&url, &query)?
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let mut bars = resp.bars.unwrap_or_default();
        bars.sort_by_key(|b| b.timestamp);
        let closes: Vec<f64> = bars.into_iter().map(|b| b.close).collect();
        let start_idx = closes.len().saturating_sub(lookback);
        Ok(closes[start_idx..].to_vec())
    }
}

impl MarketData for AlpacaClient {
    fn name(&self) -> &str {
        "alpaca"
    }

    fn now(&self) -> Result<DateTime<Utc>, DataError> {
        let url = format!("{}/v2/clock", self.config.trading_url);
        let clock: ClockResponse = self
            .get_json(&url, &[])?
            .ok_or_else(|| DataError::ResponseFormatChanged("clock endpoint missing".into()))?;
        Ok(clock.timestamp)
    }

    fn last_price(&self, symbol: &str) -> Result<f64, DataError> {
        let url = format!("{}/v2/stocks/{symbol}/trades/latest", self.config.data_url);
        let resp: LatestTradeResponse =
            self.get_json(&url, &[])?
                .ok_or_else(|| DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })?;
        Ok(resp.trade.price)
    }

    fn daily_closes(
        &self,
        symbols: &[String],
        lookback: usize,
    ) -> Result<PriceHistory, DataError> {
        let end = self.now()?;
        // Calendar days covering `lookback` sessions plus weekends and holidays.
        let span = (lookback as i64) * 7 / 5 + 10;
        let start = end.date_naive() - chrono::Duration::days(span);

        tracing::info!(symbols = symbols.len(), lookback, "fetching daily closes");
        let mut history = PriceHistory::new();
        for symbol in symbols {
            match self.symbol_bars(symbol, start, end, lookback) {
                Ok(closes) if closes.is_empty() => {
                    tracing::warn!(%symbol, %start, "no bars returned");
                }
                Ok(closes) => {
                    tracing::debug!(%symbol, bars = closes.len(), "fetched bars");
                    history.insert(symbol.clone(), PriceSeries::new(closes));
                }
                Err(e) => {
                    tracing::error!(%symbol, error = %e, "failed to fetch bars");
                }
            }
        }
        Ok(history)
    }

    fn spread(&self, symbol: &str) -> Result<Option<f64>, DataError> {
        let url = format!("{}/v2/stocks/{symbol}/quotes/latest", self.config.data_url);
        let resp: Option<LatestQuoteResponse> = self.get_json(&url, &[])?;
        Ok(resp
            .map(|r| r.quote)
            .filter(|q| q.ask > 0.0 && q.bid > 0.0)
            .map(|q| q.ask - q.bid))
    }
}

impl NewsProvider for AlpacaClient {
    fn name(&self) -> &str {
        "alpaca_news"
    }

    fn headlines(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, DataError> {
        let url = format!("{}/v1beta1/news", self.config.data_url);
        let query = [
            ("symbols", symbol.to_string()),
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
            ("limit", "50".to_string()),
        ];
        let resp: Option<NewsResponse> = self.get_json(&url, &query)?;
        Ok(resp
            .map(|r| r.news.into_iter().map(|n| n.headline).collect())
            .unwrap_or_default())
    }
}

fn to_execution_error(e: DataError) -> ExecutionError {
    ExecutionError::Network(e.to_string())
}

impl Broker for AlpacaClient {
    fn name(&self) -> &str {
        "alpaca"
    }

    fn cash(&self) -> Result<f64, ExecutionError> {
        let url = format!("{}/v2/account", self.config.trading_url);
        let account: AccountResponse = self
            .get_json(&url, &[])
            .map_err(to_execution_error)?
            .ok_or_else(|| ExecutionError::Network("account endpoint missing".into()))?;
        account
            .cash
            .parse()
            .map_err(|_| ExecutionError::Network(format!("unparseable cash '{}'", account.cash)))
    }

    fn position(&self, symbol: &str) -> Result<Position, ExecutionError> {
        let url = format!("{}/v2/positions/{symbol}", self.config.trading_url);
        let resp: Option<PositionResponse> =
            self.get_json(&url, &[]).map_err(to_execution_error)?;
        match resp {
            None => Ok(Position::flat()),
            Some(p) => {
                let qty: f64 = p.qty.parse().map_err(|_| {
                    ExecutionError::Network(format!("unparseable position qty '{}'", p.qty))
                })?;
                // Short positions are reported negative; only long holdings are liquidated.
                Ok(Position {
                    quantity: qty.max(0.0).floor() as u64,
                })
            }
        }
    }

    fn submit_order(&self, order: &Order) -> Result<OrderAck, ExecutionError> {
        if order.quantity == 0 {
            return Err(ExecutionError::InvalidQuantity {
                symbol: order.symbol.clone(),
                quantity: order.quantity,
            });
        }

        let url = format!("{}/v2/orders", self.config.trading_url);
        let body = OrderRequest {
            symbol: &order.symbol,
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            time_in_force: order.time_in_force.as_str(),
        };

        let resp = self
            .authed(self.client.post(&url).json(&body))
            .send()
            .map_err(|e| ExecutionError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(ExecutionError::Rejected(format!("HTTP {status}: {detail}")));
        }

        let ack: OrderResponse = resp
            .json()
            .map_err(|e| ExecutionError::Network(format!("unparseable order response: {e}")))?;
        Ok(OrderAck {
            order_id: ack.id,
            fill_price: ack.filled_avg_price.and_then(|p| p.parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_response_parses_alpaca_shape() {
        let json = r#"{
            "bars": [
                {"t": "2024-01-03T05:00:00Z", "o": 1.0, "h": 2.0, "l": 0.5, "c": 1.5, "v": 100},
                {"t": "2024-01-02T05:00:00Z", "o": 1.0, "h": 2.0, "l": 0.5, "c": 1.2, "v": 100}
            ],
            "symbol": "AAPL",
            "next_page_token": null
        }"#;
        let resp: BarsResponse = serde_json::from_str(json).unwrap();
        let bars = resp.bars.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 1.2);
    }

    #[test]
    fn null_bars_parse_as_none() {
        let resp: BarsResponse = serde_json::from_str(r#"{"bars": null}"#).unwrap();
        assert!(resp.bars.is_none());
    }

    #[test]
    fn order_request_uses_wire_names() {
        let order = Order::market("AAPL", 3, crate::domain::Side::Sell);
        let body = OrderRequest {
            symbol: &order.symbol,
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            time_in_force: order.time_in_force.as_str(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "market");
        assert_eq!(json["side"], "sell");
        assert_eq!(json["qty"], "3");
        assert_eq!(json["time_in_force"], "day");
    }

    #[test]
    fn quote_response_parses() {
        let resp: LatestQuoteResponse =
            serde_json::from_str(r#"{"symbol":"AAPL","quote":{"ap":10.05,"bp":10.0,"as":1,"bs":2}}"#)
                .unwrap();
        assert!((resp.quote.ask - resp.quote.bid - 0.05).abs() < 1e-9);
    }
}
