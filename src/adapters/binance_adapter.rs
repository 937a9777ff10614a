//! Live market data from the Binance spot REST API (`GET /api/v3/klines`).

use crate::domain::error::CandlebotError;
use crate::domain::history::{HistoryRequest, HistorySelection};
use crate::domain::market::{Market, MarketFrame};
use crate::domain::ohlcv::Ohlcv;
use crate::domain::symbol::Symbol;
use crate::domain::timeframe::Timeframe;
use crate::ports::market_data_port::MarketDataPort;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, header};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance caps a single klines response at 1000 rows.
const MAX_PAGE: usize = 1000;

/// Kline row as Binance sends it: prices and volumes are strings.
#[derive(Debug, Deserialize)]
struct RawKline(
    i64,       // open time (ms)
    String,    // open
    String,    // high
    String,    // low
    String,    // close
    String,    // volume
    i64,       // close time (ms)
    IgnoredAny, // quote asset volume
    IgnoredAny, // number of trades
    IgnoredAny, // taker buy base volume
    IgnoredAny, // taker buy quote volume
    IgnoredAny, // ignore
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Open time, unix seconds.
    pub timestamp: i64,
    pub ohlcv: Ohlcv,
}

pub struct BinanceAdapter {
    client: Client,
    base_url: String,
}

impl BinanceAdapter {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, CandlebotError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = header::HeaderValue::from_str(key).map_err(|e| {
                CandlebotError::ConfigInvalid {
                    section: "binance".into(),
                    key: "api_key".into(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert("X-MBX-APIKEY", value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .user_agent("candlebot/0.1 (rust)")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn klines_url(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: Option<i64>,
        limit: usize,
    ) -> String {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={}&limit={}",
            self.base_url,
            symbol.exchange_code(),
            timeframe.interval(),
            start_ms,
            limit
        );
        if let Some(end) = end_ms {
            url.push_str(&format!("&endTime={}", end));
        }
        url
    }

    /// Up to `limit` candles from `start_ms`, paging past the per-request cap.
    async fn fetch_klines(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Candle>, CandlebotError> {
        let mut candles = Vec::with_capacity(limit);
        let mut page_start = start_ms;

        while candles.len() < limit {
            let page_size = (limit - candles.len()).min(MAX_PAGE);
            let url = self.klines_url(symbol, timeframe, page_start, end_ms, page_size);
            debug!(%url, "fetching klines");

            let body = self.client.get(&url).send().await?.text().await?;
            let page = parse_klines(&body)?;
            let page_len = page.len();

            if let Some(last) = page.last() {
                page_start = last.timestamp * 1000 + timeframe.seconds() * 1000;
            }
            candles.extend(page);

            if page_len < page_size {
                break;
            }
        }

        Ok(candles)
    }
}

/// Decode a klines response body, surfacing Binance error objects.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>, CandlebotError> {
    let raw: Vec<RawKline> = serde_json::from_str(body).map_err(|e| {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            if let Some(code) = value.get("code").and_then(Value::as_i64) {
                let msg = value
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                return CandlebotError::Exchange { code, msg };
            }
        }
        CandlebotError::Json(e)
    })?;

    raw.into_iter()
        .map(|k| {
            let field = |name: &str, s: &str| {
                s.parse::<f64>().map_err(|e| {
                    CandlebotError::data(format!("invalid {} value {:?}: {}", name, s, e))
                })
            };
            Ok(Candle {
                timestamp: k.0 / 1000,
                ohlcv: Ohlcv {
                    open: field("open", &k.1)?,
                    high: field("high", &k.2)?,
                    low: field("low", &k.3)?,
                    close: field("close", &k.4)?,
                    volume: field("volume", &k.5)?,
                },
            })
        })
        .collect()
}

/// Open time of the candle containing `ms`.
fn floor_to(ms: i64, tf_ms: i64) -> i64 {
    ms - ms.rem_euclid(tf_ms)
}

fn ceil_to(ms: i64, tf_ms: i64) -> i64 {
    floor_to(ms + tf_ms - 1, tf_ms)
}

#[async_trait]
impl MarketDataPort for BinanceAdapter {
    async fn get_current(
        &self,
        symbols: &[Symbol],
        timeframe_minutes: u32,
    ) -> Result<MarketFrame, CandlebotError> {
        let timeframe = Timeframe::try_from(timeframe_minutes)?;
        let since_ms = Utc::now().timestamp_millis() - timeframe.seconds() * 1000;

        let mut frame: Option<MarketFrame> = None;
        for symbol in symbols {
            let candles = self
                .fetch_klines(symbol, timeframe, since_ms, None, 1)
                .await?;
            let [candle] = candles.as_slice() else {
                return Err(CandlebotError::data(format!(
                    "expected 1 candle for {}, got {}",
                    symbol,
                    candles.len()
                )));
            };
            let f = frame.get_or_insert_with(|| MarketFrame::new(candle.timestamp));
            if f.timestamp != candle.timestamp {
                return Err(CandlebotError::data(format!(
                    "candle for {} opens at {}, other symbols at {}",
                    symbol, candle.timestamp, f.timestamp
                )));
            }
            f.ohlcv.insert(symbol.clone(), candle.ohlcv);
        }
        frame.ok_or_else(|| CandlebotError::data("no symbols requested"))
    }

    /// Only closed candles are returned: opens in `[start, end)` where `end`
    /// is at most the open of the candle still forming.
    async fn get_history(
        &self,
        symbols: &[Symbol],
        request: HistoryRequest,
        timeframe_minutes: u32,
    ) -> Result<Market, CandlebotError> {
        let timeframe = Timeframe::try_from(timeframe_minutes)?;
        let tf_ms = timeframe.seconds() * 1000;
        let selection = request.selection()?;

        let now_ms = Utc::now().timestamp_millis();
        let forming = floor_to(now_ms, tf_ms);
        let (start_ms, end_ms) = match selection {
            HistorySelection::Count(count) => (forming - count as i64 * tf_ms, forming),
            HistorySelection::Between { since, until } => (
                ceil_to(since.timestamp_millis(), tf_ms),
                floor_to(until.timestamp_millis().min(now_ms), tf_ms),
            ),
        };
        if end_ms <= start_ms {
            return Err(CandlebotError::HistorySelection {
                reason: "range holds no closed candle".into(),
            });
        }
        let count = ((end_ms - start_ms) / tf_ms) as usize;

        let mut frames: Vec<MarketFrame> = (0..count as i64)
            .map(|i| MarketFrame::new((start_ms + i * tf_ms) / 1000))
            .collect();

        for symbol in symbols {
            let candles = self
                .fetch_klines(symbol, timeframe, start_ms, Some(end_ms - 1), count)
                .await?;
            if candles.len() != count {
                return Err(CandlebotError::data(format!(
                    "expected {} candles for {}, got {}",
                    count,
                    symbol,
                    candles.len()
                )));
            }
            for (frame, candle) in frames.iter_mut().zip(&candles) {
                if candle.timestamp != frame.timestamp {
                    return Err(CandlebotError::data(format!(
                        "candle for {} opens at {}, expected {}",
                        symbol, candle.timestamp, frame.timestamp
                    )));
                }
                frame.ohlcv.insert(symbol.clone(), candle.ohlcv);
            }
        }

        Ok(Market::from_frames(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"[
        [1700000000000,"100.5","110.0","90.25","105.0","12.5",1700000059999,"0",3,"0","0","0"],
        [1700000060000,"105.0","106.0","104.0","104.5","3.0",1700000119999,"0",1,"0","0","0"]
    ]"#;

    fn adapter() -> BinanceAdapter {
        BinanceAdapter::new("http://127.0.0.1:9/", None).unwrap()
    }

    #[test]
    fn parses_kline_rows() {
        let candles = parse_klines(BODY).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000);
        assert_eq!(candles[0].ohlcv.open, 100.5);
        assert_eq!(candles[0].ohlcv.low, 90.25);
        assert_eq!(candles[0].ohlcv.volume, 12.5);
        assert_eq!(candles[1].ohlcv.close, 104.5);
    }

    #[test]
    fn exchange_error_object() {
        let err = parse_klines(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap_err();
        assert!(matches!(err, CandlebotError::Exchange { code: -1121, ref msg } if msg == "Invalid symbol."));
    }

    #[test]
    fn garbage_body_is_json_error() {
        assert!(matches!(parse_klines("<html>"), Err(CandlebotError::Json(_))));
    }

    #[test]
    fn non_numeric_price_is_data_error() {
        let body = r#"[[0,"x","1","1","1","1",59999,"0",1,"0","0","0"]]"#;
        assert!(matches!(parse_klines(body), Err(CandlebotError::Data { .. })));
    }

    #[test]
    fn url_uses_exchange_code_and_interval() {
        let tf = Timeframe::try_from(60).unwrap();
        let url = adapter().klines_url(&Symbol::pair("BTC", "USDT"), tf, 1000, Some(2000), 5);
        assert_eq!(
            url,
            "http://127.0.0.1:9/api/v3/klines?symbol=BTCUSDT&interval=1h&startTime=1000&limit=5&endTime=2000"
        );
    }

    #[tokio::test]
    async fn unsupported_timeframe_fails_before_any_request() {
        let err = adapter()
            .get_history(&[Symbol::pair("BTC", "USDT")], HistoryRequest::count(10), 7)
            .await
            .unwrap_err();
        assert!(matches!(err, CandlebotError::UnsupportedTimeframe { minutes: 7 }));
    }

    #[tokio::test]
    async fn missing_selection_fails_before_any_request() {
        let err = adapter()
            .get_history(&[Symbol::pair("BTC", "USDT")], HistoryRequest::default(), 1)
            .await
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn invalid_api_key_header_is_config_error() {
        let err = BinanceAdapter::new(DEFAULT_BASE_URL, Some("bad\nkey"))
            .err()
            .unwrap();
        assert!(err.is_config_error());
    }

    /// In-process stand-in for the klines endpoint. Opens are aligned to the
    /// interval and filtered like Binance: `startTime <= open <= endTime`,
    /// never past the forming candle, at most `min(limit, 1000)` rows.
    /// `GAPUSDT` drops its first row, `LAGUSDT` runs one candle behind and
    /// `BADUSDT` answers with an error object.
    mod exchange {
        use axum::Router;
        use axum::extract::{Query, State};
        use axum::routing::get;
        use chrono::Utc;
        use serde_json::json;
        use std::collections::HashMap;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        pub struct Exchange {
            pub requests: AtomicUsize,
        }

        fn interval_ms(interval: &str) -> i64 {
            let (n, unit) = interval.split_at(interval.len() - 1);
            let n: i64 = n.parse().unwrap();
            match unit {
                "m" => n * 60_000,
                "h" => n * 3_600_000,
                other => panic!("unexpected interval unit {other}"),
            }
        }

        async fn klines(
            State(exchange): State<Arc<Exchange>>,
            Query(q): Query<HashMap<String, String>>,
        ) -> String {
            exchange.requests.fetch_add(1, Ordering::SeqCst);
            let symbol = q["symbol"].as_str();
            if symbol == "BADUSDT" {
                return json!({"code": -1121, "msg": "Invalid symbol."}).to_string();
            }
            let param = |key: &str| q.get(key).map(|v| v.parse::<i64>().unwrap());
            let tf = interval_ms(&q["interval"]);
            let now = Utc::now().timestamp_millis();
            let end = param("endTime").unwrap_or(now).min(now);
            let limit = param("limit").unwrap().min(1000) as usize;

            let start = param("startTime").unwrap();
            let mut open = (start + tf - 1).div_euclid(tf) * tf;
            if symbol == "LAGUSDT" {
                open -= tf;
            }
            let mut rows = Vec::new();
            while open <= end && rows.len() < limit {
                let price = (open / tf).to_string();
                rows.push(json!([
                    open, price, price, price, price, "1.0", open + tf - 1, "0", 1, "0", "0", "0"
                ]));
                open += tf;
            }
            if symbol == "GAPUSDT" && !rows.is_empty() {
                rows.remove(0);
            }
            serde_json::Value::Array(rows).to_string()
        }

        pub async fn serve() -> (String, Arc<Exchange>) {
            let exchange = Arc::new(Exchange::default());
            let app = Router::new()
                .route("/api/v3/klines", get(klines))
                .with_state(exchange.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            (format!("http://{addr}"), exchange)
        }
    }

    mod over_http {
        use super::exchange::serve;
        use super::*;
        use chrono::TimeZone;
        use std::sync::atomic::Ordering;

        fn btc() -> Symbol {
            Symbol::pair("BTC", "USDT")
        }

        fn assert_contiguous(market: &Market, step: i64) {
            let ts = market.timestamps();
            assert!(ts.windows(2).all(|w| w[1] - w[0] == step), "{ts:?}");
            assert!(ts.iter().all(|t| t % step == 0));
        }

        #[tokio::test]
        async fn history_by_count_returns_closed_candles() {
            let (url, _) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let market = adapter
                .get_history(&[btc()], HistoryRequest::count(5), 1)
                .await
                .unwrap();

            assert_eq!(market.len(), 5);
            assert_contiguous(&market, 60);
            let newest = *market.timestamps().last().unwrap();
            assert!(newest + 60 <= Utc::now().timestamp());
        }

        #[tokio::test]
        async fn history_by_count_aligns_symbols() {
            let (url, _) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let eth = Symbol::pair("ETH", "USDT");
            let market = adapter
                .get_history(&[btc(), eth.clone()], HistoryRequest::count(3), 60)
                .await
                .unwrap();

            assert_eq!(market.len(), 3);
            assert_contiguous(&market, 3600);
            assert!(market.frames().all(|f| f.get(&btc()).is_ok() && f.get(&eth).is_ok()));
        }

        #[tokio::test]
        async fn history_by_range_uses_candle_boundaries() {
            let (url, _) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let until = Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap();

            let aligned = adapter
                .get_history(&[btc()], HistoryRequest::between(since, until), 1)
                .await
                .unwrap();
            assert_eq!(aligned.len(), 10);
            assert_eq!(aligned.timestamps()[0], since.timestamp());
            assert_eq!(aligned.timestamps()[9], until.timestamp() - 60);

            let late_start = since + chrono::Duration::seconds(30);
            let unaligned = adapter
                .get_history(&[btc()], HistoryRequest::between(late_start, until), 1)
                .await
                .unwrap();
            assert_eq!(unaligned.len(), 9);
            assert_eq!(unaligned.timestamps()[0], since.timestamp() + 60);
        }

        #[tokio::test]
        async fn range_inside_one_candle_is_rejected() {
            let (url, exchange) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap();
            let until = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 50).unwrap();
            let err = adapter
                .get_history(&[btc()], HistoryRequest::between(since, until), 1)
                .await
                .unwrap_err();
            assert!(matches!(err, CandlebotError::HistorySelection { .. }));
            assert_eq!(exchange.requests.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn long_history_is_paged() {
            let (url, exchange) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let market = adapter
                .get_history(&[btc()], HistoryRequest::count(1500), 1)
                .await
                .unwrap();

            assert_eq!(market.len(), 1500);
            assert_contiguous(&market, 60);
            assert_eq!(exchange.requests.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn missing_candle_is_data_error() {
            let (url, _) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let err = adapter
                .get_history(&[Symbol::pair("GAP", "USDT")], HistoryRequest::count(4), 1)
                .await
                .unwrap_err();
            assert!(matches!(err, CandlebotError::Data { .. }));
        }

        #[tokio::test]
        async fn exchange_error_surfaces() {
            let (url, _) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let err = adapter
                .get_current(&[Symbol::pair("BAD", "USDT")], 1)
                .await
                .unwrap_err();
            assert!(matches!(err, CandlebotError::Exchange { code: -1121, .. }));
        }

        #[tokio::test]
        async fn current_returns_one_candle_per_symbol() {
            let (url, exchange) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let frame = adapter.get_current(&[btc()], 5).await.unwrap();

            assert_eq!(frame.timestamp % 300, 0);
            assert!(frame.get(&btc()).is_ok());
            assert_eq!(exchange.requests.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn current_rejects_mixed_candle_periods() {
            let (url, _) = serve().await;
            let adapter = BinanceAdapter::new(&url, None).unwrap();
            let err = adapter
                .get_current(&[btc(), Symbol::pair("LAG", "USDT")], 1)
                .await
                .unwrap_err();
            assert!(matches!(err, CandlebotError::Data { .. }));
        }
    }
}
