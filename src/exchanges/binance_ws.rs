//! Binance WebSocket Implementation
//!
//! 바이낸스 캔들(kline) 실시간 스트림
//!
//! 수신 프레임의 한 글자 키(`e`/`E`/`s`/`k{t,T,i,f,L,o,c,h,l,v,n,x,q,V,Q}`)를
//! 이름 있는 평탄한 이벤트 레코드로 재구성해 채널로 전달한다. 구독은 스트림
//! 식별자로 관리되며 [`terminate`](BinanceWs::terminate)로 종료한다.
//!
//! https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::errors::{ApiError, ApiResult};
use crate::transform::coerce_numbers;

const WS_BASE_URL: &str = "wss://stream.binance.com:9443";

/// 캔들 스트림 이벤트 (평탄화된 레코드)
#[derive(Debug, Clone, Serialize)]
pub struct CandleEvent {
    pub event_type: String,
    pub event_time: i64,
    pub symbol: String,
    pub candle: Candle,
}

impl CandleEvent {
    /// 숫자형 문자열 필드를 숫자로 변환한 뷰를 반환한다.
    pub fn normalized(&self) -> ApiResult<Value> {
        Ok(coerce_numbers(&serde_json::to_value(self)?, &[]))
    }
}

/// 스트림 캔들
#[derive(Debug, Clone, Serialize)]
pub struct Candle {
    pub start_time: i64,
    pub end_time: i64,
    pub symbol: String,
    pub interval: String,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub open: String,
    pub close: String,
    pub high: String,
    pub low: String,
    pub volume: String,
    pub trades: i64,
    pub is_final: bool,
    pub quote_volume: String,
    pub buy_volume: String,
    pub quote_buy_volume: String,
}

// === Raw frame types ===

#[derive(Debug, Deserialize)]
struct KlineFrame {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: KlineData,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    start_time: i64,
    #[serde(rename = "T")]
    end_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "f")]
    first_trade_id: i64,
    #[serde(rename = "L")]
    last_trade_id: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "n")]
    trades: i64,
    #[serde(rename = "x")]
    is_final: bool,
    #[serde(rename = "q")]
    quote_volume: String,
    #[serde(rename = "V")]
    buy_volume: String,
    #[serde(rename = "Q")]
    quote_buy_volume: String,
}

/// Binance WebSocket 클라이언트
pub struct BinanceWs {
    subscriptions: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
}

impl Default for BinanceWs {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceWs {
    /// 새 Binance WebSocket 클라이언트 생성
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 캔들 스트림 구독
    ///
    /// 스트림 식별자와 이벤트 수신 채널을 반환한다. 식별자는
    /// `btcusdt@kline_1m` 형태이며 복수 심볼은 `/`로 이어진다.
    pub async fn candlesticks(
        &self,
        symbols: &[&str],
        interval: &str,
    ) -> ApiResult<(String, mpsc::UnboundedReceiver<CandleEvent>)> {
        if symbols.is_empty() {
            return Err(ApiError::WebSocketError {
                message: "at least one symbol required".to_string(),
            });
        }

        let streams: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@kline_{}", s.to_lowercase(), interval))
            .collect();
        let id = streams.join("/");

        // 단일 스트림은 raw 엔드포인트, 복수는 combined 엔드포인트
        let url = if streams.len() == 1 {
            format!("{}/ws/{}", WS_BASE_URL, id)
        } else {
            format!("{}/stream?streams={}", WS_BASE_URL, id)
        };

        debug!(url = %url, "connecting candle stream");
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let channel_id = id.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = Self::parse_frame(&text) {
                            if event_tx.send(event).is_err() {
                                // 수신자가 사라지면 구독 종료
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if write.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!(id = %channel_id, "stream closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(id = %channel_id, error = %e, "stream error");
                        break;
                    }
                }
            }
        });

        let mut subscriptions = self.subscriptions.write().await;
        if let Some(previous) = subscriptions.insert(id.clone(), handle) {
            previous.abort();
        }

        Ok((id, event_rx))
    }

    /// 채널 식별자로 구독 종료
    pub async fn terminate(&self, id: &str) -> ApiResult<()> {
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions.remove(id) {
            Some(handle) => {
                handle.abort();
                Ok(())
            }
            None => Err(ApiError::UnsubscribeError {
                message: format!("unknown subscription: {}", id),
            }),
        }
    }

    /// 현재 활성 구독 식별자 목록
    pub async fn active_subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().await.keys().cloned().collect()
    }

    /// 수신 프레임을 캔들 이벤트로 재구성한다.
    ///
    /// combined 스트림 프레임(`{"stream": ..., "data": {...}}`)은 `data`를
    /// 벗겨낸다. kline 외 이벤트는 버린다.
    fn parse_frame(text: &str) -> Option<CandleEvent> {
        let value: Value = serde_json::from_str(text).ok()?;
        let payload = value.get("data").unwrap_or(&value);

        if payload.get("e").and_then(|e| e.as_str()) != Some("kline") {
            return None;
        }

        let frame: KlineFrame = serde_json::from_value(payload.clone()).ok()?;
        let k = frame.kline;

        Some(CandleEvent {
            event_type: frame.event_type,
            event_time: frame.event_time,
            symbol: frame.symbol,
            candle: Candle {
                start_time: k.start_time,
                end_time: k.end_time,
                symbol: k.symbol,
                interval: k.interval,
                first_trade_id: k.first_trade_id,
                last_trade_id: k.last_trade_id,
                open: k.open,
                close: k.close,
                high: k.high,
                low: k.low,
                volume: k.volume,
                trades: k.trades,
                is_final: k.is_final,
                quote_volume: k.quote_volume,
                buy_volume: k.buy_volume,
                quote_buy_volume: k.quote_buy_volume,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KLINE_FRAME: &str = r#"{
        "e": "kline",
        "E": 1638747660000,
        "s": "BTCUSDT",
        "k": {
            "t": 1638747660000,
            "T": 1638747719999,
            "s": "BTCUSDT",
            "i": "1m",
            "f": 100,
            "L": 200,
            "o": "0.0010",
            "c": "0.0020",
            "h": "0.0025",
            "l": "0.0015",
            "v": "1000",
            "n": 100,
            "x": false,
            "q": "1.0000",
            "V": "500",
            "Q": "0.500",
            "B": "123456"
        }
    }"#;

    #[test]
    fn test_parse_frame_reshapes_short_keys() {
        let event = BinanceWs::parse_frame(KLINE_FRAME).unwrap();
        assert_eq!(event.event_type, "kline");
        assert_eq!(event.event_time, 1638747660000);
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.candle.start_time, 1638747660000);
        assert_eq!(event.candle.end_time, 1638747719999);
        assert_eq!(event.candle.interval, "1m");
        assert_eq!(event.candle.first_trade_id, 100);
        assert_eq!(event.candle.last_trade_id, 200);
        assert_eq!(event.candle.open, "0.0010");
        assert_eq!(event.candle.close, "0.0020");
        assert!(!event.candle.is_final);
        assert_eq!(event.candle.quote_buy_volume, "0.500");
    }

    #[test]
    fn test_parse_frame_unwraps_combined_stream() {
        let combined = format!(r#"{{"stream":"btcusdt@kline_1m","data":{}}}"#, KLINE_FRAME);
        let event = BinanceWs::parse_frame(&combined).unwrap();
        assert_eq!(event.symbol, "BTCUSDT");
    }

    #[test]
    fn test_parse_frame_ignores_other_events() {
        let trade = r#"{"e":"trade","E":1,"s":"BTCUSDT","t":1,"p":"0.001","q":"100","m":true}"#;
        assert!(BinanceWs::parse_frame(trade).is_none());
        assert!(BinanceWs::parse_frame("not json").is_none());
    }

    #[test]
    fn test_candle_event_normalized() {
        let event = BinanceWs::parse_frame(KLINE_FRAME).unwrap();
        let normalized = event.normalized().unwrap();
        assert_eq!(normalized["candle"]["open"], json!(0.001));
        assert_eq!(normalized["candle"]["volume"], json!(1000));
        assert_eq!(normalized["candle"]["is_final"], json!(false));
        assert_eq!(normalized["symbol"], json!("BTCUSDT"));

        // 멱등성
        let twice = coerce_numbers(&normalized, &[]);
        assert_eq!(normalized, twice);
    }

    #[tokio::test]
    async fn test_terminate_unknown_subscription() {
        let ws = BinanceWs::new();
        let err = ws.terminate("btcusdt@kline_1m").await.unwrap_err();
        assert_eq!(err.code(), "UNSUBSCRIBE_ERROR");
    }
}
