//! Binance Exchange API
//!
//! 바이낸스 REST 시세 조회 구현
//!
//! https://developers.binance.com/docs/binance-spot-api-docs/rest-api

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ExchangeConfig, HttpClient};
use crate::errors::{ApiError, ApiResult};
use crate::transform::coerce_numbers;
use crate::utils::Params;

const BASE_URL: &str = "https://api.binance.com";

/// 응답 엔벨로프
#[derive(Debug, Clone, Serialize)]
pub struct BinanceResponse<T> {
    pub data: T,
}

impl<T: Serialize> BinanceResponse<T> {
    /// 숫자형 문자열 필드를 숫자로 변환한 뷰를 반환한다.
    pub fn normalized(&self) -> ApiResult<Value> {
        Ok(coerce_numbers(&serde_json::to_value(self)?, &[]))
    }
}

/// 심볼별 현재가
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolPrice {
    pub symbol: String,
    pub price: String,
}

/// 캔들 (12개 요소 배열을 이름 있는 필드로 재구성한 것)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candlestick {
    pub time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time: i64,
    pub asset_volume: String,
    pub trades: i64,
    pub buy_base_volume: String,
    pub buy_asset_volume: String,
}

/// Binance 거래소 클라이언트
pub struct Binance {
    client: HttpClient,
}

impl Binance {
    /// 새 Binance 인스턴스 생성
    pub fn new(config: ExchangeConfig) -> ApiResult<Self> {
        let client = HttpClient::new(BASE_URL, &config)?;
        Ok(Self { client })
    }

    /// 단일 심볼 현재가 조회
    ///
    /// GET /api/v3/ticker/price?symbol={symbol}
    pub async fn price(&self, symbol: &str) -> ApiResult<BinanceResponse<SymbolPrice>> {
        let params = Params::new().with("symbol", symbol);
        let res = self.client.get("/api/v3/ticker/price", Some(&params), None).await?;
        let data = serde_json::from_value(res.body).map_err(|e| ApiError::ParseError {
            data_type: "price".to_string(),
            message: e.to_string(),
        })?;
        Ok(BinanceResponse { data })
    }

    /// 전체 심볼 현재가 조회
    ///
    /// GET /api/v3/ticker/price
    pub async fn prices(&self) -> ApiResult<BinanceResponse<Vec<SymbolPrice>>> {
        let res = self.client.get("/api/v3/ticker/price", None, None).await?;
        let data = serde_json::from_value(res.body).map_err(|e| ApiError::ParseError {
            data_type: "prices".to_string(),
            message: e.to_string(),
        })?;
        Ok(BinanceResponse { data })
    }

    /// 캔들 조회
    ///
    /// GET /api/v3/klines
    ///
    /// * `interval` - 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1M
    /// * `limit` - 기본 500, 최대 1000
    pub async fn candlesticks(
        &self,
        symbol: &str,
        interval: &str,
        limit: Option<u32>,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> ApiResult<BinanceResponse<Vec<Candlestick>>> {
        let mut params = Params::new()
            .with("symbol", symbol)
            .with("interval", interval);
        if let Some(limit) = limit {
            params.insert("limit", limit.to_string());
        }
        if let Some(start_time) = start_time {
            params.insert("startTime", start_time.to_string());
        }
        if let Some(end_time) = end_time {
            params.insert("endTime", end_time.to_string());
        }

        let res = self.client.get("/api/v3/klines", Some(&params), None).await?;
        let rows: Vec<Vec<Value>> =
            serde_json::from_value(res.body).map_err(|e| ApiError::ParseError {
                data_type: "candlesticks".to_string(),
                message: e.to_string(),
            })?;

        let data = rows
            .iter()
            .map(|row| parse_kline_row(row))
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(BinanceResponse { data })
    }
}

/// `[time, open, high, low, close, volume, closeTime, assetVolume, trades,
/// buyBaseVolume, buyAssetVolume, ignored]` 배열을 캔들로 변환
fn parse_kline_row(row: &[Value]) -> ApiResult<Candlestick> {
    if row.len() < 11 {
        return Err(ApiError::ParseError {
            data_type: "candlesticks".to_string(),
            message: format!("kline row has {} elements, expected 12", row.len()),
        });
    }

    let int = |idx: usize| -> ApiResult<i64> {
        row[idx].as_i64().ok_or_else(|| ApiError::ParseError {
            data_type: "candlesticks".to_string(),
            message: format!("kline element {} is not an integer", idx),
        })
    };
    let text = |idx: usize| -> ApiResult<String> {
        row[idx]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::ParseError {
                data_type: "candlesticks".to_string(),
                message: format!("kline element {} is not a string", idx),
            })
    };

    Ok(Candlestick {
        time: int(0)?,
        open: text(1)?,
        high: text(2)?,
        low: text(3)?,
        close: text(4)?,
        volume: text(5)?,
        close_time: int(6)?,
        asset_volume: text(7)?,
        trades: int(8)?,
        buy_base_volume: text(9)?,
        buy_asset_volume: text(10)?,
    })
}
