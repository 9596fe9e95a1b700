//! Upbit Exchange API
//!
//! 업비트 거래소 REST API 구현
//!
//! 시세(quotation) 엔드포인트는 인증 없이 호출되고, 주문/계좌(exchange)
//! 엔드포인트는 JWT Bearer 토큰으로 서명된다. 모든 응답에는 `Remaining-Req`
//! 헤더의 잔여 요청 쿼터가 파싱되어 함께 반환된다.
//!
//! https://docs.upbit.com/reference

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::client::{ExchangeConfig, HttpClient, HttpResponse, NonceSource, RandomUuid};
use crate::errors::{ApiError, ApiResult};
use crate::utils::crypto::{base64url_encode, hmac_sha256, sha512_hex};
use crate::utils::{ParamValue, Params};

const BASE_URL: &str = "https://api.upbit.com/v1";
const REMAINING_REQ_HEADER: &str = "remaining-req";

/// 주문 종류 (bid: 매수, ask: 매도)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Bid,
    Ask,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Bid => "bid",
            OrderSide::Ask => "ask",
        }
    }
}

/// 주문 방식 (limit: 지정가, price: 시장가 매수, market: 시장가 매도)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrdType {
    Limit,
    Price,
    Market,
}

impl OrdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrdType::Limit => "limit",
            OrdType::Price => "price",
            OrdType::Market => "market",
        }
    }
}

/// 주문 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Wait,
    Watch,
    Done,
    Cancel,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Wait => "wait",
            OrderState::Watch => "watch",
            OrderState::Done => "done",
            OrderState::Cancel => "cancel",
        }
    }
}

/// `Remaining-Req` 헤더에서 파싱한 잔여 요청 쿼터
///
/// 헤더 형식: `group=default; min=590; sec=9`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingReq {
    pub group: String,
    pub min: i64,
    pub sec: i64,
}

impl RemainingReq {
    /// 세미콜론 구분 헤더 값을 파싱한다.
    pub fn parse(header: &str) -> ApiResult<Self> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for segment in header.split(';') {
            let segment = segment.trim();
            if let Some((key, value)) = segment.split_once('=') {
                fields.insert(key.trim(), value.trim());
            }
        }

        let field = |name: &str| {
            fields.get(name).copied().ok_or_else(|| ApiError::ParseError {
                data_type: "RemainingReq".to_string(),
                message: format!("missing '{}' in header '{}'", name, header),
            })
        };
        let int_field = |name: &str| -> ApiResult<i64> {
            field(name)?.parse().map_err(|_| ApiError::ParseError {
                data_type: "RemainingReq".to_string(),
                message: format!("non-numeric '{}' in header '{}'", name, header),
            })
        };

        Ok(Self {
            group: field("group")?.to_string(),
            min: int_field("min")?,
            sec: int_field("sec")?,
        })
    }
}

/// 응답 엔벨로프: HTTP 상태 + 잔여 쿼터 + 데이터
#[derive(Debug, Clone)]
pub struct UpbitResponse<T> {
    pub status: u16,
    pub remaining_req: RemainingReq,
    pub data: T,
}

// === API Response Types ===

/// 마켓 코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitMarket {
    pub market: String,
    pub korean_name: String,
    pub english_name: String,
    /// NONE(해당 없음) / CAUTION(투자유의)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_warning: Option<String>,
}

/// 분 캔들
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinuteCandle {
    pub market: String,
    pub candle_date_time_utc: String,
    pub candle_date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
    pub timestamp: i64,
    pub candle_acc_trade_price: f64,
    pub candle_acc_trade_volume: f64,
    pub unit: i32,
}

/// 일 캔들
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayCandle {
    pub market: String,
    pub candle_date_time_utc: String,
    pub candle_date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
    pub timestamp: i64,
    pub candle_acc_trade_price: f64,
    pub candle_acc_trade_volume: f64,
    pub prev_closing_price: f64,
    pub change_price: f64,
    pub change_rate: f64,
    /// convertingPriceUnit 요청 시에만 포함
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_trade_price: Option<f64>,
}

/// 주 캔들
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekCandle {
    pub market: String,
    pub candle_date_time_utc: String,
    pub candle_date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
    pub timestamp: i64,
    pub candle_acc_trade_price: f64,
    pub candle_acc_trade_volume: f64,
    pub first_day_of_period: String,
}

/// 월 캔들
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthCandle {
    pub market: String,
    pub candle_date_time_utc: String,
    pub candle_date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
    pub timestamp: i64,
    pub candle_acc_trade_price: f64,
    pub candle_acc_trade_volume: f64,
    pub first_day_of_period: String,
}

/// 체결 내역
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTick {
    pub market: String,
    pub trade_date_utc: String,
    pub trade_time_utc: String,
    pub timestamp: i64,
    pub trade_price: f64,
    pub trade_volume: f64,
    pub prev_closing_price: f64,
    pub change_price: f64,
    pub ask_bid: String,
    pub sequential_id: i64,
}

/// 현재가
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitTicker {
    pub market: String,
    pub trade_date: String,
    pub trade_time: String,
    pub trade_date_kst: String,
    pub trade_time_kst: String,
    pub trade_timestamp: i64,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
    pub prev_closing_price: f64,
    /// RISE / EVEN / FALL
    pub change: String,
    pub change_price: f64,
    pub change_rate: f64,
    pub signed_change_price: f64,
    pub signed_change_rate: f64,
    pub trade_volume: f64,
    pub acc_trade_price: f64,
    pub acc_trade_price_24h: f64,
    pub acc_trade_volume: f64,
    pub acc_trade_volume_24h: f64,
    pub highest_52_week_price: f64,
    pub highest_52_week_date: String,
    pub lowest_52_week_price: f64,
    pub lowest_52_week_date: String,
    pub timestamp: i64,
}

/// 호가 단위
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookUnit {
    pub ask_price: f64,
    pub bid_price: f64,
    pub ask_size: f64,
    pub bid_size: f64,
}

/// 호가 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitOrderbook {
    pub market: String,
    pub timestamp: i64,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    pub orderbook_units: Vec<OrderbookUnit>,
}

/// 계좌 자산
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitAccount {
    pub currency: String,
    pub balance: String,
    pub locked: String,
    pub avg_buy_price: String,
    pub avg_buy_price_modified: bool,
    pub unit_currency: String,
}

/// 마켓별 주문 제약사항 (화폐 기준)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConstraint {
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_total: Option<Value>,
}

/// 주문 가능 마켓 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChanceMarket {
    pub id: String,
    pub name: String,
    pub order_types: Vec<String>,
    pub order_sides: Vec<String>,
    pub bid: MarketConstraint,
    pub ask: MarketConstraint,
    pub max_total: String,
    pub state: String,
}

/// 주문 가능 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersChance {
    pub bid_fee: String,
    pub ask_fee: String,
    pub market: ChanceMarket,
    pub bid_account: UpbitAccount,
    pub ask_account: UpbitAccount,
}

/// 주문
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitOrder {
    pub uuid: String,
    pub side: OrderSide,
    pub ord_type: OrdType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub state: OrderState,
    pub market: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trades_count: Option<i64>,
}

/// Upbit 거래소 클라이언트
pub struct Upbit {
    config: ExchangeConfig,
    client: HttpClient,
    nonce: Box<dyn NonceSource>,
}

impl Upbit {
    /// 새 Upbit 인스턴스 생성
    pub fn new(config: ExchangeConfig) -> ApiResult<Self> {
        let client = HttpClient::new(BASE_URL, &config)?;
        Ok(Self {
            config,
            client,
            nonce: Box::new(RandomUuid),
        })
    }

    /// nonce 소스 교체 (테스트에서 결정적 nonce 주입용)
    pub fn with_nonce_source(mut self, nonce: Box<dyn NonceSource>) -> Self {
        self.nonce = nonce;
        self
    }

    // === Quotation API (시세 조회, 인증 불필요) ===

    /// 마켓 코드 조회
    ///
    /// GET /market/all
    pub async fn market_all(&self) -> ApiResult<UpbitResponse<Vec<UpbitMarket>>> {
        self.quotation("/market/all", None).await
    }

    /// 분(Minute) 캔들 조회
    ///
    /// GET /candles/minutes/{unit}
    ///
    /// * `unit` - 분 단위 (1, 3, 5, 10, 15, 30, 60, 240)
    /// * `to` - 마지막 캔들 시각 (exclusive), 생략 시 최신
    /// * `count` - 캔들 개수 (최대 200)
    pub async fn candles_minutes(
        &self,
        unit: u32,
        market: &str,
        to: Option<&str>,
        count: Option<u32>,
    ) -> ApiResult<UpbitResponse<Vec<MinuteCandle>>> {
        let params = candle_params(market, to, count);
        self.quotation(&format!("/candles/minutes/{}", unit), Some(&params))
            .await
    }

    /// 일(Day) 캔들 조회
    ///
    /// GET /candles/days
    ///
    /// * `converting_price_unit` - 종가 환산 화폐 단위 (예: "KRW")
    pub async fn candles_days(
        &self,
        market: &str,
        to: Option<&str>,
        count: Option<u32>,
        converting_price_unit: Option<&str>,
    ) -> ApiResult<UpbitResponse<Vec<DayCandle>>> {
        let mut params = candle_params(market, to, count);
        if let Some(unit) = converting_price_unit {
            params.insert("convertingPriceUnit", unit);
        }
        self.quotation("/candles/days", Some(&params)).await
    }

    /// 주(Week) 캔들 조회
    ///
    /// GET /candles/weeks
    pub async fn candles_weeks(
        &self,
        market: &str,
        to: Option<&str>,
        count: Option<u32>,
    ) -> ApiResult<UpbitResponse<Vec<WeekCandle>>> {
        let params = candle_params(market, to, count);
        self.quotation("/candles/weeks", Some(&params)).await
    }

    /// 월(Month) 캔들 조회
    ///
    /// GET /candles/months
    pub async fn candles_months(
        &self,
        market: &str,
        to: Option<&str>,
        count: Option<u32>,
    ) -> ApiResult<UpbitResponse<Vec<MonthCandle>>> {
        let params = candle_params(market, to, count);
        self.quotation("/candles/months", Some(&params)).await
    }

    /// 최근 체결 내역 조회
    ///
    /// GET /trades/ticks
    pub async fn trades_ticks(
        &self,
        market: &str,
        to: Option<&str>,
        count: Option<u32>,
        cursor: Option<&str>,
    ) -> ApiResult<UpbitResponse<Vec<TradeTick>>> {
        let mut params = Params::new().with("market", market);
        if let Some(to) = to {
            params.insert("to", to);
        }
        if let Some(count) = count {
            params.insert("count", count.to_string());
        }
        if let Some(cursor) = cursor {
            params.insert("cursor", cursor);
        }
        self.quotation("/trades/ticks", Some(&params)).await
    }

    /// 현재가 조회
    ///
    /// GET /ticker
    pub async fn ticker(&self, markets: &[&str]) -> ApiResult<UpbitResponse<Vec<UpbitTicker>>> {
        let params = Params::new().with("markets", markets.join(","));
        self.quotation("/ticker", Some(&params)).await
    }

    /// 호가 정보 조회
    ///
    /// GET /orderbook
    pub async fn orderbook(
        &self,
        markets: &[&str],
    ) -> ApiResult<UpbitResponse<Vec<UpbitOrderbook>>> {
        let params = Params::new().with("markets", markets.join(","));
        self.quotation("/orderbook", Some(&params)).await
    }

    // === Exchange API (JWT 서명 필요) ===

    /// 전체 계좌 조회
    ///
    /// GET /accounts — 파라미터가 없으므로 JWT에 query_hash가 붙지 않는다.
    pub async fn accounts(&self) -> ApiResult<UpbitResponse<Vec<UpbitAccount>>> {
        self.exchange_get("/accounts", None).await
    }

    /// 주문 가능 정보 조회
    ///
    /// GET /orders/chance
    pub async fn orders_chance(&self, market: &str) -> ApiResult<UpbitResponse<OrdersChance>> {
        let params = Params::new().with("market", market);
        self.exchange_get("/orders/chance", Some(params)).await
    }

    /// 개별 주문 조회
    ///
    /// GET /order
    pub async fn order(&self, uuid: &str) -> ApiResult<UpbitResponse<UpbitOrder>> {
        let params = Params::new().with("uuid", uuid);
        self.exchange_get("/order", Some(params)).await
    }

    /// 주문 리스트 조회
    ///
    /// GET /orders — `states`는 `states[]=wait&states[]=watch` 형태의
    /// 반복 파라미터로 인코딩되어 query_hash에 포함된다.
    pub async fn order_list(
        &self,
        market: Option<&str>,
        states: &[OrderState],
        page: Option<u32>,
        order_by: Option<&str>,
    ) -> ApiResult<UpbitResponse<Vec<UpbitOrder>>> {
        let mut params = Params::new();
        if let Some(market) = market {
            params.insert("market", market);
        }
        if !states.is_empty() {
            params.insert_list("states", states.iter().map(|s| s.as_str().to_string()));
        }
        if let Some(page) = page {
            params.insert("page", page.to_string());
        }
        if let Some(order_by) = order_by {
            params.insert("order_by", order_by);
        }
        self.exchange_get("/orders", Some(params)).await
    }

    /// 주문하기
    ///
    /// POST /orders
    ///
    /// * 지정가: `ord_type=limit`, volume + price 필수
    /// * 시장가 매수: `ord_type=price`, price 필수
    /// * 시장가 매도: `ord_type=market`, volume 필수
    pub async fn place_order(
        &self,
        market: &str,
        side: OrderSide,
        ord_type: OrdType,
        volume: Option<&str>,
        price: Option<&str>,
        identifier: Option<&str>,
    ) -> ApiResult<UpbitResponse<UpbitOrder>> {
        let mut params = Params::new()
            .with("market", market)
            .with("side", side.as_str())
            .with("ord_type", ord_type.as_str());
        if let Some(volume) = volume {
            params.insert("volume", volume);
        }
        if let Some(price) = price {
            params.insert("price", price);
        }
        if let Some(identifier) = identifier {
            params.insert("identifier", identifier);
        }

        let token = self.authorization(Some(&params))?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), token);

        let res = self
            .client
            .post_json("/orders", params_to_json(&params), Some(headers))
            .await?;
        self.envelope(res, "order")
    }

    /// 주문 취소 접수
    ///
    /// DELETE /order
    pub async fn cancel_order(&self, uuid: &str) -> ApiResult<UpbitResponse<UpbitOrder>> {
        let params = Params::new().with("uuid", uuid);
        let token = self.authorization(Some(&params))?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), token);

        let res = self.client.delete("/order", Some(&params), Some(headers)).await?;
        self.envelope(res, "order")
    }

    // === Internal ===

    async fn quotation<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<&Params>,
    ) -> ApiResult<UpbitResponse<T>> {
        let res = self.client.get(path, params, None).await?;
        self.envelope(res, path)
    }

    async fn exchange_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<Params>,
    ) -> ApiResult<UpbitResponse<T>> {
        let token = self.authorization(params.as_ref())?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), token);

        let res = self.client.get(path, params.as_ref(), Some(headers)).await?;
        self.envelope(res, path)
    }

    /// 응답 본문과 `Remaining-Req` 헤더를 엔벨로프로 묶는다.
    ///
    /// 헤더 부재는 결함으로 보고 즉시 실패한다 — 시세/주문 응답마다
    /// 반드시 내려오는 값이므로 기본값으로 가리지 않는다.
    fn envelope<T: DeserializeOwned>(
        &self,
        res: HttpResponse,
        data_type: &str,
    ) -> ApiResult<UpbitResponse<T>> {
        let header = res.header(REMAINING_REQ_HEADER).ok_or_else(|| {
            ApiError::MissingHeader {
                name: REMAINING_REQ_HEADER.to_string(),
            }
        })?;
        let remaining_req = RemainingReq::parse(header)?;

        let data = serde_json::from_value(res.body).map_err(|e| ApiError::ParseError {
            data_type: data_type.to_string(),
            message: e.to_string(),
        })?;

        Ok(UpbitResponse {
            status: res.status,
            remaining_req,
            data,
        })
    }

    /// `Authorization: Bearer <JWT>` 헤더 값 생성
    fn authorization(&self, params: Option<&Params>) -> ApiResult<String> {
        let secret = self.config.secret().ok_or_else(|| ApiError::AuthenticationError {
            message: "Secret key required".to_string(),
        })?;
        let claims = self.claims(params)?;
        Ok(format!("Bearer {}", jwt_hs256(&claims, secret)))
    }

    /// JWT 클레임 생성
    ///
    /// 파라미터가 있으면 인코딩된 쿼리 문자열의 SHA-512 해시를
    /// `query_hash`/`query_hash_alg`로 추가한다. 파라미터가 없으면 두 필드를
    /// 아예 넣지 않는다 — 빈 문자열 해시와는 다르게 취급된다.
    fn claims(&self, params: Option<&Params>) -> ApiResult<Value> {
        let access_key = self.config.api_key().ok_or_else(|| ApiError::AuthenticationError {
            message: "Access key required".to_string(),
        })?;

        let mut claims = serde_json::json!({
            "access_key": access_key,
            "nonce": self.nonce.next(),
        });

        if let Some(params) = params {
            if !params.is_empty() {
                let query = params.encode();
                claims["query_hash"] = Value::String(sha512_hex(&query));
                claims["query_hash_alg"] = Value::String("SHA512".to_string());
            }
        }

        Ok(claims)
    }
}

/// 캔들 조회 공통 파라미터
fn candle_params(market: &str, to: Option<&str>, count: Option<u32>) -> Params {
    let mut params = Params::new().with("market", market);
    if let Some(to) = to {
        params.insert("to", to);
    }
    if let Some(count) = count {
        params.insert("count", count.to_string());
    }
    params
}

/// POST body용 JSON 오브젝트 변환 (리스트 파라미터는 배열로)
fn params_to_json(params: &Params) -> Value {
    let mut map = Map::new();
    for (key, value) in params.pairs() {
        match params.get(key.trim_end_matches("[]")) {
            Some(ParamValue::List(_)) => {
                let entry = map
                    .entry(key.trim_end_matches("[]").to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    items.push(Value::String(value));
                }
            }
            _ => {
                map.insert(key, Value::String(value));
            }
        }
    }
    Value::Object(map)
}

/// HS256 JWT 생성 (base64url 세그먼트, 패딩 없음)
fn jwt_hs256(claims: &Value, secret: &str) -> String {
    let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
    let header_b64 = base64url_encode(header.to_string().as_bytes());
    let claims_b64 = base64url_encode(claims.to_string().as_bytes());
    let message = format!("{}.{}", header_b64, claims_b64);
    let signature = base64url_encode(&hmac_sha256(secret, &message));
    format!("{}.{}", message, signature)
}
