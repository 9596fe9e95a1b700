//! Bithumb Exchange API
//!
//! 빗썸 거래소 REST API 구현
//!
//! Public 엔드포인트는 GET, Private 엔드포인트는 HMAC-SHA512 서명이 붙은
//! POST(form body)로 호출된다. 서명은 `endpoint + NUL + body + NUL + nonce`를
//! HMAC-SHA512로 서명한 뒤 hex 문자열을 다시 base64로 감싸는 이중 인코딩을
//! 쓴다 — 거래소 프로토콜 고유의 방식이므로 그대로 보존해야 서명이 수리된다.
//!
//! 숫자 필드는 문자열로 내려오며, 각 응답의 [`normalized`](BithumbResponse::normalized)
//! 연산이 숫자로 변환된 뷰를 돌려준다. `status`는 `"0000"` 같은 코드 문자열이라
//! 변환에서 제외된다.
//!
//! https://apidocs.bithumb.com

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::client::{EpochMillis, ExchangeConfig, HttpClient, NonceSource};
use crate::errors::{ApiError, ApiResult};
use crate::transform::coerce_numbers;
use crate::utils::crypto::{base64_encode, hmac_sha512_hex};
use crate::utils::Params;

const BASE_URL: &str = "https://api.bithumb.com";
const SUCCESS_STATUS: &str = "0000";

/// 정규화에서 제외되는 키: 상태 코드는 숫자처럼 보여도 열거형이다
const EXCLUDED_KEYS: &[&str] = &["status"];

/// 응답 엔벨로프
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbResponse<T> {
    pub status: String,
    pub data: T,
}

impl<T: Serialize> BithumbResponse<T> {
    /// 숫자형 문자열 필드를 숫자로 변환한 뷰를 반환한다 (`status` 제외).
    pub fn normalized(&self) -> ApiResult<Value> {
        Ok(coerce_numbers(&serde_json::to_value(self)?, EXCLUDED_KEYS))
    }
}

// === API Response Types ===

/// 현재가 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbTicker {
    pub opening_price: String,
    pub closing_price: String,
    pub min_price: String,
    pub max_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<String>,
    pub units_traded: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_1day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_7day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<String>,
    #[serde(rename = "24H_fluctate", skip_serializing_if = "Option::is_none")]
    pub fluctate_24h: Option<String>,
    #[serde(rename = "24H_fluctate_rate", skip_serializing_if = "Option::is_none")]
    pub fluctate_rate_24h: Option<String>,
    /// 단일 조회에만 포함. 전체 조회는 최상위 date가 복사된다.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// 전체 현재가: 최상위 date + 통화별 티커
#[derive(Debug, Clone, Serialize)]
pub struct BithumbAllTickers {
    pub date: String,
    pub tickers: BTreeMap<String, BithumbTicker>,
}

/// 호가 단위
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbOrderbookEntry {
    pub price: String,
    pub quantity: String,
}

/// 호가 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbOrderbook {
    pub timestamp: String,
    pub order_currency: String,
    pub payment_currency: String,
    pub bids: Vec<BithumbOrderbookEntry>,
    pub asks: Vec<BithumbOrderbookEntry>,
}

/// 체결 완료 내역
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cont_no: Option<String>,
    pub transaction_date: String,
    /// bid(매수) / ask(매도)
    #[serde(rename = "type")]
    pub side: String,
    pub units_traded: String,
    pub price: String,
    pub total: String,
}

/// 회원 정보 및 수수료
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbAccount {
    pub created: String,
    pub account_id: String,
    pub trade_fee: String,
    pub balance: String,
}

/// 통화별 자산 (flat한 `total_*`/`in_use_*`/`available_*` 키를 재구성한 것)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbBalance {
    pub currency: String,
    pub total: String,
    pub in_use: String,
    pub available: String,
    /// 마지막 체결가. KRW 항목에는 없다.
    pub xcoin_last: Option<Value>,
}

/// 입금 지갑 주소
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbWalletAddress {
    pub wallet_address: String,
    pub currency: String,
}

/// 회원 거래 정보 (인증 티커)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbTickerInfo {
    pub opening_price: String,
    pub closing_price: String,
    pub min_price: String,
    pub max_price: String,
    pub average_price: String,
    pub units_traded: Value,
    pub volume_1day: Value,
    pub volume_7day: Value,
    pub buy_price: String,
    pub sell_price: String,
    #[serde(rename = "24H_fluctate")]
    pub fluctate_24h: Value,
    #[serde(rename = "24H_fluctate_rate")]
    pub fluctate_rate_24h: Value,
    pub date: String,
}

/// 대기/진행 중 주문
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbOrderInfo {
    pub order_id: String,
    pub order_currency: String,
    pub payment_currency: String,
    pub order_date: i64,
    /// bid / ask
    #[serde(rename = "type")]
    pub side: String,
    pub units: String,
    pub units_remaining: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_price: Option<String>,
}

/// 체결 내역 상세
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbOrderDetail {
    pub transaction_date: String,
    #[serde(rename = "type")]
    pub side: String,
    pub order_currency: String,
    pub payment_currency: String,
    pub units_traded: String,
    pub price: String,
    pub fee: String,
    pub total: String,
}

/// 거래 완료 내역. `{cc}1krw` / `{cc}_remain` 형태의 동적 키는
/// `currency` / `one_krw` / `remain`으로 재구성된다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbUserTransaction {
    pub search: String,
    pub transfer_date: i64,
    pub units: String,
    pub price: String,
    pub fee: String,
    pub krw_remain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_krw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remain: Option<String>,
}

/// 주문 접수 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbTradeResponse {
    pub status: String,
    pub order_id: String,
    /// 시장가 주문 즉시 체결 내역
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<BithumbContract>>,
}

impl BithumbTradeResponse {
    /// 숫자형 문자열 필드를 숫자로 변환한 뷰 (`status` 제외)
    pub fn normalized(&self) -> ApiResult<Value> {
        Ok(coerce_numbers(&serde_json::to_value(self)?, EXCLUDED_KEYS))
    }
}

/// 즉시 체결 단위
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbContract {
    pub cont_id: String,
    pub units: String,
    pub price: String,
    pub total: Value,
    pub fee: String,
}

/// 상태만 담는 응답 (취소 등)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbStatus {
    pub status: String,
}

/// Bithumb 거래소 클라이언트
pub struct Bithumb {
    config: ExchangeConfig,
    client: HttpClient,
    nonce: Box<dyn NonceSource>,
}

impl Bithumb {
    /// 새 Bithumb 인스턴스 생성
    pub fn new(config: ExchangeConfig) -> ApiResult<Self> {
        let client = HttpClient::new(BASE_URL, &config)?;
        Ok(Self {
            config,
            client,
            nonce: Box::new(EpochMillis),
        })
    }

    /// nonce 소스 교체 (테스트에서 결정적 nonce 주입용)
    pub fn with_nonce_source(mut self, nonce: Box<dyn NonceSource>) -> Self {
        self.nonce = nonce;
        self
    }

    // === Public API ===

    /// 현재가 정보 조회 (단일 통화)
    ///
    /// GET /public/ticker/{currency}
    pub async fn ticker(&self, currency: &str) -> ApiResult<BithumbResponse<BithumbTicker>> {
        let body = self
            .public_request(&format!("/public/ticker/{}", currency), None)
            .await?;
        parse(body, "ticker")
    }

    /// 현재가 정보 조회 (전체 통화)
    ///
    /// GET /public/ticker/ALL — 최상위 `date`가 각 통화 항목에도 복사된다.
    pub async fn ticker_all(&self) -> ApiResult<BithumbResponse<BithumbAllTickers>> {
        let body = self.public_request("/public/ticker/ALL", None).await?;
        let envelope: BithumbResponse<BTreeMap<String, Value>> = parse(body, "ticker_all")?;

        let date = envelope
            .data
            .get("date")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .to_string();

        let mut tickers = BTreeMap::new();
        for (currency, value) in &envelope.data {
            if currency == "date" {
                continue;
            }
            let mut ticker: BithumbTicker =
                serde_json::from_value(value.clone()).map_err(|e| ApiError::ParseError {
                    data_type: "ticker_all".to_string(),
                    message: format!("{}: {}", currency, e),
                })?;
            ticker.date = Some(date.clone());
            tickers.insert(currency.clone(), ticker);
        }

        Ok(BithumbResponse {
            status: envelope.status,
            data: BithumbAllTickers { date, tickers },
        })
    }

    /// 호가 정보 조회
    ///
    /// GET /public/orderbook/{currency}
    ///
    /// * `group_orders` - 0: 주문 전체, 1: 호가 별 묶음 (기본 1)
    /// * `count` - 1~50 (기본 5)
    pub async fn orderbook(
        &self,
        currency: &str,
        group_orders: Option<u32>,
        count: Option<u32>,
    ) -> ApiResult<BithumbResponse<BithumbOrderbook>> {
        let mut params = Params::new();
        if let Some(group_orders) = group_orders {
            params.insert("group_orders", group_orders.to_string());
        }
        if let Some(count) = count {
            params.insert("count", count.to_string());
        }
        let params = if params.is_empty() { None } else { Some(params) };

        let body = self
            .public_request(&format!("/public/orderbook/{}", currency), params.as_ref())
            .await?;
        parse(body, "orderbook")
    }

    /// 체결 완료 내역 조회
    ///
    /// GET /public/transaction_history/{currency}
    ///
    /// * `cont_no` - 체결 번호 (입력 시 해당 번호 이전의 데이터)
    /// * `count` - 1~100 (기본 20)
    pub async fn transaction_history(
        &self,
        currency: &str,
        cont_no: Option<u64>,
        count: Option<u32>,
    ) -> ApiResult<BithumbResponse<Vec<BithumbTransaction>>> {
        let mut params = Params::new();
        if let Some(cont_no) = cont_no {
            params.insert("cont_no", cont_no.to_string());
        }
        if let Some(count) = count {
            params.insert("count", count.to_string());
        }
        let params = if params.is_empty() { None } else { Some(params) };

        let body = self
            .public_request(
                &format!("/public/transaction_history/{}", currency),
                params.as_ref(),
            )
            .await?;
        parse(body, "transaction_history")
    }

    // === Private API ===

    /// 회원 정보 및 거래 수수료 조회
    ///
    /// POST /info/account
    pub async fn account_info(
        &self,
        currency: &str,
    ) -> ApiResult<BithumbResponse<BithumbAccount>> {
        let params = Params::new()
            .with("order_currency", currency)
            .with("payment_currency", "KRW");
        let body = self.private_request("/info/account", &params).await?;
        parse(body, "account_info")
    }

    /// 보유 자산 조회 (단일 통화 + KRW)
    ///
    /// POST /info/balance
    pub async fn balance(&self, currency: &str) -> ApiResult<BithumbResponse<Vec<BithumbBalance>>> {
        let params = Params::new().with("currency", currency);
        let body = self.private_request("/info/balance", &params).await?;
        Self::reshape_balances(body)
    }

    /// 보유 자산 조회 (전체 통화)
    ///
    /// POST /info/balance, currency=ALL
    pub async fn balance_all(&self) -> ApiResult<BithumbResponse<Vec<BithumbBalance>>> {
        let params = Params::new().with("currency", "ALL");
        let body = self.private_request("/info/balance", &params).await?;
        Self::reshape_balances(body)
    }

    /// 코인 입금 지갑 주소 조회
    ///
    /// POST /info/wallet_address
    pub async fn wallet_address(
        &self,
        currency: &str,
    ) -> ApiResult<BithumbResponse<BithumbWalletAddress>> {
        let params = Params::new().with("currency", currency);
        let body = self.private_request("/info/wallet_address", &params).await?;
        parse(body, "wallet_address")
    }

    /// 회원의 암호화폐 거래 정보 조회
    ///
    /// POST /info/ticker
    pub async fn ticker_info(
        &self,
        order_currency: &str,
        payment_currency: &str,
    ) -> ApiResult<BithumbResponse<BithumbTickerInfo>> {
        let params = Params::new()
            .with("order_currency", order_currency)
            .with("payment_currency", payment_currency);
        let body = self.private_request("/info/ticker", &params).await?;
        parse(body, "ticker_info")
    }

    /// 매수/매도 등록 대기 또는 거래 중 내역 조회
    ///
    /// POST /info/orders
    pub async fn orders_info(
        &self,
        currency: &str,
        order_id: Option<&str>,
        side: Option<&str>,
        count: Option<u32>,
        after: Option<i64>,
    ) -> ApiResult<BithumbResponse<Vec<BithumbOrderInfo>>> {
        let mut params = Params::new().with("currency", currency);
        if let Some(order_id) = order_id {
            params.insert("order_id", order_id);
        }
        if let Some(side) = side {
            params.insert("type", side);
        }
        if let Some(count) = count {
            params.insert("count", count.to_string());
        }
        if let Some(after) = after {
            params.insert("after", after.to_string());
        }
        let body = self.private_request("/info/orders", &params).await?;
        parse(body, "orders_info")
    }

    /// 매수/매도 체결 내역 상세 조회
    ///
    /// POST /info/order_detail
    pub async fn order_detail(
        &self,
        currency: &str,
        order_id: &str,
        side: &str,
    ) -> ApiResult<BithumbResponse<BithumbOrderDetail>> {
        let params = Params::new()
            .with("currency", currency)
            .with("order_id", order_id)
            .with("type", side);
        let body = self.private_request("/info/order_detail", &params).await?;
        parse(body, "order_detail")
    }

    /// 거래 완료 내역 조회
    ///
    /// POST /info/user_transactions
    ///
    /// * `search_gb` - 0: 전체, 1: 매수, 2: 매도, 3: 출금 중, 4: 입금, 5: 출금
    pub async fn user_transactions(
        &self,
        currency: &str,
        offset: Option<u32>,
        count: Option<u32>,
        search_gb: Option<u32>,
    ) -> ApiResult<BithumbResponse<Vec<BithumbUserTransaction>>> {
        let mut params = Params::new().with("currency", currency);
        if let Some(offset) = offset {
            params.insert("offset", offset.to_string());
        }
        if let Some(count) = count {
            params.insert("count", count.to_string());
        }
        if let Some(search_gb) = search_gb {
            params.insert("searchGb", search_gb.to_string());
        }
        let body = self
            .private_request("/info/user_transactions", &params)
            .await?;
        Self::reshape_user_transactions(body)
    }

    /// 지정가 매수/매도 등록
    ///
    /// POST /trade/place
    pub async fn place(
        &self,
        order_currency: &str,
        payment_currency: &str,
        units: &str,
        price: &str,
        side: &str,
    ) -> ApiResult<BithumbTradeResponse> {
        let params = Params::new()
            .with("order_currency", order_currency)
            .with("payment_currency", payment_currency)
            .with("units", units)
            .with("price", price)
            .with("type", side);
        let body = self.private_request("/trade/place", &params).await?;
        parse(body, "place")
    }

    /// 시장가 매수
    ///
    /// POST /trade/market_buy
    pub async fn market_buy(&self, currency: &str, units: &str) -> ApiResult<BithumbTradeResponse> {
        let params = Params::new()
            .with("currency", currency)
            .with("units", units);
        let body = self.private_request("/trade/market_buy", &params).await?;
        parse(body, "market_buy")
    }

    /// 시장가 매도
    ///
    /// POST /trade/market_sell
    pub async fn market_sell(
        &self,
        currency: &str,
        units: &str,
    ) -> ApiResult<BithumbTradeResponse> {
        let params = Params::new()
            .with("currency", currency)
            .with("units", units);
        let body = self.private_request("/trade/market_sell", &params).await?;
        parse(body, "market_sell")
    }

    /// 등록된 매수/매도 주문 취소
    ///
    /// POST /trade/cancel
    pub async fn cancel(
        &self,
        currency: &str,
        order_id: &str,
        side: &str,
    ) -> ApiResult<BithumbStatus> {
        let params = Params::new()
            .with("currency", currency)
            .with("order_id", order_id)
            .with("type", side);
        let body = self.private_request("/trade/cancel", &params).await?;
        parse(body, "cancel")
    }

    // === Internal ===

    /// HMAC-SHA512 서명 생성
    ///
    /// 서명 입력: `endpoint + NUL + urlencode(params + endpoint) + NUL + nonce`.
    /// digest의 hex 문자열을 다시 base64로 인코딩한다 (이중 인코딩).
    /// 시크릿이 비어 있어도 서명은 계산된다 — 거부는 거래소 몫이다.
    fn sign(&self, endpoint: &str, params: &Params) -> (HashMap<String, String>, String) {
        let api_key = self.config.api_key().unwrap_or("");
        let secret = self.config.secret().unwrap_or("");
        let nonce = self.nonce.next();

        let mut body_params = params.clone();
        body_params.insert("endpoint", endpoint);
        let body = body_params.encode();

        let auth = format!("{}\0{}\0{}", endpoint, body, nonce);
        let signature = base64_encode(hmac_sha512_hex(secret, &auth).as_bytes());

        let mut headers = HashMap::new();
        headers.insert("Api-Key".to_string(), api_key.to_string());
        headers.insert("Api-Sign".to_string(), signature);
        headers.insert("Api-Nonce".to_string(), nonce);

        (headers, body)
    }

    async fn public_request(&self, path: &str, params: Option<&Params>) -> ApiResult<Value> {
        let encoded = params.map(|p| p.encode());
        let res = self.client.get(path, params, None).await?;
        self.check_status(res, "GET", path, encoded)
    }

    async fn private_request(&self, endpoint: &str, params: &Params) -> ApiResult<Value> {
        let (headers, body) = self.sign(endpoint, params);
        let res = self
            .client
            .post_form(endpoint, body.clone(), Some(headers))
            .await?;
        self.check_status(res, "POST", endpoint, Some(body))
    }

    /// 본문 status가 "0000"이 아니면 요청 거부 에러로 변환한다.
    /// 빗썸은 비즈니스 에러도 HTTP 200으로 내려주므로 여기서 걸러야 한다.
    fn check_status(
        &self,
        res: crate::client::HttpResponse,
        method: &str,
        path: &str,
        params: Option<String>,
    ) -> ApiResult<Value> {
        let status = res
            .body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or(SUCCESS_STATUS);

        if status != SUCCESS_STATUS {
            let message = res
                .body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            tracing::error!(code = %status, message = %message, path = %path, "bithumb request rejected");
            return Err(ApiError::RequestFailed {
                code: status.to_string(),
                status: res.status,
                status_text: res.status_text,
                method: method.to_string(),
                url: format!("{}{}", BASE_URL, path),
                params,
            });
        }

        Ok(res.body)
    }

    /// `total_*` / `in_use_*` / `available_*` flat 키를 통화별 항목으로 재구성
    fn reshape_balances(body: Value) -> ApiResult<BithumbResponse<Vec<BithumbBalance>>> {
        let status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or(SUCCESS_STATUS)
            .to_string();
        let data = body
            .get("data")
            .and_then(|d| d.as_object())
            .ok_or_else(|| ApiError::ParseError {
                data_type: "balance".to_string(),
                message: "Missing data object".to_string(),
            })?;

        let mut balances = Vec::new();
        for key in data.keys() {
            let Some(currency) = key.strip_prefix("total_") else {
                continue;
            };

            let field = |prefix: &str| {
                data.get(&format!("{}{}", prefix, currency))
                    .map(string_value)
                    .unwrap_or_default()
            };
            let xcoin_last = if currency == "krw" {
                None
            } else {
                data.get("xcoin_last")
                    .or_else(|| data.get(&format!("xcoin_last_{}", currency)))
                    .cloned()
            };

            balances.push(BithumbBalance {
                currency: currency.to_uppercase(),
                total: field("total_"),
                in_use: field("in_use_"),
                available: field("available_"),
                xcoin_last,
            });
        }

        Ok(BithumbResponse {
            status,
            data: balances,
        })
    }

    /// `{cc}1krw` / `{cc}_remain` 동적 키를 `currency` / `one_krw` / `remain`으로 재구성
    fn reshape_user_transactions(
        body: Value,
    ) -> ApiResult<BithumbResponse<Vec<BithumbUserTransaction>>> {
        let status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or(SUCCESS_STATUS)
            .to_string();
        let data = body
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ApiError::ParseError {
                data_type: "user_transactions".to_string(),
                message: "Missing data array".to_string(),
            })?;

        let mut transactions = Vec::new();
        for item in data {
            let Some(map) = item.as_object() else {
                continue;
            };

            let field = |name: &str| map.get(name).map(string_value).unwrap_or_default();

            let mut currency = None;
            let mut one_krw = None;
            let mut remain = None;
            for (key, value) in map {
                if let Some(cc) = key.strip_suffix("1krw") {
                    currency = Some(cc.to_uppercase());
                    one_krw = Some(string_value(value));
                } else if let Some(cc) = key.strip_suffix("_remain") {
                    if cc != "krw" {
                        currency = Some(cc.to_uppercase());
                        remain = Some(string_value(value));
                    }
                }
            }

            transactions.push(BithumbUserTransaction {
                search: field("search"),
                transfer_date: map
                    .get("transfer_date")
                    .and_then(|v| v.as_i64())
                    .unwrap_or_default(),
                units: field("units"),
                price: field("price"),
                fee: field("fee"),
                krw_remain: field("krw_remain"),
                currency,
                one_krw,
                remain,
            });
        }

        Ok(BithumbResponse {
            status,
            data: transactions,
        })
    }
}

fn parse<T: DeserializeOwned>(body: Value, data_type: &str) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| ApiError::ParseError {
        data_type: data_type.to_string(),
        message: e.to_string(),
    })
}

fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedNonce(&'static str);

    impl NonceSource for FixedNonce {
        fn next(&self) -> String {
            self.0.to_string()
        }
    }

    fn bithumb_with_nonce(nonce: &'static str) -> Bithumb {
        let config = ExchangeConfig::new().with_credentials("connect-key", "secret-key");
        Bithumb::new(config)
            .unwrap()
            .with_nonce_source(Box::new(FixedNonce(nonce)))
    }

    #[test]
    fn test_signature_deterministic_with_same_nonce() {
        let params = Params::new().with("currency", "BTC");
        let (a, _) = bithumb_with_nonce("1417141032622").sign("/info/balance", &params);
        let (b, _) = bithumb_with_nonce("1417141032622").sign("/info/balance", &params);
        assert_eq!(a["Api-Sign"], b["Api-Sign"]);
    }

    #[test]
    fn test_signature_differs_with_different_nonce() {
        let params = Params::new().with("currency", "BTC");
        let (a, _) = bithumb_with_nonce("1417141032622").sign("/info/balance", &params);
        let (b, _) = bithumb_with_nonce("1417141032623").sign("/info/balance", &params);
        assert_ne!(a["Api-Sign"], b["Api-Sign"]);
        assert_ne!(a["Api-Nonce"], b["Api-Nonce"]);
    }

    #[test]
    fn test_signature_is_base64_wrapped_hex() {
        let params = Params::new().with("currency", "BTC");
        let (headers, _) = bithumb_with_nonce("1417141032622").sign("/info/balance", &params);

        // 이중 인코딩: base64 디코드 결과가 128자 hex 문자열
        let decoded = crate::utils::crypto::base64_decode(&headers["Api-Sign"]).unwrap();
        assert_eq!(decoded.len(), 128);
        assert!(decoded.iter().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sign_includes_endpoint_in_body() {
        let params = Params::new().with("currency", "BTC");
        let (headers, body) = bithumb_with_nonce("1417141032622").sign("/info/balance", &params);
        assert_eq!(body, "currency=BTC&endpoint=%2Finfo%2Fbalance");
        assert_eq!(headers["Api-Key"], "connect-key");
        assert_eq!(headers["Api-Nonce"], "1417141032622");
    }

    #[test]
    fn test_sign_proceeds_with_empty_secret() {
        // 시크릿이 없어도 서명은 계산된다. 거부는 거래소가 한다.
        let bithumb = Bithumb::new(ExchangeConfig::new())
            .unwrap()
            .with_nonce_source(Box::new(FixedNonce("1417141032622")));
        let (headers, _) = bithumb.sign("/info/balance", &Params::new());
        assert!(!headers["Api-Sign"].is_empty());
        assert_eq!(headers["Api-Key"], "");
    }

    fn response_with(body: serde_json::Value) -> crate::client::HttpResponse {
        crate::client::HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            body,
            ..Default::default()
        }
    }

    #[test]
    fn test_check_status_passes_success() {
        let bithumb = bithumb_with_nonce("1");
        let body = json!({"status": "0000", "data": []});
        let out = bithumb
            .check_status(response_with(body.clone()), "GET", "/public/ticker/BTC", None)
            .unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_check_status_maps_error_code() {
        let bithumb = bithumb_with_nonce("1");
        let body = json!({"status": "5600", "message": "거래 진행중인 내역이 존재하지 않습니다."});
        let err = bithumb
            .check_status(
                response_with(body),
                "POST",
                "/info/orders",
                Some("currency=BTC&endpoint=%2Finfo%2Forders".to_string()),
            )
            .unwrap_err();
        match err {
            ApiError::RequestFailed {
                code,
                status,
                url,
                method,
                params,
                ..
            } => {
                assert_eq!(code, "5600");
                assert_eq!(status, 200);
                assert_eq!(method, "POST");
                assert!(url.ends_with("/info/orders"));
                assert!(params.unwrap().contains("currency=BTC"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_normalized_keeps_status_textual() {
        let res = BithumbResponse {
            status: "0000".to_string(),
            data: json!({"closing_price": "13604000", "units_traded": "14.71960286"}),
        };
        let normalized = res.normalized().unwrap();
        assert_eq!(normalized["status"], json!("0000"));
        assert_eq!(normalized["data"]["closing_price"], json!(13604000));
        assert_eq!(normalized["data"]["units_traded"], json!(14.71960286));
    }

    #[test]
    fn test_normalized_is_idempotent() {
        let res = BithumbResponse {
            status: "0000".to_string(),
            data: json!([{"price": "13600000", "quantity": "0.0031"}]),
        };
        let once = res.normalized().unwrap();
        let twice = coerce_numbers(&once, EXCLUDED_KEYS);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reshape_balances() {
        let body = json!({
            "status": "0000",
            "data": {
                "total_krw": "2300183",
                "in_use_krw": "10300",
                "available_krw": "2289883",
                "total_btc": "1.0",
                "in_use_btc": "0.0",
                "available_btc": "1.0",
                "xcoin_last": "505000"
            }
        });
        let res = Bithumb::reshape_balances(body).unwrap();
        assert_eq!(res.status, "0000");

        let krw = res.data.iter().find(|b| b.currency == "KRW").unwrap();
        assert_eq!(krw.total, "2300183");
        assert_eq!(krw.in_use, "10300");
        assert!(krw.xcoin_last.is_none());

        let btc = res.data.iter().find(|b| b.currency == "BTC").unwrap();
        assert_eq!(btc.total, "1.0");
        assert_eq!(btc.xcoin_last, Some(json!("505000")));
    }

    #[test]
    fn test_reshape_user_transactions() {
        let body = json!({
            "status": "0000",
            "data": [{
                "search": "1",
                "transfer_date": 1417141032622i64,
                "units": "+0.5",
                "price": "13604000",
                "fee": "0.00025",
                "btc1krw": "13604000",
                "btc_remain": "1.5",
                "krw_remain": "300183"
            }]
        });
        let res = Bithumb::reshape_user_transactions(body).unwrap();
        let tx = &res.data[0];
        assert_eq!(tx.currency.as_deref(), Some("BTC"));
        assert_eq!(tx.one_krw.as_deref(), Some("13604000"));
        assert_eq!(tx.remain.as_deref(), Some("1.5"));
        assert_eq!(tx.krw_remain, "300183");
        assert_eq!(tx.transfer_date, 1417141032622);
    }

    #[test]
    fn test_ticker_envelope_deserialization() {
        let envelope: BithumbResponse<BithumbTicker> = serde_json::from_value(json!({
            "status": "0000",
            "data": {
                "opening_price": "13569000",
                "closing_price": "13604000",
                "min_price": "13432000",
                "max_price": "13690000",
                "average_price": "13548966.5552",
                "units_traded": "14.71960286",
                "volume_1day": "14.71960286",
                "volume_7day": "131.7184911",
                "buy_price": "13601000",
                "sell_price": "13606000",
                "24H_fluctate": "35000",
                "24H_fluctate_rate": "0.25",
                "date": "1417141032622"
            }
        }))
        .unwrap();
        assert_eq!(envelope.status, "0000");
        assert_eq!(envelope.data.fluctate_24h.as_deref(), Some("35000"));

        // 라운드트립 시 rename 보존
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["data"]["24H_fluctate"], json!("35000"));
    }
}
