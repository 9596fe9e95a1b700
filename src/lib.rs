//! coinapi-rust: Bithumb / Upbit / Binance API Client Library
//!
//! 빗썸 / 업비트 / 바이낸스 거래소 API 클라이언트
//!
//! 각 거래소별 독립 클라이언트를 제공한다:
//! - [`Bithumb`]: HMAC-SHA512 서명 (Api-Key / Api-Sign / Api-Nonce 헤더)
//! - [`Upbit`]: JWT 서명 (`Authorization: Bearer`) + Remaining-Req 헤더 파싱
//! - [`Binance`] / [`BinanceWs`]: REST 시세 조회 + 캔들 WebSocket 스트림
//!
//! 모든 클라이언트는 HTTP 429 응답에 대해 고정 지연 후 동일 요청을 재전송하며,
//! 숫자형 문자열 필드를 숫자로 변환하는 정규화 연산을 제공한다.

pub mod client;
pub mod errors;
pub mod exchanges;
pub mod transform;
pub mod utils;

// Re-exports
pub use client::{EpochMillis, ExchangeConfig, HttpClient, NonceSource, RandomUuid, RetryPolicy};
pub use errors::{ApiError, ApiResult};
pub use exchanges::{
    Binance, BinanceResponse, BinanceWs, Bithumb, BithumbResponse, CandleEvent, RemainingReq,
    Upbit, UpbitResponse,
};
pub use transform::coerce_numbers;
pub use utils::{ParamValue, Params};
