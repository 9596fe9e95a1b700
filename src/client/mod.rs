//! HTTP Client and related utilities

mod config;
mod http;
mod nonce;
mod retry;

pub use config::ExchangeConfig;
pub use http::{HttpClient, HttpResponse};
pub use nonce::{EpochMillis, NonceSource, RandomUuid};
pub use retry::{RetryPolicy, RATE_LIMIT_RETRY_MS};
