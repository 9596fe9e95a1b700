//! Rate-limit retry policy
//!
//! HTTP 429 응답에 대한 고정 지연 재시도 루프. 429는 거래소가 부과하는
//! 일시적 제한이므로 성공하거나 다른 에러가 날 때까지 동일 요청을
//! 무제한 재전송한다. 그 외 에러는 즉시 반환된다.
//!
//! 지연 함수를 주입받는 형태라 테스트에서 실제 sleep 없이 검증할 수 있다.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::errors::{ApiError, ApiResult};

/// 관측된 거래소 동작 기준 기본 재시도 지연 (밀리초)
pub const RATE_LIMIT_RETRY_MS: u64 = 100;

/// 429 재시도 정책
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(RATE_LIMIT_RETRY_MS),
        }
    }
}

impl RetryPolicy {
    /// 지정한 지연으로 재시도 정책 생성
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 연산을 실행하고 [`ApiError::RateLimited`]인 동안 고정 지연 후 재시도한다.
    ///
    /// 대기는 해당 호출에 국한되며 동시 진행 중인 다른 호출을 멈추지 않는다.
    pub async fn run<T, F, Fut>(&self, op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        self.run_with(op, tokio::time::sleep).await
    }

    /// [`run`](Self::run)과 동일하되 지연 함수를 주입받는다.
    pub async fn run_with<T, F, Fut, W, WFut>(&self, mut op: F, mut wait: W) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
        W: FnMut(Duration) -> WFut,
        WFut: Future<Output = ()>,
    {
        loop {
            match op().await {
                Err(ApiError::RateLimited { url }) => {
                    warn!(url = %url, delay_ms = self.delay.as_millis() as u64, "rate limited, retrying");
                    wait(self.delay).await;
                }
                other => return other,
            }
        }
    }
}
