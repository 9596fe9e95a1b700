//! Exchange configuration

use crate::client::retry::RATE_LIMIT_RETRY_MS;

/// 거래소 설정
///
/// 인증 키 쌍은 불투명 문자열로만 취급되며 클라이언트 수명 동안 보관된다.
/// 어디에도 저장하거나 로깅하지 않는다.
#[derive(Clone)]
pub struct ExchangeConfig {
    api_key: Option<String>,
    api_secret: Option<String>,
    timeout_ms: Option<u64>,
    retry_delay_ms: u64,
}

impl ExchangeConfig {
    /// 새로운 빈 설정 생성
    pub fn new() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            timeout_ms: None,
            retry_delay_ms: RATE_LIMIT_RETRY_MS,
        }
    }

    /// API 키 설정 (Bithumb connect key / Upbit access key / Binance API key)
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// API 시크릿 설정
    pub fn with_api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    /// 인증 정보로 설정
    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    /// 타임아웃 설정 (밀리초). 미설정 시 전송 계층 기본값을 그대로 쓴다.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 429 재시도 지연 설정 (밀리초)
    pub fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    // === Getters ===

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn api_secret(&self) -> Option<&str> {
        self.api_secret.as_deref()
    }

    /// secret 별칭
    pub fn secret(&self) -> Option<&str> {
        self.api_secret.as_deref()
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    pub fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms
    }

    /// 인증 정보 유효성 확인
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::new()
    }
}

// 키 값이 로그나 패닉 메시지에 새지 않도록 Debug를 직접 구현한다.
impl std::fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}
