//! HTTP client for API requests
//!
//! reqwest 래퍼. 모든 요청은 429 재시도 루프를 통과하며, 그 외 비 2xx
//! 응답은 거래소 에러 코드와 요청 컨텍스트를 담은 타입 에러로 변환된다.

use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use crate::client::{ExchangeConfig, RetryPolicy};
use crate::errors::{ApiError, ApiResult};
use crate::utils::Params;

/// 상태 코드, 응답 헤더, 디코딩된 본문을 담은 HTTP 응답
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// 헤더 (이름은 소문자로 정규화됨)
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl HttpResponse {
    /// 응답 헤더 조회 (이름은 대소문자 무시)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

/// HTTP 클라이언트
pub struct HttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpClient {
    /// 새로운 HTTP 클라이언트 생성
    pub fn new(base_url: impl Into<String>, config: &ExchangeConfig) -> ApiResult<Self> {
        let base_url = base_url.into();

        let mut builder = Client::builder();
        if let Some(timeout_ms) = config.timeout_ms() {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build().map_err(|e| ApiError::NetworkError {
            url: base_url.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::new(Duration::from_millis(config.retry_delay_ms())),
        })
    }

    /// GET 요청. 파라미터는 서명 입력과 동일한 인코딩으로 쿼리 문자열에 붙는다.
    pub async fn get(
        &self,
        path: &str,
        params: Option<&Params>,
        headers: Option<HashMap<String, String>>,
    ) -> ApiResult<HttpResponse> {
        let query = params.map(|p| p.encode()).filter(|q| !q.is_empty());
        let url = self.url_with_query(path, query.as_deref());
        self.retry
            .run(|| self.execute(Method::GET, url.clone(), Body::None, headers.clone(), query.clone()))
            .await
    }

    /// POST 요청 (urlencoded form body)
    pub async fn post_form(
        &self,
        path: &str,
        body: String,
        headers: Option<HashMap<String, String>>,
    ) -> ApiResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        self.retry
            .run(|| {
                self.execute(
                    Method::POST,
                    url.clone(),
                    Body::Form(body.clone()),
                    headers.clone(),
                    Some(body.clone()),
                )
            })
            .await
    }

    /// POST 요청 (JSON body)
    pub async fn post_json(
        &self,
        path: &str,
        body: Value,
        headers: Option<HashMap<String, String>>,
    ) -> ApiResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        let params_repr = body.to_string();
        self.retry
            .run(|| {
                self.execute(
                    Method::POST,
                    url.clone(),
                    Body::Json(body.clone()),
                    headers.clone(),
                    Some(params_repr.clone()),
                )
            })
            .await
    }

    /// DELETE 요청
    pub async fn delete(
        &self,
        path: &str,
        params: Option<&Params>,
        headers: Option<HashMap<String, String>>,
    ) -> ApiResult<HttpResponse> {
        let query = params.map(|p| p.encode()).filter(|q| !q.is_empty());
        let url = self.url_with_query(path, query.as_deref());
        self.retry
            .run(|| {
                self.execute(Method::DELETE, url.clone(), Body::None, headers.clone(), query.clone())
            })
            .await
    }

    fn url_with_query(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}{}?{}", self.base_url, path, q),
            None => format!("{}{}", self.base_url, path),
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: String,
        body: Body,
        headers: Option<HashMap<String, String>>,
        params_repr: Option<String>,
    ) -> ApiResult<HttpResponse> {
        debug!(method = %method, url = %url, "sending request");

        let mut request = self.client.request(method.clone(), &url);

        match &body {
            Body::None => {}
            Body::Form(form) => {
                request = request
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(form.clone());
            }
            Body::Json(json) => {
                request = request.json(json);
            }
        }

        if let Some(headers) = &headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.send().await?;
        let status = response.status();

        // 429는 재시도 루프가 소비한다
        if status.as_u16() == 429 {
            return Err(ApiError::RateLimited { url });
        }

        let header_map: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let text = response.text().await?;
        let body_value: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            let code = extract_error_code(&body_value)
                .unwrap_or_else(|| status.as_u16().to_string());
            error!(method = %method, url = %url, status = status.as_u16(), code = %code, "request rejected");
            return Err(ApiError::RequestFailed {
                code,
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                method: method.to_string(),
                url,
                params: params_repr,
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers: header_map,
            body: body_value,
        })
    }
}

enum Body {
    None,
    Form(String),
    Json(Value),
}

/// 에러 본문에서 거래소 에러 코드를 추출한다.
///
/// - Upbit: `{"error": {"name": ..., "message": ...}}`
/// - Bithumb: `{"status": "5100", "message": ...}`
/// - Binance: `{"code": -1121, "msg": ...}`
fn extract_error_code(body: &Value) -> Option<String> {
    if let Some(name) = body.pointer("/error/name") {
        return Some(match name {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    if let Some(Value::String(status)) = body.get("status") {
        return Some(status.clone());
    }
    if let Some(code) = body.get("code") {
        return Some(code.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_upbit_error_name() {
        let body = json!({"error": {"name": "invalid_access_key", "message": "잘못된 엑세스 키입니다."}});
        assert_eq!(
            extract_error_code(&body),
            Some("invalid_access_key".to_string())
        );
    }

    #[test]
    fn test_extract_upbit_numeric_error_name() {
        // 일부 에러는 name이 숫자로 온다
        let body = json!({"error": {"name": 400, "message": "Bad Request"}});
        assert_eq!(extract_error_code(&body), Some("400".to_string()));
    }

    #[test]
    fn test_extract_bithumb_status() {
        let body = json!({"status": "5100", "message": "Bad Request"});
        assert_eq!(extract_error_code(&body), Some("5100".to_string()));
    }

    #[test]
    fn test_extract_binance_code() {
        let body = json!({"code": -1121, "msg": "Invalid symbol."});
        assert_eq!(extract_error_code(&body), Some("-1121".to_string()));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_error_code(&json!({"data": []})), None);
        assert_eq!(extract_error_code(&Value::Null), None);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("remaining-req".to_string(), "group=default; min=590; sec=9".to_string());
        let res = HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers,
            body: Value::Null,
        };
        assert_eq!(
            res.header("Remaining-Req"),
            Some("group=default; min=590; sec=9")
        );
        assert_eq!(res.header("X-Absent"), None);
    }
}
