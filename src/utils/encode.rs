//! Request parameter encoding
//!
//! 요청 파라미터를 결정적 순서로 URL 인코딩한다. 서명 입력(쿼리 해시)과
//! 실제 전송되는 쿼리 문자열이 항상 일치해야 하므로 정렬 맵을 사용한다.
//! 리스트 값은 `key[]=value` 쌍의 반복으로 직렬화된다.

use std::collections::BTreeMap;

/// 파라미터 값: 스칼라 또는 스칼라 리스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

/// 요청 파라미터 (키 정렬 순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// 새 빈 파라미터 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 스칼라 파라미터 추가
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), ParamValue::Scalar(value.into()));
    }

    /// 리스트 파라미터 추가 (`key[]=v1&key[]=v2` 로 직렬화)
    pub fn insert_list<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(
            key.into(),
            ParamValue::List(values.into_iter().map(Into::into).collect()),
        );
    }

    /// 스칼라 파라미터 추가 (빌더 스타일)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// 리스트 파라미터 추가 (빌더 스타일)
    pub fn with_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_list(key, values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// 전송용 키/값 쌍. 리스트 키는 `key[]` 로 반복된다.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            match value {
                ParamValue::Scalar(v) => out.push((key.clone(), v.clone())),
                ParamValue::List(vs) => {
                    for v in vs {
                        out.push((format!("{}[]", key), v.clone()));
                    }
                }
            }
        }
        out
    }

    /// URL 인코딩된 쿼리 문자열. 값만 퍼센트 인코딩하고 키(`[]` 포함)는
    /// 그대로 둔다 — 서명 해시 입력과 전송 쿼리가 동일해야 한다.
    pub fn encode(&self) -> String {
        self.pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scalar() {
        let params = Params::new()
            .with("market", "KRW-BTC")
            .with("count", "10");
        // BTreeMap: 키 정렬 순서
        assert_eq!(params.encode(), "count=10&market=KRW-BTC");
    }

    #[test]
    fn test_encode_list_as_repeated_bracket_pairs() {
        let params = Params::new().with_list("markets", ["KRW-BTC", "KRW-ETH"]);
        assert_eq!(params.encode(), "markets[]=KRW-BTC&markets[]=KRW-ETH");
    }

    #[test]
    fn test_encode_percent_escapes_values_only() {
        let params = Params::new().with("to", "2019-01-01 12:00:00");
        assert_eq!(params.encode(), "to=2019-01-01%2012%3A00%3A00");
    }

    #[test]
    fn test_encode_mixed() {
        let params = Params::new()
            .with("market", "KRW-BTC")
            .with_list("states", ["wait", "watch"]);
        assert_eq!(
            params.encode(),
            "market=KRW-BTC&states[]=wait&states[]=watch"
        );
    }

    #[test]
    fn test_pairs_expand_lists() {
        let params = Params::new().with_list("uuids", ["a", "b", "c"]);
        let pairs = params.pairs();
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(k, _)| k == "uuids[]"));
    }

    #[test]
    fn test_empty() {
        let params = Params::new();
        assert!(params.is_empty());
        assert_eq!(params.encode(), "");
    }
}
