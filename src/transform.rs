//! Recursive number coercion for API payloads
//!
//! 거래소 API는 숫자 필드를 문자열로 직렬화하는 관례가 있다
//! (`"opening_price": "4207000"`). 이 모듈은 디코딩된 JSON 값을 재귀적으로
//! 순회하며 숫자 형태의 문자열을 네이티브 숫자로 변환한다.
//!
//! - 구조는 보존되고 입력은 절대 변경되지 않는다 (항상 새 값 반환).
//! - 멱등: 두 번 적용해도 한 번 적용한 결과와 같다.
//! - 제외 키 집합에 속한 키의 값은 그대로 통과한다. 상태 코드처럼 숫자로
//!   보이지만 의미상 열거형인 필드(`"0000"`)를 보호하기 위한 것으로,
//!   앞자리 0이 유실되면 안 된다.

use serde_json::{Map, Number, Value};

/// 숫자형 문자열을 숫자로 변환한 새 JSON 값을 반환한다.
///
/// `exclude`에 포함된 키는 어느 깊이에서든 값이 손대지 않은 채 복사된다.
pub fn coerce_numbers(value: &Value, exclude: &[&str]) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items.iter().map(|item| coerce_numbers(item, exclude)).collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                if exclude.iter().any(|e| e == key) {
                    out.insert(key.clone(), val.clone());
                } else {
                    out.insert(key.clone(), coerce_numbers(val, exclude));
                }
            }
            Value::Object(out)
        }
        Value::String(s) => coerce_string(s),
        other => other.clone(),
    }
}

/// 단일 문자열에 대한 변환 시도. 변환 불가면 문자열 그대로 복사.
fn coerce_string(s: &str) -> Value {
    if is_integer_literal(s) {
        // i64 범위를 넘는 정수 문자열은 그대로 둔다
        if let Ok(n) = s.parse::<i64>() {
            return Value::Number(Number::from(n));
        }
    } else if is_float_literal(s) {
        if let Ok(f) = s.parse::<f64>() {
            // 오버플로로 inf가 되는 경우는 표현 불가이므로 문자열 유지
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    Value::String(s.to_string())
}

/// 정수 패턴: 선택적 선행 마이너스 + 숫자만
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// 실수 패턴: 숫자, 소수점, 숫자, 선택적 지수부
fn is_float_literal(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let Some(dot) = mantissa.find('.') else {
        return false;
    };
    let int_part = &mantissa[..dot];
    let frac_part = &mantissa[dot + 1..];
    if int_part.is_empty()
        || frac_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return false;
    }

    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_literal() {
        assert!(is_integer_literal("0"));
        assert!(is_integer_literal("1234"));
        assert!(is_integer_literal("-42"));
        assert!(is_integer_literal("0000"));
        assert!(!is_integer_literal(""));
        assert!(!is_integer_literal("-"));
        assert!(!is_integer_literal("1.5"));
        assert!(!is_integer_literal("12a"));
        assert!(!is_integer_literal("+7"));
    }

    #[test]
    fn test_float_literal() {
        assert!(is_float_literal("1.5"));
        assert!(is_float_literal("-0.0005"));
        assert!(is_float_literal("23095834.33763"));
        assert!(is_float_literal("1.5e10"));
        assert!(is_float_literal("2.5E-3"));
        assert!(!is_float_literal("1234"));
        assert!(!is_float_literal(".5"));
        assert!(!is_float_literal("5."));
        assert!(!is_float_literal("1.5e"));
        assert!(!is_float_literal("1,234.5"));
        assert!(!is_float_literal("KRW-BTC"));
    }

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(coerce_string("4207000"), json!(4207000));
        assert_eq!(coerce_string("-37000"), json!(-37000));
        assert_eq!(coerce_string("0.0131486264"), json!(0.0131486264));
        assert_eq!(coerce_string("BTC"), json!("BTC"));
        assert_eq!(coerce_string(""), json!(""));
    }

    #[test]
    fn test_i64_overflow_stays_string() {
        let huge = "99999999999999999999999";
        assert_eq!(coerce_string(huge), json!(huge));
    }

    #[test]
    fn test_infinite_float_stays_string() {
        let huge = "1.0e999";
        assert_eq!(coerce_string(huge), json!(huge));
    }

    #[test]
    fn test_nested_structure_preserved() {
        let input = json!({
            "data": {
                "opening_price": "13604000",
                "units_traded": "14.71960286",
                "date": "1417141032622",
                "currency": "BTC",
                "bids": [
                    {"price": "13600000", "quantity": "0.0031"},
                    {"price": "13599000", "quantity": "1.2"}
                ]
            }
        });
        let out = coerce_numbers(&input, &[]);
        assert_eq!(out["data"]["opening_price"], json!(13604000));
        assert_eq!(out["data"]["units_traded"], json!(14.71960286));
        assert_eq!(out["data"]["date"], json!(1417141032622i64));
        assert_eq!(out["data"]["currency"], json!("BTC"));
        assert_eq!(out["data"]["bids"][0]["price"], json!(13600000));
        assert_eq!(out["data"]["bids"][1]["quantity"], json!(1.2));
    }

    #[test]
    fn test_exclusion_keeps_status_textual() {
        let input = json!({"status": "0000", "data": {"count": "3"}});
        let out = coerce_numbers(&input, &["status"]);
        assert_eq!(out["status"], json!("0000"));
        assert_eq!(out["data"]["count"], json!(3));
    }

    #[test]
    fn test_exclusion_applies_at_any_depth() {
        let input = json!({"outer": {"status": "0000"}});
        let out = coerce_numbers(&input, &["status"]);
        assert_eq!(out["outer"]["status"], json!("0000"));
    }

    #[test]
    fn test_excluded_subtree_untouched() {
        let input = json!({"info": {"volume": "12.5"}, "volume": "12.5"});
        let out = coerce_numbers(&input, &["info"]);
        assert_eq!(out["info"]["volume"], json!("12.5"));
        assert_eq!(out["volume"], json!(12.5));
    }

    #[test]
    fn test_non_string_scalars_pass_through() {
        let input = json!({"a": 1, "b": 2.5, "c": true, "d": null});
        assert_eq!(coerce_numbers(&input, &[]), input);
    }

    #[test]
    fn test_idempotent() {
        let input = json!({
            "status": "0000",
            "data": [
                {"price": "13600000", "ratio": "-0.53", "side": "bid", "exp": "1.5e3"},
                {"price": 13599000, "ratio": -0.53, "side": "ask", "note": null}
            ]
        });
        let once = coerce_numbers(&input, &["status"]);
        let twice = coerce_numbers(&once, &["status"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_not_mutated() {
        let input = json!({"price": "100"});
        let _ = coerce_numbers(&input, &[]);
        assert_eq!(input["price"], json!("100"));
    }
}
