//! Cryptographic utilities for API signing

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA512 서명 생성
pub fn hmac_sha512(secret: &str, message: &str) -> Vec<u8> {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// HMAC-SHA512 서명을 hex 문자열로 반환
pub fn hmac_sha512_hex(secret: &str, message: &str) -> String {
    hex::encode(hmac_sha512(secret, message))
}

/// HMAC-SHA256 서명 생성 (JWT HS256 용)
pub fn hmac_sha256(secret: &str, message: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// SHA-512 해시를 hex 문자열로 반환 (쿼리 해시용)
pub fn sha512_hex(message: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

/// Base64 인코딩 (표준 알파벳)
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64 디코딩 (표준 알파벳)
pub fn base64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}

/// Base64url 인코딩, 패딩 없음 (JWT 세그먼트용)
pub fn base64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}
