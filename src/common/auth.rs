//! API key helpers shared by HTTP handlers

use axum::http::{HeaderMap, header};
use subtle::ConstantTimeEq;

/// API key presented by a client
///
/// Checked in order:
/// - `x-api-key` header
/// - `Authorization: Bearer <token>` header (scheme is case-insensitive)
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        return Some(key.to_string());
    }

    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Constant-time string comparison
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
