//! Small helpers for input validation and opaque credential generation.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;

/// Bytes of entropy behind every bearer credential (session id, reset token).
const TOKEN_BYTES: usize = 32;

/// Namespace prefix for password-reset tokens. Reset tokens and session ids
/// have different lifetimes and blast radius; the prefix keeps the two
/// credential spaces disjoint even if a value leaks into the wrong lookup.
pub(crate) const RESET_TOKEN_PREFIX: &str = "reset_";

/// Upstream bound enforced before the plaintext ever reaches the hasher.
const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 128;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^[a-z0-9_]{3,32}$").is_ok_and(|regex| regex.is_match(username))
}

/// Length bound only; composition rules are deliberately not enforced.
pub(crate) fn valid_password(password: &str) -> bool {
    let chars = password.chars().count();
    (PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&chars)
}

pub(crate) fn valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= 128
}

/// Create a new session id for the auth cookie.
///
/// The id is the bearer credential: possession is authentication, so it is
/// drawn from the OS random source and never derived from counters,
/// timestamps, or user ids.
pub(crate) fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session id")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Create a new password-reset token, in its own namespace.
pub(crate) fn generate_reset_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate reset token")?;
    Ok(format!(
        "{RESET_TOKEN_PREFIX}{}",
        Base64UrlUnpadded::encode_string(&bytes)
    ))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP for session audit fields from common proxy headers.
pub(crate) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn extract_user_agent(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use base64ct::{Base64UrlUnpadded, Encoding};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_username_bounds_charset_and_length() {
        assert!(valid_username("alice_01"));
        assert!(!valid_username("al"));
        assert!(!valid_username("Alice"));
        assert!(!valid_username("with space"));
        assert!(!valid_username(&"a".repeat(33)));
    }

    #[test]
    fn valid_password_is_length_only() {
        assert!(valid_password("P@ssw0rd"));
        assert!(valid_password(&"long passphrase with spaces".to_string()));
        assert!(!valid_password("short"));
        assert!(!valid_password(&"x".repeat(129)));
    }

    #[test]
    fn valid_name_rejects_blank() {
        assert!(valid_name("Ada Lovelace"));
        assert!(!valid_name("   "));
        assert!(!valid_name(""));
    }

    #[test]
    fn generate_session_id_is_32_random_bytes() {
        let decoded_len = generate_session_id()
            .ok()
            .and_then(|id| Base64UrlUnpadded::decode_vec(&id).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn session_ids_do_not_repeat() {
        let first = generate_session_id().expect("session id");
        let second = generate_session_id().expect("session id");
        assert_ne!(first, second);
    }

    #[test]
    fn reset_tokens_carry_their_namespace() {
        let token = generate_reset_token().expect("reset token");
        assert!(token.starts_with(RESET_TOKEN_PREFIX));
        let payload = &token[RESET_TOKEN_PREFIX.len()..];
        let decoded = Base64UrlUnpadded::decode_vec(payload).expect("payload");
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn reset_token_is_never_a_valid_session_id_shape() {
        let token = generate_reset_token().expect("reset token");
        assert!(Base64UrlUnpadded::decode_vec(&token).is_err());
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn extract_client_ip_none_when_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);
    }

    #[test]
    fn extract_user_agent_defaults_to_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_user_agent(&headers), "");
    }
}
