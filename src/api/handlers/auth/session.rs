//! Session cookie plumbing and the session endpoints.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, CACHE_CONTROL, SET_COOKIE, VARY},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{
    guard::Principal,
    state::{AuthConfig, AuthState},
    storage::{lookup_session, revoke_session, SessionRecord},
    types::SessionResponse,
};

pub(crate) const SESSION_COOKIE_NAME: &str = "aula_sid";

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 401, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(principal: Extension<Principal>) -> impl IntoResponse {
    // The guard already resolved the cookie; this just reflects the principal.
    let response = SessionResponse {
        user_id: principal.user_id.to_string(),
        name: principal.name.clone(),
        username: principal.username.clone(),
        email: principal.email.clone(),
        role: principal.role,
    };
    (StatusCode::OK, session_cache_headers(), Json(response)).into_response()
}

#[utoipa::path(
    delete,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session cleared"),
        (status = 500, description = "Revocation failed; the session may still be live", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(session_id) = extract_session_id(&headers) {
        // Revocation is idempotent; a stale or unknown cookie is fine. A
        // store failure is not: the session would stay live server-side, so
        // the client must not be told it is gone.
        if let Err(err) = revoke_session(&pool, &session_id).await {
            error!("Failed to revoke session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Logout failed".to_string(),
            )
                .into_response();
        }
    }

    // Clear the cookie, even if the session record was missing.
    let mut response_headers = session_cache_headers();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Resolve a session cookie into a session record, if present.
///
/// Returns `Ok(None)` when the cookie is missing, expired, or revoked.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<SessionRecord>, StatusCode> {
    let Some(session_id) = extract_session_id(headers) else {
        return Ok(None);
    };
    match lookup_session(pool, &session_id).await {
        Ok(record) => Ok(record),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Responses derived from the session cookie must never be cached or served
/// across users by a shared cache.
fn session_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
    headers.insert(VARY, HeaderValue::from_static("Cookie"));
    headers
}

/// Build the `HttpOnly` cookie carrying the session id.
pub(super) fn session_cookie(
    auth_state: &AuthState,
    session_id: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    let secure = auth_state.config().session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(
    auth_config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = auth_config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
            return Some(val.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::hasher::PasswordHasher;
    use axum::http::header::COOKIE;
    use secrecy::SecretString;

    fn state(base_url: &str) -> AuthState {
        let config = AuthConfig::new(base_url.to_string()).with_session_ttl_seconds(3600);
        AuthState::new(
            config,
            PasswordHasher::new(SecretString::from("pepper".to_string())),
        )
    }

    #[test]
    fn session_cookie_is_http_only_lax() {
        let cookie = session_cookie(&state("http://localhost:8080"), "abc123").expect("cookie");
        let value = cookie.to_str().expect("str");
        assert_eq!(
            value,
            "aula_sid=abc123; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
    }

    #[test]
    fn session_cookie_secure_over_https() {
        let cookie = session_cookie(&state("https://aula.dev"), "abc123").expect("cookie");
        assert!(cookie.to_str().expect("str").ends_with("; Secure"));
    }

    #[test]
    fn session_cookie_build_fails_on_control_characters() {
        // Handlers map this Err to a 500 instead of answering 200 with no
        // Set-Cookie.
        assert!(session_cookie(&state("https://aula.dev"), "bad\nid").is_err());
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let state = state("https://aula.dev");
        let cookie = clear_session_cookie(state.config()).expect("cookie");
        let value = cookie.to_str().expect("str");
        assert!(value.starts_with("aula_sid=;"));
        assert!(value.contains("Max-Age=0"));
        assert!(value.ends_with("; Secure"));
    }

    #[test]
    fn extract_session_id_finds_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; aula_sid=sid123; lang=en"),
        );
        assert_eq!(extract_session_id(&headers), Some("sid123".to_string()));
    }

    #[test]
    fn extract_session_id_ignores_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        assert_eq!(extract_session_id(&headers), None);
    }

    #[test]
    fn extract_session_id_rejects_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("aula_sid="));
        assert_eq!(extract_session_id(&headers), None);
    }

    #[tokio::test]
    async fn logout_without_cookie_is_no_content() -> anyhow::Result<()> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(
            HeaderMap::new(),
            Extension(pool),
            Extension(Arc::new(state("https://aula.dev"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().contains_key(SET_COOKIE));
        Ok(())
    }

    #[tokio::test]
    async fn logout_surfaces_revocation_store_failure() -> anyhow::Result<()> {
        // connect_lazy with nothing listening: the revocation write fails, and
        // the handler must not pretend the session is gone.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost:1/postgres")?;
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("aula_sid=sid123"));
        let response = logout(
            headers,
            Extension(pool),
            Extension(Arc::new(state("https://aula.dev"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key(SET_COOKIE));
        Ok(())
    }

    #[test]
    fn cache_headers_forbid_shared_caching() {
        let headers = session_cache_headers();
        assert_eq!(
            headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()),
            Some("private, no-store")
        );
        assert_eq!(
            headers.get(VARY).and_then(|v| v.to_str().ok()),
            Some("Cookie")
        );
    }
}
