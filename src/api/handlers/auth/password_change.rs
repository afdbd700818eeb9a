//! Password update for signed-in users.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::guard::Principal;
use super::session::session_cookie;
use super::state::AuthState;
use super::storage::{insert_session, lookup_password_hash, rotate_password, ClientInfo};
use super::types::{MessageResponse, PasswordUpdateRequest};
use super::utils::{extract_client_ip, extract_user_agent, valid_password};

#[utoipa::path(
    put,
    path = "/auth/password/update",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Current password is wrong", body = String)
    ),
    tag = "auth"
)]
pub async fn password_update(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    principal: Extension<Principal>,
    payload: Option<Json<PasswordUpdateRequest>>,
) -> impl IntoResponse {
    let request: PasswordUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_password(&request.new_password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be between 8 and 128 characters".to_string(),
        )
            .into_response();
    }

    let stored_hash = match lookup_password_hash(&pool, principal.user_id).await {
        Ok(Some(hash)) => hash,
        Ok(None) => {
            // Session valid but user row gone; treat as a dead session.
            return (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup password hash: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password update failed".to_string(),
            )
                .into_response();
        }
    };

    // Re-verify the current password; a hijacked cookie alone must not be
    // enough to rotate the credential.
    let hasher = auth_state.hasher().clone();
    let current = request.current_password;
    let verify_hash = stored_hash.clone();
    let verified =
        match tokio::task::spawn_blocking(move || hasher.verify(&current, &verify_hash)).await {
            Ok(verified) => verified,
            Err(err) => {
                error!("Password verification task failed: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Password update failed".to_string(),
                )
                    .into_response();
            }
        };

    if !verified {
        return (
            StatusCode::UNAUTHORIZED,
            "Current password is wrong".to_string(),
        )
            .into_response();
    }

    let hasher = auth_state.hasher().clone();
    let new_password = request.new_password;
    let new_hash = match tokio::task::spawn_blocking(move || hasher.hash(&new_password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password update failed".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!("Password hashing task failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password update failed".to_string(),
            )
                .into_response();
        }
    };

    // New hash plus revocation of every open session, atomically.
    if let Err(err) = rotate_password(&pool, principal.user_id, &new_hash).await {
        error!("Failed to rotate password: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password update failed".to_string(),
        )
            .into_response();
    }

    // The caller keeps working: mint exactly one fresh session for them.
    let client = ClientInfo {
        ip: extract_client_ip(&headers).unwrap_or_default(),
        user_agent: extract_user_agent(&headers),
    };
    let session_id = match insert_session(
        &pool,
        principal.user_id,
        &client,
        auth_state.config().session_ttl_seconds(),
    )
    .await
    {
        Ok(session_id) => session_id,
        Err(err) => {
            error!("Failed to create session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password update failed".to_string(),
            )
                .into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(&auth_state, &session_id) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            // Every old session was just revoked; a 200 without the fresh
            // cookie would leave the caller locked out.
            error!("Failed to build session cookie: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password update failed".to_string(),
            )
                .into_response();
        }
    }
    (
        StatusCode::OK,
        response_headers,
        Json(MessageResponse {
            message: "Password updated".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::guard::Principal;
    use super::super::hasher::PasswordHasher;
    use super::super::role::Role;
    use super::super::state::{AuthConfig, AuthState};
    use super::super::types::PasswordUpdateRequest;
    use super::password_update;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::Json;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use uuid::Uuid;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new("https://aula.dev".to_string());
        let hasher = PasswordHasher::new(SecretString::from("pepper".to_string()));
        Arc::new(AuthState::new(config, hasher))
    }

    fn principal() -> Principal {
        Principal {
            session_id: "sid".to_string(),
            user_id: Uuid::nil(),
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn password_update_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = password_update(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Extension(principal()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn password_update_rejects_short_new_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = PasswordUpdateRequest {
            current_password: "old passphrase".to_string(),
            new_password: "short".to_string(),
        };
        let response = password_update(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Extension(principal()),
            Some(Json(request)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
