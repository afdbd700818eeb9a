//! Password recovery: forgot (issue token) and reset (redeem token).

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use super::state::AuthState;
use super::storage::{consume_reset_token, insert_reset_token, lookup_user_by_email, ClientInfo};
use super::types::{MessageResponse, PasswordForgotRequest, PasswordResetRequest};
use super::utils::{
    extract_client_ip, extract_user_agent, normalize_email, valid_email, valid_password,
};

/// The one response body for forgot, whether or not the account exists.
const FORGOT_MESSAGE: &str = "If the account exists, a reset link has been sent";

#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    request_body = PasswordForgotRequest,
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = MessageResponse),
        (status = 400, description = "Validation error", body = String)
    ),
    tag = "auth"
)]
pub async fn password_forgot(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordForgotRequest>>,
) -> impl IntoResponse {
    let request: PasswordForgotRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email_normalized = normalize_email(&request.email);
    if !valid_email(&email_normalized) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    // The response is fixed before any lookup: unknown accounts and database
    // hiccups both collapse into the same 200 to prevent enumeration.
    match lookup_user_by_email(&pool, &email_normalized).await {
        Ok(Some(user)) => {
            let client = ClientInfo {
                ip: extract_client_ip(&headers).unwrap_or_default(),
                user_agent: extract_user_agent(&headers),
            };
            match insert_reset_token(
                &pool,
                user.user_id,
                &client,
                auth_state.config().reset_token_ttl_seconds(),
            )
            .await
            {
                Ok(token) => {
                    // Mail delivery is out of scope; the link goes to the log
                    // where the delivery worker picks it up.
                    let reset_url = auth_state.config().reset_url(&token);
                    info!(email = %email_normalized, %reset_url, "Password reset link issued");
                }
                Err(err) => error!("Failed to insert reset token: {err}"),
            }
        }
        Ok(None) => {}
        Err(err) => error!("Forgot-password lookup failed: {err}"),
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: FORGOT_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid token", body = String)
    ),
    tag = "auth"
)]
pub async fn password_reset(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordResetRequest>>,
) -> impl IntoResponse {
    let request: PasswordResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim().to_string();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid token".to_string()).into_response();
    }

    if !valid_password(&request.new_password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be between 8 and 128 characters".to_string(),
        )
            .into_response();
    }

    // Hash before opening the transaction so the key stretching never holds
    // a database connection.
    let hasher = auth_state.hasher().clone();
    let new_password = request.new_password;
    let new_hash = match tokio::task::spawn_blocking(move || hasher.hash(&new_password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!("Password hashing task failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response();
        }
    };

    // Absent, expired, and already-used tokens are indistinguishable.
    match consume_reset_token(&pool, &token, &new_hash).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Password reset".to_string(),
            }),
        )
            .into_response(),
        Ok(false) => (StatusCode::BAD_REQUEST, "Invalid token".to_string()).into_response(),
        Err(err) => {
            error!("Failed to reset password: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response()
        }
    }
}
