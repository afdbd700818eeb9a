//! Route guards built on the session cookie.
//!
//! Guards run as middleware: they resolve the cookie once, enforce a minimum
//! role, and stash the authenticated [`Principal`] in request extensions so
//! handlers never re-resolve the session.

use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use uuid::Uuid;

use super::role::Role;
use super::session::authenticate_session;
use super::storage::SessionRecord;

/// Authenticated user context derived from the session cookie.
#[derive(Clone, Debug)]
pub struct Principal {
    pub session_id: String,
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<SessionRecord> for Principal {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.session_id,
            user_id: record.user_id,
            name: record.name,
            username: record.username,
            email: record.email,
            role: record.role,
        }
    }
}

/// Principal for routes that serve both anonymous and signed-in callers.
#[derive(Clone, Debug)]
pub struct OptionalPrincipal(pub Option<Principal>);

/// Require a valid session (any role).
pub async fn require_user(
    Extension(pool): Extension<PgPool>,
    request: Request,
    next: Next,
) -> Response {
    require_role(&pool, Role::User, request, next).await
}

/// Require a valid session with at least the editor role.
pub async fn require_editor(
    Extension(pool): Extension<PgPool>,
    request: Request,
    next: Next,
) -> Response {
    require_role(&pool, Role::Editor, request, next).await
}

/// Require a valid session with the admin role.
pub async fn require_admin(
    Extension(pool): Extension<PgPool>,
    request: Request,
    next: Next,
) -> Response {
    require_role(&pool, Role::Admin, request, next).await
}

/// Resolve the session if present, but never reject the request.
pub async fn optional(
    Extension(pool): Extension<PgPool>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match authenticate_session(request.headers(), &pool).await {
        Ok(record) => record.map(Principal::from),
        Err(status) => return status.into_response(),
    };
    request.extensions_mut().insert(OptionalPrincipal(principal));
    next.run(request).await
}

async fn require_role(pool: &PgPool, minimum: Role, mut request: Request, next: Next) -> Response {
    let record = match authenticate_session(request.headers(), pool).await {
        Ok(record) => record,
        Err(status) => return status.into_response(),
    };

    // Missing and invalid sessions get the same 401; no auth-state oracle.
    let Some(record) = record else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    // Authenticated but under-privileged is a distinct outcome.
    if !record.role.permits(minimum) {
        return StatusCode::FORBIDDEN.into_response();
    }

    request.extensions_mut().insert(Principal::from(record));
    next.run(request).await
}
