//! Database helpers for users, sessions, and password-reset tokens.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::role::Role;
use super::utils::{generate_reset_token, generate_session_id, is_unique_violation};

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Fields needed to verify a login attempt.
pub(super) struct UserRecord {
    pub(super) user_id: Uuid,
    pub(super) name: String,
    pub(super) username: String,
    pub(super) email: String,
    pub(super) role: Role,
    pub(super) password_hash: String,
}

/// Data returned for a valid session cookie: the session row joined with its
/// owner, everything a guard needs to authorize a request.
pub(crate) struct SessionRecord {
    pub(crate) session_id: String,
    pub(crate) user_id: Uuid,
    pub(crate) name: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) role: Role,
}

/// Audit fields captured from the request that created a credential.
#[derive(Clone, Debug, Default)]
pub(crate) struct ClientInfo {
    pub(crate) ip: String,
    pub(crate) user_agent: String,
}

fn parse_role(value: &str) -> Result<Role> {
    // Fail closed: an unknown role grants nothing.
    Role::parse(value).ok_or_else(|| anyhow!("unknown role in users.role: {value}"))
}

pub(super) async fn insert_user(
    pool: &PgPool,
    name: &str,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users (name, username, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Look up login data by normalized email.
pub(super) async fn lookup_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, name, username, email, role, password_hash
        FROM users
        WHERE email = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    row.map(|row| {
        Ok(UserRecord {
            user_id: row.get("id"),
            name: row.get("name"),
            username: row.get("username"),
            email: row.get("email"),
            role: parse_role(row.get("role"))?,
            password_hash: row.get("password_hash"),
        })
    })
    .transpose()
}

/// Current stored hash for a user (password change verifies it first).
pub(super) async fn lookup_password_hash(pool: &PgPool, user_id: Uuid) -> Result<Option<String>> {
    let query = "SELECT password_hash FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup password hash")?;
    Ok(row.map(|row| row.get("password_hash")))
}

pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    client: &ClientInfo,
    ttl_seconds: i64,
) -> Result<String> {
    // The raw id is the bearer credential; retry on the astronomically
    // unlikely id collision rather than surfacing a 500.
    let query = r"
        INSERT INTO sessions (id, user_id, ip, user_agent, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let session_id = generate_session_id()?;
        let result = sqlx::query(query)
            .bind(&session_id)
            .bind(user_id)
            .bind(&client.ip)
            .bind(&client.user_agent)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(session_id),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session id"))
}

/// Resolve a session id to its owner.
///
/// Validation is read-only: expiry is fixed at creation and a lookup never
/// extends it. Revoked and expired rows are filtered in the query itself so
/// there is no window where a dead session resolves.
pub(crate) async fn lookup_session(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT sessions.id AS session_id,
               users.id AS user_id,
               users.name,
               users.username,
               users.email,
               users.role
        FROM sessions
        JOIN users ON users.id = sessions.user_id
        WHERE sessions.id = $1
          AND sessions.revoked_at IS NULL
          AND sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(session_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    row.map(|row| {
        Ok(SessionRecord {
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            username: row.get("username"),
            email: row.get("email"),
            role: parse_role(row.get("role"))?,
        })
    })
    .transpose()
}

/// Revoke a single session. Idempotent: revoking a missing or already-revoked
/// session is a no-op, and the original revocation time is preserved.
pub(crate) async fn revoke_session(pool: &PgPool, session_id: &str) -> Result<()> {
    let query = r"
        UPDATE sessions
        SET revoked_at = NOW()
        WHERE id = $1
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke session")?;
    Ok(())
}

async fn revoke_all_sessions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE sessions
        SET revoked_at = NOW()
        WHERE user_id = $1
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to revoke user sessions")?;
    Ok(())
}

/// Replace a user's password hash and revoke every open session atomically.
/// A credential change must not leave sessions minted under the old password.
pub(super) async fn rotate_password(
    pool: &PgPool,
    user_id: Uuid,
    new_password_hash: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin password rotation")?;

    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;

    revoke_all_sessions(&mut tx, user_id).await?;

    tx.commit().await.context("commit password rotation")?;
    Ok(())
}

pub(super) async fn insert_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    client: &ClientInfo,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO password_reset_tokens (token, user_id, ip, user_agent, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_reset_token()?;
        let result = sqlx::query(query)
            .bind(&token)
            .bind(user_id)
            .bind(&client.ip)
            .bind(&client.user_agent)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert reset token"),
        }
    }

    Err(anyhow!("failed to generate unique reset token"))
}

/// Consume a reset token and rotate the password in one transaction.
///
/// The token is marked used with a single guarded `UPDATE ... RETURNING`, so
/// two concurrent resets with the same token can never both succeed: exactly
/// one sees the row with `used_at IS NULL`.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    token: &str,
    new_password_hash: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin password reset")?;

    let query = r"
        UPDATE password_reset_tokens
        SET used_at = NOW()
        WHERE token = $1
          AND used_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(false);
    };

    let user_id: Uuid = row.get("user_id");
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;

    revoke_all_sessions(&mut tx, user_id).await?;

    tx.commit().await.context("commit password reset")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{parse_role, ClientInfo, SessionRecord, SignupOutcome, UserRecord};
    use crate::api::handlers::auth::role::Role;
    use uuid::Uuid;

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(
            format!("{:?}", SignupOutcome::Created(Uuid::nil())),
            format!("Created({})", Uuid::nil())
        );
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn parse_role_fails_closed() {
        assert_eq!(parse_role("editor").ok(), Some(Role::Editor));
        assert!(parse_role("superuser").is_err());
        assert!(parse_role("").is_err());
    }

    #[test]
    fn client_info_defaults_to_empty_fields() {
        let client = ClientInfo::default();
        assert_eq!(client.ip, "");
        assert_eq!(client.user_agent, "");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            user_id: Uuid::nil(),
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
            password_hash: "scrypt$...".to_string(),
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert_eq!(record.role, Role::User);
    }

    #[test]
    fn session_record_holds_values() {
        let record = SessionRecord {
            session_id: "sid".to_string(),
            user_id: Uuid::nil(),
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Editor,
        };
        assert_eq!(record.session_id, "sid");
        assert!(record.role.permits(Role::User));
    }
}
