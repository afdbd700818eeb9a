//! Auth configuration and shared state.

use super::hasher::PasswordHasher;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 30 * 60;

/// Auth settings resolved once at startup.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    session_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    /// Only mark cookies secure when the service is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Password-reset link embedded in outbound mail.
    pub(crate) fn reset_url(&self, token: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/password/?token={token}")
    }
}

/// Shared auth state: configuration plus the peppered password hasher.
///
/// The hasher holds the process-wide pepper, injected at construction and
/// read-only afterwards.
pub struct AuthState {
    config: AuthConfig,
    hasher: PasswordHasher,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, hasher: PasswordHasher) -> Self {
        Self { config, hasher }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }
}
