//! Auth handlers and supporting modules.
//!
//! This module coordinates password hashing, session management, and route
//! guards.
//!
//! ## Password Hashing
//!
//! Passwords are normalized (NFC), prehashed with a keyed HMAC (the pepper),
//! then stretched with scrypt. The encoded hash records every parameter, so
//! cost changes roll out gradually: old hashes keep verifying under their
//! recorded parameters.
//!
//! ## Sessions
//!
//! Sessions are opaque random ids stored server-side and carried by an
//! `HttpOnly` cookie. Expiry is fixed at creation; revocation is a tombstone,
//! never a row delete.
//!
//! > **Warning:** Rotating the pepper invalidates every stored password hash.

pub(crate) mod guard;
pub(crate) mod hasher;
pub(crate) mod login;
pub(crate) mod password_change;
pub(crate) mod recovery;
pub(crate) mod register;
pub(crate) mod role;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
pub(crate) mod utils;

pub use guard::{OptionalPrincipal, Principal};
pub use hasher::PasswordHasher;
pub use role::Role;
pub use state::{AuthConfig, AuthState};
