//! API handlers.
//!
//! Auth endpoints own credentials and sessions; lms endpoints are the thin
//! course catalog behind the guards.

pub mod auth;
pub mod health;
pub mod lms;
pub mod root;
