//! # Aula (Course Platform Backend)
//!
//! `aula` is a small course platform backend. It owns account credentials,
//! cookie sessions, and the course catalog those sessions unlock.
//!
//! ## Authentication
//!
//! Passwords are normalized, peppered with a keyed HMAC, and stretched with
//! scrypt; the database only ever sees the encoded hash. Sessions are opaque
//! random ids carried by an `HttpOnly` cookie and resolved server-side on
//! every request.
//!
//! ## Authorization
//!
//! Roles form a total order (`user < editor < admin`). Route guards enforce a
//! minimum role and hand handlers an authenticated principal; paid lesson
//! content additionally requires any valid session.

pub mod api;
pub mod cli;
