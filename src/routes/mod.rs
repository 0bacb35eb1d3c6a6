//! HTTP route handlers that sit outside the user/session surface.
//!
//! The user endpoints live in [`crate::auth::routes`]; everything here is
//! infrastructure such as health probes.

pub mod health;
