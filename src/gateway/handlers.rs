//! Gateway HTTP handlers
//!
//! Identity endpoints live in [`crate::user_auth::handlers`]; this module
//! holds the system endpoints.

pub mod health;

pub use health::{HealthResponse, health_check};
