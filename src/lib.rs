//! SSO Service - Single Sign-On Identity Provider
//!
//! Users register, log in by email or login, and receive a signed bearer
//! session token. Protected endpoints read and rewrite the caller's profile,
//! including an optional avatar image.
//!
//! # Modules
//!
//! - [`user_auth`] - Credential/token codecs, user store, avatar delegate, identity service
//! - [`gateway`] - HTTP router, shared state, response envelope, OpenAPI
//! - [`db`] - PostgreSQL pool, startup retry and schema
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod user_auth;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use gateway::{create_router, run_server};
pub use user_auth::{IdentityError, IdentityService};
