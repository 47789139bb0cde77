//! User identity module.
//!
//! Registration, login and profile management behind bearer session tokens.
//!
//! ## Components
//! - `password`: Argon2id credential codec
//! - `token`: HS256 session token codec
//! - `repository`: user store trait with PostgreSQL and in-memory backends
//! - `avatar`: avatar delegate (local directory or remote storage service)
//! - `service`: identity service owning the business rules
//! - `middleware`: bearer token gate for protected routes
//! - `handlers`: HTTP handlers
//! - `error`: per-layer error types and the HTTP error taxonomy

pub mod avatar;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

// Re-export for convenience
pub use avatar::{AvatarDelegate, AvatarFile, LocalAvatarStore, RemoteAvatarStore};
pub use error::{AvatarError, IdentityError, PasswordError, StoreError, TokenError};
pub use middleware::jwt_auth_middleware;
pub use models::{AuthenticatedIdentity, LoginRequest, ProfileForm, RegisterRequest, UserProfile};
pub use repository::{MemoryUserStore, PgUserStore, UserStore};
pub use service::IdentityService;
pub use token::{Claims, SigningSecret, TokenCodec};
