//! SSO Service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Postgres │───▶│ Identity │───▶│  Axum    │
//! │  (YAML)  │    │ (retry)  │    │ Service  │    │ Gateway  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Usage:
//!   sso_service [--env dev] [--config path/to/config.yaml] [--port 8080]

use std::sync::Arc;

use sso_service::config::AppConfig;
use sso_service::db::Database;
use sso_service::gateway::{self, state::AppState};
use sso_service::user_auth::{
    IdentityService, PgUserStore, SigningSecret, TokenCodec, avatar, token::JWT_SECRET_ENV,
};

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    get_arg(&["--port"]).and_then(|p| p.parse().ok())
}

fn fatal(msg: impl std::fmt::Display) -> ! {
    eprintln!("❌ FATAL: {}", msg);
    tracing::error!("{}", msg);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let env = get_env();
    let mut app_config = match get_arg(&["--config"]) {
        Some(path) => AppConfig::load_from(&path),
        None => AppConfig::load(&env),
    }
    .unwrap_or_else(|e| fatal(format!("{:#}", e)));

    if let Some(port) = get_port_override() {
        app_config.server.port = port;
    }

    let _log_guard = sso_service::logging::init_logging(&app_config);
    tracing::info!("Starting SSO service in {} mode", env);
    println!("=== SSO Service ({}) ===", env);

    // Signing secret: read once, never logged
    let secret = SigningSecret::from_env(JWT_SECRET_ENV)
        .unwrap_or_else(|_| fatal(format!("{} must be set to a non-empty value", JWT_SECRET_ENV)));
    let tokens = Arc::new(TokenCodec::new(secret, app_config.auth.issuer.clone()));

    // User store
    println!("[Database] Connecting to PostgreSQL...");
    let db = Database::connect_with_retry(&app_config.database)
        .await
        .unwrap_or_else(|e| fatal(format!("Failed to connect to PostgreSQL: {}", e)));
    db.init_schema()
        .await
        .unwrap_or_else(|e| fatal(format!("Failed to initialize schema: {}", e)));
    println!("✅ PostgreSQL connected and schema initialized");
    let store = Arc::new(PgUserStore::new(db.pool().clone()));

    // Avatar delegate
    let avatars = avatar::from_config(&app_config.avatar)
        .await
        .unwrap_or_else(|e| fatal(format!("Failed to initialize avatar storage: {}", e)));
    println!("🖼  Avatar storage: {}", avatars.name());

    let identity = Arc::new(IdentityService::new(
        store,
        avatars,
        tokens,
        app_config.token_ttl(),
    ));
    let state = Arc::new(AppState::new(
        identity,
        app_config.server.max_upload_bytes,
    ));

    if let Err(e) = gateway::run_server(&app_config.server, state).await {
        fatal(format!("Server error: {:#}", e));
    }

    db.pool().close().await;
    println!("👋 SSO service stopped");
    tracing::info!("SSO service stopped");
}
