pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

// OpenAPI / Swagger UI
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ServerConfig;
use crate::user_auth::{handlers as sso, jwt_auth_middleware};
use state::AppState;

/// Build the complete router: `/api/sso/*` plus Swagger UI.
pub fn create_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Public Routes (no auth required)
    // ==========================================================================
    let public_routes = Router::new()
        .route("/register", post(sso::register))
        .route("/login", post(sso::login))
        .route("/images/{filename}", get(sso::serve_avatar))
        .route("/health", get(handlers::health_check));

    // ==========================================================================
    // User Routes - Protected by bearer token
    // ==========================================================================
    let user_routes = Router::new()
        .route("/user_profile", get(sso::user_profile))
        .route(
            "/update_user_profile",
            put(sso::update_user_profile).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        // Runs after method matching, so a wrong method is 405 before any token check
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .nest("/api/sso", public_routes.merge(user_routes))
        .with_state(state)
        // Stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve until SIGINT/SIGTERM, then drain in-flight requests for at most
/// `shutdown_timeout_secs`.
pub async fn run_server(config: &ServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    // Bind address
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}: {} (port {} may already be in use)",
            addr,
            e,
            config.port
        )
    })?;

    println!("🚀 SSO service listening on http://{}", addr);
    println!("📖 API Docs: http://{}/docs", addr);
    println!("🔓 Public API:  /api/sso/register, /api/sso/login, /api/sso/images/*");
    println!("🔒 User API:    /api/sso/user_profile, /api/sso/update_user_profile");
    tracing::info!(%addr, "server started");

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    println!("🛑 Shutdown signal received, draining connections");
    tracing::info!("shutdown signal received");
    let _ = stop_tx.send(true);

    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(drain, &mut server).await {
        Ok(result) => {
            result?;
            tracing::info!("server stopped");
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = config.shutdown_timeout_secs,
                "drain timed out, dropping remaining connections"
            );
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
