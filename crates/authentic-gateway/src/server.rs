use std::net::SocketAddr;

use authentic_client::{AuthState, BearerAuth, Claims, OptionalBearerAuth, cors_layer};
use axum::{Json, Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;

/// Echoes the caller's claims, or `null` for anonymous requests.
async fn whoami(OptionalBearerAuth(claims): OptionalBearerAuth) -> Json<Option<Claims>> {
    Json(claims)
}

/// Requires a credential and echoes its claims.
async fn me(BearerAuth(claims): BearerAuth) -> Json<Claims> {
    Json(claims)
}

pub fn build_router(auth: AuthState) -> Router {
    Router::new()
        .route("/", get(whoami))
        .route("/me", get(me))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(auth)
}

pub async fn run(cfg: GatewayConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg.listen_addr().map_err(anyhow::Error::msg)?;
    let auth = AuthState::from_config(&cfg.auth)?;

    tracing::info!(
        server = %cfg.auth.server,
        prefix = %cfg.auth.prefix,
        check_expired_list = cfg.auth.check_expired_list,
        "Token verifier ready"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, build_router(auth))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
