//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::api::{self, AppState};

/// Build the full axum router.
///
/// The router serves:
/// - Generation endpoints at `/deepseek/*`
/// - The bearer-protected `/user` route
pub fn build_router(app_state: AppState) -> Router {
    // Browser frontends are served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let relay_routes = Router::new()
        .route("/deepseek/chat", post(api::post_chat))
        .route("/deepseek/streamChat", post(api::post_stream_chat));

    let user_routes = Router::new()
        .route("/user", get(api::get_user))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            api::require_bearer,
        ));

    Router::new()
        .merge(relay_routes)
        .merge(user_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind `bind_addr`, serve `router` on a background task, and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Server stopped: {e}");
        }
    });

    Ok(addr)
}
