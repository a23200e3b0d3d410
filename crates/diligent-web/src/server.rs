//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use diligent::service::ResearchService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::api::{self, AppState};

/// Build the full axum router.
///
/// The router serves:
/// - REST API at `/api/*`
/// - Optional static files for a browser front end
pub fn build_router(service: Arc<ResearchService>, static_dir: Option<PathBuf>) -> Router {
    let app_state = AppState { service };

    // CORS layer for front ends served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/api/research",
            get(api::list_research).post(api::post_research),
        )
        .route("/api/research/import", post(api::import_research))
        .route(
            "/api/research/{id}",
            get(api::get_research).delete(api::delete_research),
        )
        .route("/api/research/{id}/summary", get(api::get_summary))
        .route("/api/research/{id}/export", get(api::export_research))
        .route("/api/research/{id}/modules", post(api::run_module))
        .route("/api/enhance", post(api::post_enhance))
        .with_state(app_state);

    let mut router = Router::new().merge(api_routes).layer(cors);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
}

/// Bind `bind_addr`, serve `router` on a background task and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("Web server stopped: {e}");
        }
    });

    Ok(addr)
}
