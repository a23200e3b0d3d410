//! HTTP JSON API for the `diligent` research pipeline.
//!
//! `diligent-web` wraps a [`ResearchService`] in an axum router so research
//! chains, enhancement passes and artifact snapshots can be driven over HTTP.
//!
//! # Quick start
//!
//! ```ignore
//! use diligent::prelude::*;
//! use diligent_web::{WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let client = OpenRouterClient::from_env()?;
//! let service = Arc::new(ResearchService::new(client, PipelineConfig::from_env()));
//! let addr = spawn_web(service, WebConfig::default()).await?;
//! println!("API: http://{addr}/api/research");
//! ```
//!
//! # Endpoints
//!
//! | Method | Path | Success | Errors |
//! |--------|------|---------|--------|
//! | POST | `/api/research` | 200 chain run | 400 invalid input |
//! | GET | `/api/research` | 200 listing | |
//! | GET | `/api/research/{id}` | 200 artifact | 404 |
//! | DELETE | `/api/research/{id}` | 204 | 404 |
//! | GET | `/api/research/{id}/summary` | 200 summary | 404 |
//! | GET | `/api/research/{id}/export` | 200 JSON text | 404 |
//! | POST | `/api/research/{id}/modules` | 200 module output | 400, 404, 502 |
//! | POST | `/api/research/import` | 201 artifact | 422 malformed payload |
//! | POST | `/api/enhance` | 200 enhancement run | 400, 404 |

pub mod api;
mod server;

pub use api::{ApiError, AppState};
pub use server::build_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use diligent::service::ResearchService;

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory of static front-end files served for non-API paths.
    ///
    /// If `None`, only the API is served.
    pub static_dir: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(
    service: Arc<ResearchService>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    let router = server::build_router(service, config.static_dir);
    server::start_server(router, config.bind_addr).await
}
