//! Mirror gateway: participant registry, message relay and the WebSocket
//! signaling endpoint that ties them together.

#![forbid(unsafe_code)]

pub mod config;
pub mod health;
pub mod registry;
pub mod relay;
pub mod signal;

use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::GatewayConfig;
pub use registry::{Outbox, Participant, Registry, SharedRegistry};
pub use relay::{relay, relay_shared};
pub use signal::SocketLimits;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub limits: SocketLimits,
}

impl AppState {
    pub fn new(limits: SocketLimits) -> Self {
        Self {
            registry: Registry::new().into_shared(),
            limits,
        }
    }
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Mirror Gateway Online" }))
        .route("/health", get(health::health))
        .route("/api/status", get(health::status))
        .route("/ws", get(signal::ws_handler))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
