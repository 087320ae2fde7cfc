//! Liveness and status endpoints. Not part of the signaling contract.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub clients: usize,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub message: &'static str,
    pub version: &'static str,
    pub clients: usize,
}

impl HealthReport {
    pub fn new(clients: usize) -> Self {
        Self {
            status: "OK",
            timestamp: Utc::now(),
            clients,
        }
    }
}

impl StatusReport {
    pub fn new(clients: usize) -> Self {
        Self {
            message: "Mirror gateway is running",
            version: env!("CARGO_PKG_VERSION"),
            clients,
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let clients = state.registry.read().await.count();
    (StatusCode::OK, Json(HealthReport::new(clients)))
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let clients = state.registry.read().await.count();
    Json(StatusReport::new(clients))
}
