//! Health, liveness and readiness endpoints

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::api::types::Json;

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus, message: Option<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            latency_ms: Some(start.elapsed().as_millis() as u64),
        }
    }
}

/// Returns 200 while the process is up
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness: the exchange store must answer; missing provider keys only
/// degrade, since cached answers can still be served
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let checks = vec![check_exchange_store(&state).await, check_providers(&state)];

    let overall_status = checks
        .iter()
        .map(|check| check.status)
        .fold(HealthStatus::Healthy, worst);

    let response = HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

fn worst(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    match (a, b) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

async fn check_exchange_store(state: &AppState) -> HealthCheck {
    let start = Instant::now();

    match state.exchange_cache.count().await {
        Ok(_) => HealthCheck::new("exchange_store", HealthStatus::Healthy, None, start),
        Err(e) => HealthCheck::new(
            "exchange_store",
            HealthStatus::Unhealthy,
            Some(e.to_string()),
            start,
        ),
    }
}

fn check_providers(state: &AppState) -> HealthCheck {
    let start = Instant::now();
    let configured = state.providers.configured();

    if configured.is_empty() {
        return HealthCheck::new(
            "llm_providers",
            HealthStatus::Degraded,
            Some("no provider API key configured".to_string()),
            start,
        );
    }

    let names: Vec<&str> = configured.iter().map(|kind| kind.as_str()).collect();
    HealthCheck::new(
        "llm_providers",
        HealthStatus::Healthy,
        Some(names.join(",")),
        start,
    )
}
