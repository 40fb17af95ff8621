//! Status-Endpunkte fuer Haraka
//!
//! - `GET /health` – Raum- und Teilnehmerzahlen, Uptime (fuer Load-Balancer
//!   und Monitoring)
//! - `GET /` – Dienst-Metadaten
//!
//! Die Zahlen liefert eine [`StatusQuelle`], damit dieses Crate den
//! Signaling-Zustand nicht kennen muss.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Momentaufnahme der Zaehler (nur informativ)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusWerte {
    pub raeume: usize,
    pub teilnehmer: usize,
    pub verbindungen: usize,
}

/// Liefert die aktuellen Zaehler fuer Status und Metriken
pub trait StatusQuelle: Send + Sync + 'static {
    fn status_werte(&self) -> StatusWerte;
}

/// Antwort des `/health`-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_rooms: usize,
    pub total_users: usize,
    pub connections: usize,
    pub uptime_seconds: u64,
}

/// Antwort des `/`-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub websocket_path: String,
    pub health_path: String,
}

/// Geteilter Zustand fuer die Status-Handler
#[derive(Clone)]
pub struct StatusState {
    pub quelle: Arc<dyn StatusQuelle>,
    pub start_time: Instant,
    pub dienst_name: String,
    pub websocket_pfad: String,
}

impl StatusState {
    pub fn neu(
        quelle: Arc<dyn StatusQuelle>,
        dienst_name: impl Into<String>,
        websocket_pfad: impl Into<String>,
    ) -> Self {
        Self {
            quelle,
            start_time: Instant::now(),
            dienst_name: dienst_name.into(),
            websocket_pfad: websocket_pfad.into(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Axum-Router fuer `/health` und `/`
pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – aktuelle Zaehler und Uptime
async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let werte = state.quelle.status_werte();

    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        active_rooms: werte.raeume,
        total_users: werte.teilnehmer,
        connections: werte.verbindungen,
        uptime_seconds: state.uptime_seconds(),
    };

    (StatusCode::OK, Json(response))
}

/// `GET /` – Dienst-Metadaten
async fn info_handler(State(state): State<StatusState>) -> impl IntoResponse {
    Json(ServiceInfo {
        name: state.dienst_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        websocket_path: state.websocket_pfad.clone(),
        health_path: "/health".to_string(),
    })
}
