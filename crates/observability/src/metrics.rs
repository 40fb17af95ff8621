//! Prometheus-kompatible Metriken fuer Haraka
//!
//! Registrierte Metriken:
//! - `haraka_connections` – Gauge: Offene WebSocket-Verbindungen
//! - `haraka_rooms_active` – Gauge: Existierende Raeume
//! - `haraka_participants` – Gauge: Teilnehmer ueber alle Raeume
//! - `haraka_signals_total` – Counter: Signaling-Nachrichten (kind, outcome)
//! - `haraka_messages_dropped_total` – Counter: Verworfene Nachrichten (reason)
//! - `haraka_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `haraka_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//!
//! Die drei Gauges werden beim Scrape aus der [`StatusQuelle`] gesetzt.

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::health::StatusQuelle;

/// Alle Haraka-Prometheus-Metriken
#[derive(Clone)]
pub struct HarakaMetrics {
    pub registry: Arc<Registry>,

    // Zustands-Metriken
    pub connections: IntGauge,
    pub rooms_active: IntGauge,
    pub participants: IntGauge,

    // Signaling-Metriken
    pub signals_total: IntCounterVec,
    pub messages_dropped_total: IntCounterVec,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl HarakaMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Zustands-Metriken ---
        let connections = IntGauge::with_opts(Opts::new(
            "haraka_connections",
            "Anzahl offener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(connections.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "haraka_rooms_active",
            "Anzahl existierender Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let participants = IntGauge::with_opts(Opts::new(
            "haraka_participants",
            "Anzahl Teilnehmer ueber alle Raeume",
        ))?;
        registry.register(Box::new(participants.clone()))?;

        // --- Signaling-Metriken ---
        let signals_total = IntCounterVec::new(
            Opts::new(
                "haraka_signals_total",
                "Weitergeleitete Signaling-Nachrichten",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(signals_total.clone()))?;

        let messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "haraka_messages_dropped_total",
                "Verworfene Nachrichten nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(messages_dropped_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("haraka_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "haraka_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            rooms_active,
            participants,
            signals_total,
            messages_dropped_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt eine Signaling-Nachricht (kind: offer/answer/..., outcome: delivered/...)
    pub fn signal_zaehlen(&self, art: &str, ergebnis: &str) {
        self.signals_total.with_label_values(&[art, ergebnis]).inc();
    }

    /// Zaehlt eine verworfene Nachricht
    pub fn verworfen_zaehlen(&self, grund: &str) {
        self.messages_dropped_total.with_label_values(&[grund]).inc();
    }

    /// Uebernimmt die aktuellen Zaehler in die Gauges
    pub fn zustand_uebernehmen(&self, quelle: &dyn StatusQuelle) {
        let werte = quelle.status_werte();
        self.connections.set(werte.verbindungen as i64);
        self.rooms_active.set(werte.raeume as i64);
        self.participants.set(werte.teilnehmer as i64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[derive(Clone)]
struct MetricsState {
    metriken: HarakaMetrics,
    quelle: Arc<dyn StatusQuelle>,
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: HarakaMetrics, quelle: Arc<dyn StatusQuelle>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { metriken, quelle })
}

async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    state.metriken.zustand_uebernehmen(state.quelle.as_ref());

    match state.metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
