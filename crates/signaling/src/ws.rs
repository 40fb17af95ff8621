//! WebSocket-Endpunkt – Upgrade, Origin-Pruefung, Task pro Verbindung
//!
//! `GET /ws` (und `/socket` fuer aeltere Clients) wird auf WebSocket
//! hochgestuft. Die Origin wird vor dem Upgrade geprueft; eine abgelehnte
//! Verbindung beruehrt keinen Zustand.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use haraka_core::HarakaError;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

/// Pfad des WebSocket-Endpunkts
pub const WEBSOCKET_PFAD: &str = "/ws";
/// Alternativer Pfad fuer aeltere Clients
pub const WEBSOCKET_PFAD_ALT: &str = "/socket";

/// Axum-Router fuer die WebSocket-Endpunkte
pub fn ws_router(state: Arc<SignalingState>) -> Router {
    Router::new()
        .route(WEBSOCKET_PFAD, get(ws_handler))
        .route(WEBSOCKET_PFAD_ALT, get(ws_handler))
        .with_state(state)
}

/// Prueft die Origin gegen die Allow-List
///
/// Eine leere Liste oder `*` erlaubt alles. Clients ohne Origin-Header
/// (native Apps) werden immer zugelassen.
pub fn origin_pruefen(erlaubt: &[String], origin: Option<&str>) -> haraka_core::Result<()> {
    let Some(origin) = origin else {
        return Ok(());
    };
    if erlaubt.is_empty() || erlaubt.iter().any(|o| o == "*") {
        return Ok(());
    }
    let origin_norm = origin.trim_end_matches('/');
    if erlaubt
        .iter()
        .any(|o| o.trim_end_matches('/').eq_ignore_ascii_case(origin_norm))
    {
        Ok(())
    } else {
        Err(HarakaError::OriginAbgelehnt(origin.to_string()))
    }
}

async fn ws_handler(
    State(state): State<Arc<SignalingState>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let peer_addr = connect_info.map(|ConnectInfo(addr)| addr);
    // Nicht-UTF8-Origin zaehlt als gesetzt, aber unbekannt
    let origin = headers
        .get(ORIGIN)
        .map(|wert| wert.to_str().unwrap_or_default());

    if let Err(e) = origin_pruefen(&state.config.erlaubte_origins, origin) {
        tracing::warn!(peer = ?peer_addr, fehler = %e, "WebSocket-Upgrade abgelehnt");
        state.metriken.verworfen_zaehlen("origin_rejected");
        return (StatusCode::FORBIDDEN, e.to_string()).into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| ClientConnection::neu(state, peer_addr).verarbeiten(socket))
}
