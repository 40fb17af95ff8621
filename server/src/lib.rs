//! haraka-server – Bibliotheks-Root
//!
//! Baut den Router aus WebSocket-, Status- und Metrik-Endpunkten zusammen
//! und stellt den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    middleware, Router,
};
use config::ServerConfig;
use haraka_observability::{
    metrics_router, request_timing_layer, status_router, timing_middleware, HarakaMetrics,
    StatusQuelle, StatusState,
};
use haraka_signaling::{ws_router, SignalingState, WEBSOCKET_PFAD};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    pub state: Arc<SignalingState>,
    pub metriken: HarakaMetrics,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let metriken = HarakaMetrics::neu()?;
        let state = SignalingState::neu(config.signaling_config(), metriken.clone());
        Ok(Self {
            config,
            state,
            metriken,
        })
    }

    /// Baut den vollstaendigen Router
    ///
    /// - `GET /ws`, `GET /socket` – WebSocket-Signaling
    /// - `GET /health`, `GET /` – Status
    /// - `GET /metrics` – Prometheus
    pub fn router(&self) -> Router {
        let quelle: Arc<dyn StatusQuelle> = Arc::new(self.state.status.clone());
        let status = StatusState::neu(
            Arc::clone(&quelle),
            self.config.server.name.clone(),
            WEBSOCKET_PFAD,
        );

        ws_router(Arc::clone(&self.state))
            .merge(status_router(status))
            .merge(metrics_router(self.metriken.clone(), quelle))
            .layer(middleware::from_fn_with_state(
                self.metriken.clone(),
                timing_middleware,
            ))
            .layer(request_timing_layer())
            .layer(self.cors_layer())
    }

    /// CORS konfigurieren: entweder spezifische Origins oder Any
    fn cors_layer(&self) -> CorsLayer {
        let erlaubt = &self.config.netzwerk.erlaubte_origins;
        if erlaubt.is_empty() || erlaubt.iter().any(|o| o == "*") {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = erlaubt.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }

    /// Bindet den Listener und laeuft bis Ctrl-C / SIGTERM
    pub async fn starten(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_adresse()).await?;
        self.auf_listener_starten(listener, shutdown_signal()).await
    }

    /// Laeuft auf einem bereits gebundenen Listener bis `shutdown` abschliesst
    ///
    /// Beim Shutdown werden zuerst alle WebSocket-Verbindungen geschlossen,
    /// danach laufende HTTP-Anfragen abgewartet.
    pub async fn auf_listener_starten(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let adresse = listener.local_addr()?;
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            websocket = WEBSOCKET_PFAD,
            origins = ?self.config.netzwerk.erlaubte_origins,
            "Server gestartet"
        );

        let app = self.router();
        let state = Arc::clone(&self.state);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            state.herunterfahren();
        })
        .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler konnte nicht installiert werden");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
