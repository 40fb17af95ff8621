//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Komponenten, die sicher zwischen tokio-Tasks geteilt
//! werden koennen. Jede Komponente teilt ihren inneren Zustand per Clone.

use haraka_observability::HarakaMetrics;
use std::sync::Arc;
use tokio::sync::watch;

use crate::broadcast::EventBroadcaster;
use crate::presence::PresenceNotifier;
use crate::registry::ConnectionRegistry;
use crate::relay::SignalRelay;
use crate::rooms::RoomStore;
use crate::status::StatusReporter;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Erlaubte Origins fuer den WebSocket-Upgrade (leer = alle)
    pub erlaubte_origins: Vec<String>,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            send_queue_groesse: 64,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
            erlaubte_origins: vec!["http://localhost:36236".to_string()],
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Signaling-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Verbindung -> Raum/Teilnehmer
    pub registry: ConnectionRegistry,
    /// Raeume und ihre Teilnehmer
    pub rooms: RoomStore,
    /// Send-Queues aller Verbindungen
    pub broadcaster: EventBroadcaster,
    pub relay: SignalRelay,
    pub presence: PresenceNotifier,
    pub status: StatusReporter,
    pub metriken: HarakaMetrics,
    shutdown_tx: watch::Sender<bool>,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: HarakaMetrics) -> Arc<Self> {
        let registry = ConnectionRegistry::neu();
        let rooms = RoomStore::neu();
        let broadcaster = EventBroadcaster::neu(config.send_queue_groesse, metriken.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            config: Arc::new(config),
            relay: SignalRelay::neu(rooms.clone(), broadcaster.clone(), metriken.clone()),
            presence: PresenceNotifier::neu(broadcaster.clone()),
            status: StatusReporter::neu(rooms.clone(), registry.clone()),
            registry,
            rooms,
            broadcaster,
            metriken,
            shutdown_tx,
        })
    }

    /// Empfaenger fuer das Shutdown-Signal (eine pro Verbindung)
    pub fn shutdown_abonnieren(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Fordert alle Verbindungs-Tasks zum Beenden auf
    pub fn herunterfahren(&self) {
        tracing::info!(
            verbindungen = self.registry.anzahl(),
            "Signaling wird heruntergefahren"
        );
        self.shutdown_tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_konfiguration() {
        let config = SignalingConfig::default();
        assert_eq!(config.send_queue_groesse, 64);
        assert_eq!(config.keepalive_sek, 25);
        assert_eq!(config.verbindungs_timeout_sek, 60);
        assert_eq!(config.erlaubte_origins, vec!["http://localhost:36236"]);
    }

    #[tokio::test]
    async fn herunterfahren_erreicht_abonnenten() {
        let state = SignalingState::neu(SignalingConfig::default(), HarakaMetrics::neu().unwrap());
        let mut rx = state.shutdown_abonnieren();
        assert!(!*rx.borrow());

        state.herunterfahren();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
