//! Event-Broadcaster – Sendet Nachrichten an verbundene Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller offenen Verbindungen.
//! Jede Verbindung hat genau eine begrenzte Queue; ihr Writer-Task leert sie
//! in den WebSocket. Senden ist nie blockierend: ist die Queue voll, wird die
//! Nachricht fuer diesen Empfaenger verworfen und gezaehlt.
//!
//! ## Selektives Senden
//! - An eine Verbindung: `an_verbindung_senden`
//! - An eine Menge von Verbindungen: `an_verbindungen_senden`

use dashmap::DashMap;
use haraka_core::types::ConnectionId;
use haraka_observability::HarakaMetrics;
use haraka_protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ServerMessage>,
}

/// Warum eine Nachricht nicht eingereiht wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendeFehler {
    QueueVoll,
    Geschlossen,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    pub fn senden(&self, nachricht: ServerMessage) -> Result<(), SendeFehler> {
        match self.tx.try_send(nachricht) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    typ = n.typ(),
                    "Send-Queue voll – Nachricht verworfen"
                );
                Err(SendeFehler::QueueVoll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                Err(SendeFehler::Geschlossen)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    clients: DashMap<ConnectionId, ClientSender>,
    queue_groesse: usize,
    metriken: HarakaMetrics,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu(queue_groesse: usize, metriken: HarakaMetrics) -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
                queue_groesse: queue_groesse.max(1),
                metriken,
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und schreibt in den Socket.
    pub fn client_registrieren(
        &self,
        connection_id: ConnectionId,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        self.inner
            .clients
            .insert(connection_id, ClientSender { connection_id, tx });
        tracing::debug!(connection_id = %connection_id, "Client im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung; danach eingehende Sendungen gehen ins Leere
    pub fn client_entfernen(&self, connection_id: &ConnectionId) {
        if self.inner.clients.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Client aus Broadcaster entfernt");
        }
    }

    /// Sendet eine Nachricht an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Nachricht eingereiht wurde.
    pub fn an_verbindung_senden(
        &self,
        connection_id: &ConnectionId,
        nachricht: ServerMessage,
    ) -> bool {
        let Some(sender) = self.inner.clients.get(connection_id).map(|s| s.clone()) else {
            tracing::debug!(connection_id = %connection_id, "Senden an unbekannte Verbindung");
            return false;
        };
        match sender.senden(nachricht) {
            Ok(()) => true,
            Err(SendeFehler::QueueVoll) => {
                self.inner.metriken.verworfen_zaehlen("queue_full");
                false
            }
            Err(SendeFehler::Geschlossen) => false,
        }
    }

    /// Sendet eine Nachricht an mehrere Verbindungen
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_verbindungen_senden<'a>(
        &self,
        empfaenger: impl IntoIterator<Item = &'a ConnectionId>,
        nachricht: &ServerMessage,
    ) -> usize {
        empfaenger
            .into_iter()
            .filter(|id| self.an_verbindung_senden(id, nachricht.clone()))
            .count()
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(connection_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
