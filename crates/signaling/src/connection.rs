//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Eingehende Textframes werden nacheinander an den
//! `MessageDispatcher` uebergeben; ausgehende Nachrichten kommen aus der
//! Send-Queue der Verbindung im EventBroadcaster.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen WebSocket-Ping
//! - Ohne eingehenden Frame innerhalb von `verbindungs_timeout_sek` wird
//!   die Verbindung getrennt
//! - Jede Trennung laeuft durch denselben Cleanup

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::dispatcher::MessageDispatcher;
use crate::error::SignalingError;
use crate::server_state::SignalingState;

/// Close-Code "going away" beim Herunterfahren
const CLOSE_GOING_AWAY: u16 = 1001;

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: Option<SocketAddr>,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: Option<SocketAddr>) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, der Timeout greift oder ein
    /// Shutdown-Signal eingeht. Danach wird die Verbindung aus Registry,
    /// Broadcaster und Raum entfernt.
    pub async fn verarbeiten(self, mut socket: WebSocket) {
        let peer = self
            .peer_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unbekannt".to_string());
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek.max(1));

        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let (connection_id, mut sende_rx) = dispatcher.verbindung_oeffnen();
        let mut shutdown_rx = self.state.shutdown_abonnieren();

        tracing::info!(peer = %peer, connection_id = %connection_id, "Neue Verbindung");

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer, connection_id = %connection_id, "Verbindungs-Timeout");
                break;
            }

            // Aufwachen zum naechsten Ping oder zum Timeout, je nachdem was frueher ist
            let aufwachen = naechster_ping.min(letzter_empfang + timeout_dauer + Duration::from_millis(1));

            tokio::select! {
                // Eingehender Frame vom Client
                frame = socket.recv() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            match nachricht {
                                Message::Text(text) => {
                                    if let Err(e) = dispatcher.text_verarbeiten(connection_id, &text) {
                                        nachricht_verworfen(&peer, &e);
                                    }
                                }
                                Message::Binary(_) => {
                                    let e = SignalingError::from(
                                        haraka_protocol::ProtocolError::BinaerFrame,
                                    );
                                    self.state.metriken.verworfen_zaehlen(e.grund());
                                    nachricht_verworfen(&peer, &e);
                                }
                                Message::Ping(_) | Message::Pong(_) => {
                                    tracing::trace!(peer = %peer, "Ping/Pong empfangen");
                                }
                                Message::Close(_) => {
                                    tracing::info!(peer = %peer, "Verbindung vom Client geschlossen");
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer, fehler = %e, "WebSocket-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Broadcaster
                ausgehend = sende_rx.recv() => {
                    let Some(ausgehend) = ausgehend else {
                        // Queue wurde aus dem Broadcaster entfernt
                        break;
                    };
                    let json = match ausgehend.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(fehler = %e, typ = ausgehend.typ(), "Serialisierung fehlgeschlagen");
                            continue;
                        }
                    };
                    if let Err(e) = socket.send(Message::Text(json)).await {
                        tracing::warn!(peer = %peer, fehler = %e, "Senden fehlgeschlagen");
                        break;
                    }
                }

                // Keepalive-Ping bzw. Timeout-Pruefung
                _ = tokio::time::sleep_until(aufwachen) => {
                    if Instant::now() >= naechster_ping {
                        if let Err(e) = socket.send(Message::Ping(Vec::new())).await {
                            tracing::warn!(peer = %peer, fehler = %e, "Ping-Senden fehlgeschlagen");
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = socket
                            .send(Message::Close(Some(CloseFrame {
                                code: CLOSE_GOING_AWAY,
                                reason: "Server wird heruntergefahren".into(),
                            })))
                            .await;
                        break;
                    }
                }
            }
        }

        dispatcher.verbindung_beenden(connection_id);
        tracing::info!(peer = %peer, connection_id = %connection_id, "Verbindungs-Task beendet");
    }
}

fn nachricht_verworfen(peer: &str, fehler: &SignalingError) {
    match fehler {
        SignalingError::NichtImRaum => {
            tracing::warn!(peer = %peer, "Signaling-Nachricht vor join-room verworfen");
        }
        andere => {
            tracing::warn!(peer = %peer, fehler = %andere, "Ungueltige Nachricht verworfen");
        }
    }
}
