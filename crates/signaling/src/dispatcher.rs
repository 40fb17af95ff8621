//! Message-Dispatcher – Routet ClientMessages an Room-Store, Relay und Presence
//!
//! Der Dispatcher empfaengt dekodierte Nachrichten einer Verbindung und fuehrt
//! sie gegen den gemeinsamen Zustand aus. Antworten und Weiterleitungen gehen
//! ausschliesslich ueber die Send-Queues des EventBroadcasters.
//!
//! ## Zustandspruefung
//! - `ping` und `join-room` sind in jedem offenen Zustand erlaubt
//! - `offer`, `answer`, `ice-candidate`, `toggle-audio` nur im Zustand
//!   `ImRaum`; sonst wird die Nachricht verworfen

use haraka_core::types::ConnectionId;
use haraka_protocol::{ClientMessage, JoinRoomRequest, ServerMessage, SignalRequest};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{SignalingError, SignalingResult};
use crate::registry::{Binding, VerbindungsZustand};
use crate::relay::Signal;
use crate::rooms::Participant;
use crate::server_state::SignalingState;

/// Zentraler Message-Dispatcher
#[derive(Clone)]
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Registriert eine neue Verbindung in Registry und Broadcaster
    ///
    /// Gibt die Verbindungs-ID und die Queue der ausgehenden Nachrichten zurueck.
    pub fn verbindung_oeffnen(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let connection_id = self.state.registry.verbinden();
        let rx = self.state.broadcaster.client_registrieren(connection_id);
        (connection_id, rx)
    }

    /// Dekodiert und verarbeitet eine Textnachricht
    ///
    /// Verworfene Nachrichten werden mit ihrem Grund gezaehlt.
    pub fn text_verarbeiten(&self, connection_id: ConnectionId, text: &str) -> SignalingResult<()> {
        let ergebnis = ClientMessage::from_json(text)
            .map_err(SignalingError::from)
            .and_then(|nachricht| self.dispatch(connection_id, nachricht));
        if let Err(ref e) = ergebnis {
            self.state.metriken.verworfen_zaehlen(e.grund());
        }
        ergebnis
    }

    /// Fuehrt eine dekodierte Nachricht aus
    pub fn dispatch(&self, connection_id: ConnectionId, nachricht: ClientMessage) -> SignalingResult<()> {
        tracing::trace!(
            connection_id = %connection_id,
            typ = nachricht.typ(),
            "Nachricht empfangen"
        );

        match nachricht {
            // -------------------------------------------------------------------
            // In jedem Zustand erlaubt
            // -------------------------------------------------------------------
            ClientMessage::Ping => {
                self.state
                    .broadcaster
                    .an_verbindung_senden(&connection_id, ServerMessage::pong_jetzt());
                Ok(())
            }

            ClientMessage::JoinRoom(req) => self.raum_beitreten(connection_id, req),

            // -------------------------------------------------------------------
            // Nur im Raum
            // -------------------------------------------------------------------
            ClientMessage::Offer(req) => self.signal_weiterleiten(connection_id, req, Signal::Offer),
            ClientMessage::Answer(req) => {
                self.signal_weiterleiten(connection_id, req, Signal::Answer)
            }
            ClientMessage::IceCandidate(req) => {
                self.signal_weiterleiten(connection_id, req, Signal::IceCandidate)
            }

            ClientMessage::ToggleAudio(req) => {
                let bindung = self.bindung_pruefen(connection_id)?;
                self.state.relay.weiterleiten(
                    Signal::AudioStatus {
                        is_muted: req.is_muted,
                        display_name: bindung.display_name.clone(),
                    },
                    &bindung.room_id,
                    connection_id,
                    &bindung.participant_id,
                    None,
                );
                tracing::debug!(
                    room_id = %bindung.room_id,
                    participant_id = %bindung.participant_id,
                    is_muted = req.is_muted,
                    "Audio-Status geaendert"
                );
                Ok(())
            }
        }
    }

    /// Tritt einem Raum bei; eine bestehende Mitgliedschaft wird vorher geloest
    fn raum_beitreten(&self, connection_id: ConnectionId, req: JoinRoomRequest) -> SignalingResult<()> {
        if self.state.registry.zustand(connection_id) == VerbindungsZustand::Geschlossen {
            return Err(SignalingError::UnbekannteVerbindung(connection_id));
        }

        // Erneuter Beitritt (gleicher oder anderer Raum): erst sauber austreten
        if let Some(vorher) = self.state.registry.bindung_von(connection_id) {
            self.mitgliedschaft_loesen(connection_id, &vorher);
        }

        let teilnehmer = Participant::neu(
            req.participant_id.clone(),
            req.display_name.clone(),
            connection_id,
        );
        let presence = &self.state.presence;
        let ergebnis = self
            .state
            .rooms
            .beitreten(&req.room_id, teilnehmer.clone(), |ergebnis| {
                presence.teilnehmerliste_senden(connection_id, &ergebnis.andere);
                presence.beitritt_melden(&req.room_id, &teilnehmer, &ergebnis.andere);
            });

        self.state.registry.binden(
            connection_id,
            Binding {
                room_id: req.room_id.clone(),
                participant_id: req.participant_id.clone(),
                display_name: req.display_name,
            },
        )?;

        if let Some(alt) = ergebnis.verdraengt {
            // Reconnect: alte Verbindung faellt auf `Offen` zurueck
            self.state
                .registry
                .loesen_wenn(alt.connection_id, &req.room_id, &req.participant_id);
            tracing::info!(
                room_id = %req.room_id,
                participant_id = %req.participant_id,
                alte_verbindung = %alt.connection_id,
                neue_verbindung = %connection_id,
                "Teilnehmer-Eintrag von neuer Verbindung uebernommen"
            );
        }
        Ok(())
    }

    fn signal_weiterleiten(
        &self,
        connection_id: ConnectionId,
        req: SignalRequest,
        signal: fn(serde_json::Value) -> Signal,
    ) -> SignalingResult<()> {
        let bindung = self.bindung_pruefen(connection_id)?;
        // Fehlendes Ziel ist kein Fehler
        self.state.relay.weiterleiten(
            signal(req.payload),
            &bindung.room_id,
            connection_id,
            &bindung.participant_id,
            req.target_participant_id.as_ref(),
        );
        Ok(())
    }

    fn bindung_pruefen(&self, connection_id: ConnectionId) -> SignalingResult<Binding> {
        self.state
            .registry
            .bindung_von(connection_id)
            .ok_or(SignalingError::NichtImRaum)
    }

    /// Entfernt den Teilnehmer aus seinem Raum und meldet den Austritt
    ///
    /// Die Meldung wird noch unter dem Raum-Guard eingereiht. No-op wenn der
    /// Eintrag inzwischen einer anderen Verbindung gehoert.
    fn mitgliedschaft_loesen(&self, connection_id: ConnectionId, bindung: &Binding) {
        let presence = &self.state.presence;
        self.state.rooms.verlassen(
            &bindung.room_id,
            &bindung.participant_id,
            connection_id,
            |entfernt, verbleibend| {
                presence.austritt_melden(&bindung.room_id, entfernt, verbleibend)
            },
        );
    }

    /// Raeumt eine geschlossene Verbindung auf
    ///
    /// Idempotent: ein zweiter Aufruf findet nichts mehr vor.
    pub fn verbindung_beenden(&self, connection_id: ConnectionId) {
        self.state.broadcaster.client_entfernen(&connection_id);
        if let Some(bindung) = self.state.registry.trennen(connection_id) {
            self.mitgliedschaft_loesen(connection_id, &bindung);
        }
    }

    /// Zugriff auf den gemeinsamen Zustand
    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
