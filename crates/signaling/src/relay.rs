//! Signaling-Relay – Leitet Offer/Answer/ICE und Audio-Status weiter
//!
//! Der Relay interpretiert den Payload nie. Er bestimmt nur die Empfaenger:
//! - mit Ziel: genau die Verbindung des Ziel-Teilnehmers, sofern dieser im
//!   Raum ist; sonst wird die Nachricht still verworfen
//! - ohne Ziel: alle anderen Mitglieder des Raums, nie der Absender
//!
//! Die Empfaenger werden aus einer Momentaufnahme der Mitglieder bestimmt.
//! Pro Empfaenger gibt es genau eine FIFO-Queue, daher bleibt die Reihenfolge
//! zwischen einem Absender und einem Empfaenger erhalten.

use haraka_core::types::{ConnectionId, ParticipantId, RoomId};
use haraka_observability::HarakaMetrics;
use haraka_protocol::{AudioChanged, RelayedSignal, ServerMessage};

use crate::broadcast::EventBroadcaster;
use crate::rooms::RoomStore;

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Weiterzuleitende Nachricht
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(serde_json::Value),
    Answer(serde_json::Value),
    IceCandidate(serde_json::Value),
    AudioStatus { is_muted: bool, display_name: String },
}

/// Art eines Signals (Metrik-Label)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalArt {
    Offer,
    Answer,
    IceCandidate,
    AudioStateChange,
}

impl SignalArt {
    pub fn als_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::AudioStateChange => "audio-state-change",
        }
    }
}

impl Signal {
    pub fn art(&self) -> SignalArt {
        match self {
            Self::Offer(_) => SignalArt::Offer,
            Self::Answer(_) => SignalArt::Answer,
            Self::IceCandidate(_) => SignalArt::IceCandidate,
            Self::AudioStatus { .. } => SignalArt::AudioStateChange,
        }
    }

    /// Ausgehende Nachricht, markiert mit dem Absender
    fn nachricht(self, absender: &ParticipantId) -> ServerMessage {
        let weitergeleitet = |payload| RelayedSignal {
            payload,
            sender_participant_id: absender.clone(),
        };
        match self {
            Self::Offer(p) => ServerMessage::Offer(weitergeleitet(p)),
            Self::Answer(p) => ServerMessage::Answer(weitergeleitet(p)),
            Self::IceCandidate(p) => ServerMessage::IceCandidate(weitergeleitet(p)),
            Self::AudioStatus {
                is_muted,
                display_name,
            } => ServerMessage::UserAudioChanged(AudioChanged {
                participant_id: absender.clone(),
                is_muted,
                display_name,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Zustellung
// ---------------------------------------------------------------------------

/// Ergebnis einer Weiterleitung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    /// An so viele Empfaenger eingereiht
    Zugestellt(usize),
    /// Ziel ist nicht (mehr) im Raum
    ZielFehlt,
}

impl Zustellung {
    fn label(self) -> &'static str {
        match self {
            Self::Zugestellt(0) => "no_recipients",
            Self::Zugestellt(_) => "delivered",
            Self::ZielFehlt => "target_missing",
        }
    }
}

// ---------------------------------------------------------------------------
// SignalRelay
// ---------------------------------------------------------------------------

/// Leitet Signaling-Nachrichten innerhalb eines Raums weiter
#[derive(Clone)]
pub struct SignalRelay {
    rooms: RoomStore,
    broadcaster: EventBroadcaster,
    metriken: HarakaMetrics,
}

impl SignalRelay {
    pub fn neu(rooms: RoomStore, broadcaster: EventBroadcaster, metriken: HarakaMetrics) -> Self {
        Self {
            rooms,
            broadcaster,
            metriken,
        }
    }

    /// Leitet ein Signal weiter
    ///
    /// Ein fehlendes Ziel ist kein Fehler, nur ein Ergebnis.
    pub fn weiterleiten(
        &self,
        signal: Signal,
        room_id: &RoomId,
        absender_verbindung: ConnectionId,
        absender: &ParticipantId,
        ziel: Option<&ParticipantId>,
    ) -> Zustellung {
        let art = signal.art();
        let mitglieder = self.rooms.mitglieder_von(room_id);

        let empfaenger: Vec<ConnectionId> = match ziel {
            Some(ziel_id) => mitglieder
                .get(ziel_id)
                .map(|t| t.connection_id)
                .filter(|conn| *conn != absender_verbindung)
                .into_iter()
                .collect(),
            None => mitglieder
                .values()
                .map(|t| t.connection_id)
                .filter(|conn| *conn != absender_verbindung)
                .collect(),
        };

        let zustellung = if ziel.is_some() && empfaenger.is_empty() {
            Zustellung::ZielFehlt
        } else {
            let nachricht = signal.nachricht(absender);
            Zustellung::Zugestellt(
                self.broadcaster
                    .an_verbindungen_senden(&empfaenger, &nachricht),
            )
        };

        self.metriken.signal_zaehlen(art.als_str(), zustellung.label());
        match zustellung {
            Zustellung::ZielFehlt => tracing::debug!(
                room_id = %room_id,
                absender = %absender,
                ziel = ?ziel.map(ParticipantId::as_str),
                art = art.als_str(),
                "Ziel nicht im Raum – Signal verworfen"
            ),
            Zustellung::Zugestellt(n) => tracing::trace!(
                room_id = %room_id,
                absender = %absender,
                art = art.als_str(),
                empfaenger = n,
                "Signal weitergeleitet"
            ),
        }
        zustellung
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
