//! Server->Client Nachrichten
//!
//! Gegenstueck zu [`crate::client`]: ebenfalls JSON mit `type`-Feld und
//! camelCase-Feldnamen.

use chrono::{DateTime, Utc};
use haraka_core::types::ParticipantId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Nachrichten-Inhalte
// ---------------------------------------------------------------------------

/// Ein anderer Teilnehmer im Raum (Teil von `room-users`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

/// Teilnehmerliste, nur an den Beitretenden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomUsers {
    pub users: Vec<ParticipantInfo>,
}

/// Inhalt von `user-joined` und `user-left`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

/// Weitergeleitetes Offer/Answer/ICE-Candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignal {
    pub payload: serde_json::Value,
    pub sender_participant_id: ParticipantId,
}

/// Mute-Status eines Teilnehmers hat sich geaendert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChanged {
    pub participant_id: ParticipantId,
    pub is_muted: bool,
    pub display_name: String,
}

/// Antwort auf `ping`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Alle Nachrichten, die der Server an Clients sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomUsers(RoomUsers),
    UserJoined(PresenceNotice),
    UserLeft(PresenceNotice),
    Offer(RelayedSignal),
    Answer(RelayedSignal),
    IceCandidate(RelayedSignal),
    UserAudioChanged(AudioChanged),
    Pong(Pong),
}

impl ServerMessage {
    /// Erstellt eine Pong-Antwort mit der aktuellen Serverzeit
    pub fn pong_jetzt() -> Self {
        Self::Pong(Pong {
            timestamp: Utc::now(),
        })
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON (Client-Seite, Tests)
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Name des Nachrichtentyps wie auf dem Draht
    pub fn typ(&self) -> &'static str {
        match self {
            Self::RoomUsers(_) => "room-users",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft(_) => "user-left",
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::IceCandidate(_) => "ice-candidate",
            Self::UserAudioChanged(_) => "user-audio-changed",
            Self::Pong(_) => "pong",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
