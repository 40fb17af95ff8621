//! Client->Server Nachrichten
//!
//! Jede Nachricht ist ein JSON-Objekt mit einem `type`-Feld:
//!
//! ```text
//! {"type":"join-room","roomId":"r1","participantId":"alice","displayName":"Alice"}
//! {"type":"offer","payload":{...},"targetParticipantId":"bob"}
//! {"type":"toggle-audio","isMuted":true}
//! {"type":"ping"}
//! ```
//!
//! Aeltere Mobile-Clients senden `userId`, `username`, `targetUserId` und den
//! Payload unter `offer`/`answer`/`candidate`. Diese Namen werden als Alias
//! akzeptiert.

use haraka_core::types::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Nachrichten-Inhalte
// ---------------------------------------------------------------------------

/// Raum beitreten (oder Raum wechseln)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: RoomId,
    #[serde(alias = "userId")]
    pub participant_id: ParticipantId,
    #[serde(alias = "username")]
    pub display_name: String,
}

/// Offer, Answer oder ICE-Candidate
///
/// Der Payload wird vom Server nie interpretiert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    #[serde(alias = "offer", alias = "answer", alias = "candidate")]
    pub payload: serde_json::Value,
    #[serde(default, alias = "targetUserId", skip_serializing_if = "Option::is_none")]
    pub target_participant_id: Option<ParticipantId>,
}

/// Mikrofon stumm/aktiv geschaltet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleAudioRequest {
    pub is_muted: bool,
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Alle Nachrichten, die ein Client senden darf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom(JoinRoomRequest),
    Offer(SignalRequest),
    Answer(SignalRequest),
    IceCandidate(SignalRequest),
    ToggleAudio(ToggleAudioRequest),
    Ping,
}

impl ClientMessage {
    /// Dekodiert und validiert eine Textnachricht
    ///
    /// Fehlende Felder, unbekannte Typen, leere IDs und ein `null`-Payload
    /// ergeben `ProtocolError`.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let nachricht: Self = serde_json::from_str(text)?;
        nachricht.validieren()
    }

    /// Serialisiert die Nachricht als JSON (fuer Clients und Tests)
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Name des Nachrichtentyps wie auf dem Draht
    pub fn typ(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join-room",
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::IceCandidate(_) => "ice-candidate",
            Self::ToggleAudio(_) => "toggle-audio",
            Self::Ping => "ping",
        }
    }

    fn validieren(self) -> Result<Self, ProtocolError> {
        match self {
            Self::JoinRoom(req) => {
                if req.room_id.as_str().trim().is_empty() {
                    return Err(ProtocolError::LeeresFeld("roomId"));
                }
                if req.participant_id.as_str().trim().is_empty() {
                    return Err(ProtocolError::LeeresFeld("participantId"));
                }
                if req.display_name.trim().is_empty() {
                    return Err(ProtocolError::LeeresFeld("displayName"));
                }
                Ok(Self::JoinRoom(req))
            }
            Self::Offer(req) => Ok(Self::Offer(signal_validieren(req)?)),
            Self::Answer(req) => Ok(Self::Answer(signal_validieren(req)?)),
            Self::IceCandidate(req) => Ok(Self::IceCandidate(signal_validieren(req)?)),
            andere => Ok(andere),
        }
    }
}

/// Ein leeres Ziel gilt als "kein Ziel" (Broadcast)
fn signal_validieren(mut req: SignalRequest) -> Result<SignalRequest, ProtocolError> {
    if req.payload.is_null() {
        return Err(ProtocolError::LeeresFeld("payload"));
    }
    if req
        .target_participant_id
        .as_ref()
        .is_some_and(|ziel| ziel.as_str().trim().is_empty())
    {
        req.target_participant_id = None;
    }
    Ok(req)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_room_dekodieren() {
        let msg = ClientMessage::from_json(
            r#"{"type":"join-room","roomId":"r1","participantId":"alice","displayName":"Alice"}"#,
        )
        .unwrap();

        match msg {
            ClientMessage::JoinRoom(req) => {
                assert_eq!(req.room_id.as_str(), "r1");
                assert_eq!(req.participant_id.as_str(), "alice");
                assert_eq!(req.display_name, "Alice");
            }
            andere => panic!("Erwartet JoinRoom, erhalten {andere:?}"),
        }
    }

    #[test]
    fn join_room_mit_alten_feldnamen() {
        let msg = ClientMessage::from_json(
            r#"{"type":"join-room","roomId":"r1","userId":"u7","username":"Baraka"}"#,
        )
        .unwrap();

        let ClientMessage::JoinRoom(req) = msg else {
            panic!("Erwartet JoinRoom");
        };
        assert_eq!(req.participant_id.as_str(), "u7");
        assert_eq!(req.display_name, "Baraka");
    }

    #[test]
    fn join_room_ohne_pflichtfeld_ist_ungueltig() {
        let fehler =
            ClientMessage::from_json(r#"{"type":"join-room","roomId":"r1","displayName":"A"}"#)
                .unwrap_err();
        assert!(matches!(fehler, ProtocolError::UngueltigesJson(_)));
        assert!(fehler.to_string().contains("participantId"));
    }

    #[test]
    fn join_room_mit_leerer_raum_id_ist_ungueltig() {
        let fehler = ClientMessage::from_json(
            r#"{"type":"join-room","roomId":"  ","participantId":"a","displayName":"A"}"#,
        )
        .unwrap_err();
        assert_eq!(fehler, ProtocolError::LeeresFeld("roomId"));
    }

    #[test]
    fn offer_mit_ziel() {
        let msg = ClientMessage::from_json(
            r#"{"type":"offer","payload":{"sdp":"v=0"},"targetParticipantId":"bob"}"#,
        )
        .unwrap();

        let ClientMessage::Offer(req) = msg else {
            panic!("Erwartet Offer");
        };
        assert_eq!(req.payload, json!({"sdp": "v=0"}));
        assert_eq!(req.target_participant_id, Some(ParticipantId::from("bob")));
    }

    #[test]
    fn ice_candidate_mit_alten_feldnamen() {
        let msg = ClientMessage::from_json(
            r#"{"type":"ice-candidate","candidate":{"candidate":"a=1"},"targetUserId":"bob"}"#,
        )
        .unwrap();

        let ClientMessage::IceCandidate(req) = msg else {
            panic!("Erwartet IceCandidate");
        };
        assert_eq!(req.payload, json!({"candidate": "a=1"}));
        assert_eq!(req.target_participant_id.unwrap().as_str(), "bob");
    }

    #[test]
    fn leeres_ziel_wird_zu_broadcast() {
        let msg = ClientMessage::from_json(
            r#"{"type":"answer","payload":"sdp","targetParticipantId":""}"#,
        )
        .unwrap();

        let ClientMessage::Answer(req) = msg else {
            panic!("Erwartet Answer");
        };
        assert!(req.target_participant_id.is_none());
    }

    #[test]
    fn signal_ohne_payload_ist_ungueltig() {
        assert!(ClientMessage::from_json(r#"{"type":"offer"}"#).is_err());
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"offer","payload":null}"#).unwrap_err(),
            ProtocolError::LeeresFeld("payload")
        );
    }

    #[test]
    fn toggle_audio_und_ping() {
        let msg = ClientMessage::from_json(r#"{"type":"toggle-audio","isMuted":true}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ToggleAudio(ToggleAudioRequest { is_muted: true })
        );

        let ping = ClientMessage::from_json(r#"{"type":"ping","ts":1}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);
        assert_eq!(ping.typ(), "ping");
    }

    #[test]
    fn unbekannter_typ_und_kaputtes_json() {
        assert!(matches!(
            ClientMessage::from_json(r#"{"type":"chat","text":"hi"}"#),
            Err(ProtocolError::UngueltigesJson(_))
        ));
        assert!(matches!(
            ClientMessage::from_json("{nicht json"),
            Err(ProtocolError::UngueltigesJson(_))
        ));
        assert!(ClientMessage::from_json(r#"{"type":"toggle-audio"}"#).is_err());
    }

    #[test]
    fn serialisierung_verwendet_drahtnamen() {
        let msg = ClientMessage::Offer(SignalRequest {
            payload: json!("sdp"),
            target_participant_id: None,
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"offer\""));
        assert!(!json.contains("targetParticipantId"));
    }
}
