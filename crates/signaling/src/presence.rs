//! Presence-Notifier – Beitritts- und Austrittsmeldungen
//!
//! Informiert die anderen Mitglieder eines Raums ueber Beitritt und Austritt
//! und schickt dem Beitretenden die aktuelle Teilnehmerliste. Alle Meldungen
//! sind fire-and-forget: ein Empfaenger mit voller Queue verpasst die Meldung,
//! die anderen nicht.

use haraka_core::types::{ConnectionId, RoomId};
use haraka_protocol::{PresenceNotice, RoomUsers, ServerMessage};

use crate::broadcast::EventBroadcaster;
use crate::rooms::Participant;

/// Verteilt Presence-Meldungen ueber den EventBroadcaster
///
/// Beide Meldungen laufen unter dem Raum-Guard des RoomStore; die
/// Empfaenger kommen deshalb immer vom Aufrufer.
#[derive(Clone)]
pub struct PresenceNotifier {
    broadcaster: EventBroadcaster,
}

impl PresenceNotifier {
    pub fn neu(broadcaster: EventBroadcaster) -> Self {
        Self { broadcaster }
    }

    /// Schickt dem Beitretenden `room-users` mit den anderen Teilnehmern
    pub fn teilnehmerliste_senden(&self, connection_id: ConnectionId, andere: &[Participant]) {
        let nachricht = ServerMessage::RoomUsers(RoomUsers {
            users: andere.iter().map(Participant::info).collect(),
        });
        self.broadcaster.an_verbindung_senden(&connection_id, nachricht);
    }

    /// Meldet einen Beitritt an `empfaenger` (ohne den Beitretenden selbst)
    pub fn beitritt_melden(
        &self,
        room_id: &RoomId,
        beigetreten: &Participant,
        empfaenger: &[Participant],
    ) {
        let nachricht = ServerMessage::UserJoined(PresenceNotice {
            participant_id: beigetreten.participant_id.clone(),
            display_name: beigetreten.display_name.clone(),
        });
        let verbindungen: Vec<ConnectionId> = empfaenger
            .iter()
            .map(|t| t.connection_id)
            .filter(|conn| *conn != beigetreten.connection_id)
            .collect();
        let gesendet = self.broadcaster.an_verbindungen_senden(&verbindungen, &nachricht);

        tracing::info!(
            room_id = %room_id,
            participant_id = %beigetreten.participant_id,
            display_name = %beigetreten.display_name,
            benachrichtigt = gesendet,
            "Teilnehmer beigetreten"
        );
    }

    /// Meldet einen Austritt an die verbleibenden Mitglieder `empfaenger`
    pub fn austritt_melden(
        &self,
        room_id: &RoomId,
        ausgetreten: &Participant,
        empfaenger: &[Participant],
    ) {
        let verbleibend: Vec<ConnectionId> = empfaenger
            .iter()
            .map(|t| t.connection_id)
            .filter(|conn| *conn != ausgetreten.connection_id)
            .collect();
        let nachricht = ServerMessage::UserLeft(PresenceNotice {
            participant_id: ausgetreten.participant_id.clone(),
            display_name: ausgetreten.display_name.clone(),
        });
        let gesendet = self.broadcaster.an_verbindungen_senden(&verbleibend, &nachricht);

        tracing::info!(
            room_id = %room_id,
            participant_id = %ausgetreten.participant_id,
            benachrichtigt = gesendet,
            "Teilnehmer hat Raum verlassen"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
