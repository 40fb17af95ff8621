//! Connection-Registry – Identitaet pro Verbindung
//!
//! Jede offene WebSocket-Verbindung bekommt beim Accept eine `ConnectionId`
//! und einen Eintrag in der Registry. Nach `join-room` haengt an dem Eintrag
//! die Bindung an Raum und Teilnehmer-ID.
//!
//! ## State Machine
//! ```text
//! Offen --join--> ImRaum --join (anderer Raum)--> ImRaum
//!   |               |
//!   +--- trennen ---+--> Geschlossen
//! ```

use dashmap::DashMap;
use haraka_core::types::{ConnectionId, ParticipantId, RoomId};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{SignalingError, SignalingResult};

/// Raum- und Teilnehmer-Identitaet einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub display_name: String,
}

/// Zustand einer Verbindung aus Sicht des Signalings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Verbunden, noch keinem Raum beigetreten
    Offen,
    /// In einem Raum; darf Signaling-Nachrichten senden
    ImRaum,
    /// Nicht (mehr) registriert
    Geschlossen,
}

#[derive(Debug)]
struct Eintrag {
    verbunden_seit: Instant,
    bindung: Option<Binding>,
}

/// Registry aller offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<ConnectionId, Eintrag>>,
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine neue Verbindung und vergibt ihre ID
    pub fn verbinden(&self) -> ConnectionId {
        let id = ConnectionId::new();
        self.inner.insert(
            id,
            Eintrag {
                verbunden_seit: Instant::now(),
                bindung: None,
            },
        );
        tracing::debug!(connection_id = %id, "Verbindung registriert");
        id
    }

    /// Bindet eine Verbindung an Raum und Teilnehmer
    ///
    /// Gibt die vorherige Bindung zurueck. Der Aufrufer ist dafuer
    /// zustaendig, die alte Mitgliedschaft vorher im RoomStore zu loesen.
    pub fn binden(
        &self,
        connection_id: ConnectionId,
        bindung: Binding,
    ) -> SignalingResult<Option<Binding>> {
        let mut eintrag = self
            .inner
            .get_mut(&connection_id)
            .ok_or(SignalingError::UnbekannteVerbindung(connection_id))?;
        Ok(eintrag.bindung.replace(bindung))
    }

    /// Loest die Bindung, falls sie noch auf `room_id`/`participant_id` zeigt
    ///
    /// Verwendet beim Reconnect: die alte Verbindung faellt auf `Offen`
    /// zurueck, ohne eine zwischenzeitlich neue Bindung zu verlieren.
    pub fn loesen_wenn(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> bool {
        let Some(mut eintrag) = self.inner.get_mut(&connection_id) else {
            return false;
        };
        let passt = eintrag
            .bindung
            .as_ref()
            .is_some_and(|b| &b.room_id == room_id && &b.participant_id == participant_id);
        if passt {
            eintrag.bindung = None;
        }
        passt
    }

    /// Entfernt die Verbindung und gibt ihre letzte Bindung zurueck
    pub fn trennen(&self, connection_id: ConnectionId) -> Option<Binding> {
        let (_, eintrag) = self.inner.remove(&connection_id)?;
        tracing::debug!(
            connection_id = %connection_id,
            dauer_sek = eintrag.verbunden_seit.elapsed().as_secs(),
            "Verbindung aus Registry entfernt"
        );
        eintrag.bindung
    }

    /// Aktuelle Bindung einer Verbindung
    pub fn bindung_von(&self, connection_id: ConnectionId) -> Option<Binding> {
        self.inner.get(&connection_id)?.bindung.clone()
    }

    /// Zustand einer Verbindung
    pub fn zustand(&self, connection_id: ConnectionId) -> VerbindungsZustand {
        match self.inner.get(&connection_id) {
            Some(eintrag) if eintrag.bindung.is_some() => VerbindungsZustand::ImRaum,
            Some(_) => VerbindungsZustand::Offen,
            None => VerbindungsZustand::Geschlossen,
        }
    }

    /// Anzahl offener Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }
}
