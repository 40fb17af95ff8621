//! Status-Reporter – Aggregierte Zaehler fuer Health-Checks

use haraka_observability::{StatusQuelle, StatusWerte};

use crate::registry::ConnectionRegistry;
use crate::rooms::RoomStore;

/// Momentaufnahme von Raum- und Teilnehmerzahl
///
/// Nur informativ: zwischen Lesen und Anzeigen kann sich alles aendern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_count: usize,
    pub participant_count: usize,
}

#[derive(Clone)]
pub struct StatusReporter {
    rooms: RoomStore,
    registry: ConnectionRegistry,
}

impl StatusReporter {
    pub fn neu(rooms: RoomStore, registry: ConnectionRegistry) -> Self {
        Self { rooms, registry }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let (room_count, participant_count) = self.rooms.zaehlen();
        RoomSnapshot {
            room_count,
            participant_count,
        }
    }
}

impl StatusQuelle for StatusReporter {
    fn status_werte(&self) -> StatusWerte {
        let snapshot = self.snapshot();
        StatusWerte {
            raeume: snapshot.room_count,
            teilnehmer: snapshot.participant_count,
            verbindungen: self.registry.anzahl(),
        }
    }
}
