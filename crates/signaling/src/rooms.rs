//! Room-Store – Raeume und ihre Teilnehmer
//!
//! Einziger geteilter, veraenderlicher Zustand des Signaling-Servers.
//! Raeume entstehen beim ersten Beitritt und verschwinden in derselben
//! kritischen Sektion, in der ihr letzter Teilnehmer entfernt wird. Ein
//! leerer Raum ist daher nie von aussen sichtbar.
//!
//! ## Nebenlaeufigkeit
//! Jede Aenderung an einem Raum laeuft unter dem Schreib-Guard seines
//! DashMap-Eintrags. Beitritte und Austritte desselben Raums sind damit
//! linearisiert, unterschiedliche Raeume blockieren sich nur bei
//! Shard-Kollisionen gegenseitig.

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use haraka_core::types::{ConnectionId, ParticipantId, RoomId};
use haraka_protocol::ParticipantInfo;
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Ein Teilnehmer in einem Raum
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub participant_id: ParticipantId,
    pub display_name: String,
    /// Verbindung, der dieser Eintrag gehoert
    pub connection_id: ConnectionId,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Erstellt einen Teilnehmer mit Beitrittszeit "jetzt"
    pub fn neu(
        participant_id: ParticipantId,
        display_name: impl Into<String>,
        connection_id: ConnectionId,
    ) -> Self {
        Self {
            participant_id,
            display_name: display_name.into(),
            connection_id,
            joined_at: Utc::now(),
        }
    }

    /// Protokoll-Darstellung fuer `room-users`
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            participant_id: self.participant_id.clone(),
            display_name: self.display_name.clone(),
            joined_at: self.joined_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Raum
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Room {
    teilnehmer: HashMap<ParticipantId, Participant>,
}

impl Room {
    /// Alle Teilnehmer ausser `ausser`, in Beitrittsreihenfolge
    fn andere_als(&self, ausser: &ParticipantId) -> Vec<Participant> {
        let mut andere: Vec<Participant> = self
            .teilnehmer
            .values()
            .filter(|t| &t.participant_id != ausser)
            .cloned()
            .collect();
        andere.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        andere
    }
}

/// Ergebnis eines Beitritts
#[derive(Debug, Clone)]
pub struct JoinResult {
    /// Alle anderen Teilnehmer des Raums (ohne den Beitretenden)
    pub andere: Vec<Participant>,
    /// Eintrag derselben Teilnehmer-ID, der von einer anderen Verbindung
    /// gehalten wurde und jetzt ersetzt ist (Reconnect)
    pub verdraengt: Option<Participant>,
    /// Raum wurde durch diesen Beitritt erzeugt
    pub raum_erstellt: bool,
}

// ---------------------------------------------------------------------------
// RoomStore
// ---------------------------------------------------------------------------

/// Verwaltet alle Raeume
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct RoomStore {
    inner: Arc<DashMap<RoomId, Room>>,
}

impl RoomStore {
    /// Erstellt einen leeren RoomStore
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt einen Teilnehmer einem Raum hinzu und erzeugt den Raum bei Bedarf
    ///
    /// Eine bereits vorhandene gleiche Teilnehmer-ID wird ersetzt, nie
    /// dupliziert. `waehrenddessen` laeuft, solange der Raum noch exklusiv
    /// gehalten wird: Benachrichtigungen, die dort eingereiht werden, liegen
    /// vor jeder Weiterleitung, die den neuen Teilnehmer bereits sieht.
    /// `waehrenddessen` darf nicht auf den RoomStore zugreifen.
    pub fn beitreten<F>(&self, room_id: &RoomId, teilnehmer: Participant, waehrenddessen: F) -> JoinResult
    where
        F: FnOnce(&JoinResult),
    {
        let mut raum_erstellt = false;
        let mut raum = self.inner.entry(room_id.clone()).or_insert_with(|| {
            raum_erstellt = true;
            Room::default()
        });

        let participant_id = teilnehmer.participant_id.clone();
        let connection_id = teilnehmer.connection_id;
        let verdraengt = raum
            .teilnehmer
            .insert(participant_id.clone(), teilnehmer)
            .filter(|alt| alt.connection_id != connection_id);

        let ergebnis = JoinResult {
            andere: raum.andere_als(&participant_id),
            verdraengt,
            raum_erstellt,
        };

        waehrenddessen(&ergebnis);

        tracing::debug!(
            room_id = %room_id,
            participant_id = %participant_id,
            teilnehmer = raum.teilnehmer.len(),
            "Teilnehmer beigetreten"
        );
        drop(raum);

        if raum_erstellt {
            tracing::info!(room_id = %room_id, "Raum erstellt");
        }
        ergebnis
    }

    /// Entfernt einen Teilnehmer, sofern der Eintrag noch `connection_id` gehoert
    ///
    /// Wird der Raum dadurch leer, wird er im selben Schritt geloescht.
    /// `waehrenddessen` bekommt den entfernten Teilnehmer und die
    /// verbleibenden Mitglieder und laeuft noch unter dem Raum-Guard, so wie
    /// bei `beitreten`. Ein gleichzeitiger Reconnect derselben Teilnehmer-ID
    /// wird damit entweder vor oder nach dieser Meldung eingereiht, nie
    /// dazwischen. `waehrenddessen` darf nicht auf den RoomStore zugreifen.
    ///
    /// Gibt den entfernten Teilnehmer zurueck; `None` wenn Raum oder
    /// Teilnehmer schon weg sind oder der Eintrag inzwischen einer anderen
    /// Verbindung gehoert. In diesen Faellen laeuft `waehrenddessen` nicht.
    pub fn verlassen<F>(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        connection_id: ConnectionId,
        waehrenddessen: F,
    ) -> Option<Participant>
    where
        F: FnOnce(&Participant, &[Participant]),
    {
        let Entry::Occupied(mut raum) = self.inner.entry(room_id.clone()) else {
            return None;
        };

        let gehoert_verbindung = raum
            .get()
            .teilnehmer
            .get(participant_id)
            .is_some_and(|t| t.connection_id == connection_id);
        if !gehoert_verbindung {
            return None;
        }

        let entfernt = raum.get_mut().teilnehmer.remove(participant_id)?;
        let verbleibend = raum.get().andere_als(participant_id);
        waehrenddessen(&entfernt, &verbleibend);

        if verbleibend.is_empty() {
            raum.remove();
            tracing::info!(room_id = %room_id, "Raum geloescht (leer)");
        }
        Some(entfernt)
    }

    /// Momentaufnahme der Mitglieder eines Raums (leer wenn Raum fehlt)
    pub fn mitglieder_von(&self, room_id: &RoomId) -> HashMap<ParticipantId, Participant> {
        self.inner
            .get(room_id)
            .map(|raum| raum.teilnehmer.clone())
            .unwrap_or_default()
    }

    /// Prueft ob ein Raum existiert
    pub fn existiert(&self, room_id: &RoomId) -> bool {
        self.inner.contains_key(room_id)
    }

    /// Anzahl der Teilnehmer eines Raums
    pub fn groesse(&self, room_id: &RoomId) -> usize {
        self.inner
            .get(room_id)
            .map(|raum| raum.teilnehmer.len())
            .unwrap_or(0)
    }

    /// Zaehlt Raeume und Teilnehmer in einem Durchlauf
    pub fn zaehlen(&self) -> (usize, usize) {
        self.inner
            .iter()
            .fold((0, 0), |(raeume, teilnehmer), raum| {
                (raeume + 1, teilnehmer + raum.teilnehmer.len())
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn teilnehmer(id: &str, conn: ConnectionId) -> Participant {
        Participant::neu(ParticipantId::from(id), id.to_uppercase(), conn)
    }

    fn beitreten(store: &RoomStore, raum: &str, t: Participant) -> JoinResult {
        store.beitreten(&RoomId::from(raum), t, |_| {})
    }

    #[test]
    fn erster_beitritt_erstellt_raum() {
        let store = RoomStore::neu();
        let raum = RoomId::from("r1");
        assert!(!store.existiert(&raum));

        let ergebnis = beitreten(&store, "r1", teilnehmer("a", ConnectionId::new()));
        assert!(ergebnis.raum_erstellt);
        assert!(ergebnis.andere.is_empty());
        assert!(store.existiert(&raum));
        assert_eq!(store.groesse(&raum), 1);
    }

    #[test]
    fn beitritt_liefert_andere_ohne_sich_selbst() {
        let store = RoomStore::neu();
        beitreten(&store, "r1", teilnehmer("a", ConnectionId::new()));
        beitreten(&store, "r1", teilnehmer("b", ConnectionId::new()));

        let ergebnis = beitreten(&store, "r1", teilnehmer("c", ConnectionId::new()));
        let ids: Vec<&str> = ergebnis
            .andere
            .iter()
            .map(|t| t.participant_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!ergebnis.raum_erstellt);
    }

    #[test]
    fn letzter_austritt_loescht_raum() {
        let store = RoomStore::neu();
        let raum = RoomId::from("r1");
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();
        beitreten(&store, "r1", teilnehmer("a", conn_a));
        beitreten(&store, "r1", teilnehmer("b", conn_b));

        let a = ParticipantId::from("a");
        let b = ParticipantId::from("b");
        assert!(store.verlassen(&raum, &a, conn_a, |_, _| {}).is_some());
        assert!(store.existiert(&raum), "Raum mit einem Teilnehmer muss bleiben");

        assert!(store.verlassen(&raum, &b, conn_b, |_, _| {}).is_some());
        assert!(!store.existiert(&raum), "Leerer Raum darf nicht existieren");
        assert_eq!(store.zaehlen(), (0, 0));
    }

    #[test]
    fn verlassen_eines_fehlenden_raums_ist_noop() {
        let store = RoomStore::neu();
        let ergebnis = store.verlassen(
            &RoomId::from("gibt-es-nicht"),
            &ParticipantId::from("a"),
            ConnectionId::new(),
            |_, _| panic!("Callback darf ohne Raum nicht laufen"),
        );
        assert!(ergebnis.is_none());
    }

    #[test]
    fn erneuter_beitritt_erzeugt_keinen_doppelten_eintrag() {
        let store = RoomStore::neu();
        let raum = RoomId::from("r1");
        let conn = ConnectionId::new();

        beitreten(&store, "r1", teilnehmer("a", conn));
        let ergebnis = beitreten(&store, "r1", teilnehmer("a", conn));

        assert_eq!(store.groesse(&raum), 1);
        assert!(ergebnis.verdraengt.is_none(), "Gleiche Verbindung verdraengt nicht");
    }

    #[test]
    fn reconnect_verdraengt_alte_verbindung() {
        let store = RoomStore::neu();
        let raum = RoomId::from("r1");
        let alt = ConnectionId::new();
        let neu = ConnectionId::new();

        beitreten(&store, "r1", teilnehmer("a", alt));
        let ergebnis = beitreten(&store, "r1", teilnehmer("a", neu));

        assert_eq!(store.groesse(&raum), 1);
        assert_eq!(ergebnis.verdraengt.map(|t| t.connection_id), Some(alt));

        // Die alte Verbindung darf den neuen Eintrag nicht entfernen
        let a = ParticipantId::from("a");
        let mut callback_gelaufen = false;
        assert!(store
            .verlassen(&raum, &a, alt, |_, _| callback_gelaufen = true)
            .is_none());
        assert!(!callback_gelaufen, "Veralteter Austritt darf nichts melden");
        assert_eq!(store.groesse(&raum), 1);
        assert!(store.verlassen(&raum, &a, neu, |_, _| {}).is_some());
        assert!(!store.existiert(&raum));
    }

    #[test]
    fn callback_sieht_ergebnis_vor_rueckgabe() {
        let store = RoomStore::neu();
        beitreten(&store, "r1", teilnehmer("a", ConnectionId::new()));

        let mut gesehen = Vec::new();
        store.beitreten(&RoomId::from("r1"), teilnehmer("b", ConnectionId::new()), |erg| {
            gesehen = erg.andere.iter().map(|t| t.participant_id.clone()).collect();
        });
        assert_eq!(gesehen, vec![ParticipantId::from("a")]);
    }

    #[test]
    fn austritts_callback_sieht_verbleibende_unter_guard() {
        let store = RoomStore::neu();
        let raum = RoomId::from("r1");
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();
        beitreten(&store, "r1", teilnehmer("a", conn_a));
        beitreten(&store, "r1", teilnehmer("b", conn_b));

        let mut gesehen = None;
        store.verlassen(&raum, &ParticipantId::from("a"), conn_a, |entfernt, verbleibend| {
            gesehen = Some((
                entfernt.participant_id.clone(),
                verbleibend
                    .iter()
                    .map(|t| t.participant_id.clone())
                    .collect::<Vec<_>>(),
            ));
        });
        assert_eq!(
            gesehen,
            Some((ParticipantId::from("a"), vec![ParticipantId::from("b")]))
        );

        // Letzter Austritt: Callback laeuft mit leerer Liste, Raum ist danach weg
        let mut verbleibend_anzahl = None;
        store.verlassen(&raum, &ParticipantId::from("b"), conn_b, |_, verbleibend| {
            verbleibend_anzahl = Some(verbleibend.len());
        });
        assert_eq!(verbleibend_anzahl, Some(0));
        assert!(!store.existiert(&raum));
    }

    #[test]
    fn zaehlen_summiert_alle_raeume() {
        let store = RoomStore::neu();
        for (raum, id) in [("r1", "a"), ("r1", "b"), ("r2", "c"), ("r3", "d"), ("r3", "e")] {
            beitreten(&store, raum, teilnehmer(id, ConnectionId::new()));
        }
        let (raeume, teilnehmer_gesamt) = store.zaehlen();
        assert_eq!(raeume, 3);
        assert_eq!(teilnehmer_gesamt, 5);

        let summe: usize = ["r1", "r2", "r3"]
            .iter()
            .map(|r| store.groesse(&RoomId::from(*r)))
            .sum();
        assert_eq!(teilnehmer_gesamt, summe);
    }

    #[test]
    fn mitglieder_von_ist_momentaufnahme() {
        let store = RoomStore::neu();
        let conn = ConnectionId::new();
        beitreten(&store, "r1", teilnehmer("a", conn));

        let snapshot = store.mitglieder_von(&RoomId::from("r1"));
        store.verlassen(&RoomId::from("r1"), &ParticipantId::from("a"), conn, |_, _| {});

        assert_eq!(snapshot.len(), 1);
        assert!(store.mitglieder_von(&RoomId::from("r1")).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallele_beitritte_und_austritte_bleiben_konsistent() {
        let store = RoomStore::neu();
        let raum = RoomId::from("gemeinsam");

        let mut aufgaben = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let raum = raum.clone();
            aufgaben.push(tokio::spawn(async move {
                let conn = ConnectionId::new();
                let id = ParticipantId::new(format!("p{i}"));
                for _ in 0..50 {
                    store.beitreten(&raum, Participant::neu(id.clone(), "x", conn), |_| {});
                    tokio::task::yield_now().await;
                    store.verlassen(&raum, &id, conn, |_, _| {});
                }
            }));
        }
        for aufgabe in aufgaben {
            aufgabe.await.unwrap();
        }

        assert!(!store.existiert(&raum));
        assert_eq!(store.zaehlen(), (0, 0));
    }
}
