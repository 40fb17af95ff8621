//! Integration-Tests fuer den Signaling-Ablauf (Dispatcher-Ebene, ohne Netzwerk)

use haraka_core::types::{ConnectionId, ParticipantId, RoomId};
use haraka_observability::HarakaMetrics;
use haraka_protocol::{PresenceNotice, RelayedSignal, ServerMessage};
use haraka_signaling::{
    MessageDispatcher, SignalingConfig, SignalingError, SignalingState, VerbindungsZustand,
};
use serde_json::json;
use tokio::sync::mpsc::Receiver;

struct Client {
    conn: ConnectionId,
    rx: Receiver<ServerMessage>,
}

impl Client {
    fn naechste(&mut self) -> ServerMessage {
        self.rx.try_recv().expect("Nachricht erwartet")
    }

    fn nichts_mehr(&mut self) {
        if let Ok(n) = self.rx.try_recv() {
            panic!("Keine weitere Nachricht erwartet, erhalten: {n:?}");
        }
    }
}

fn dispatcher() -> MessageDispatcher {
    MessageDispatcher::neu(SignalingState::neu(
        SignalingConfig::default(),
        HarakaMetrics::neu().unwrap(),
    ))
}

fn verbinden(d: &MessageDispatcher) -> Client {
    let (conn, rx) = d.verbindung_oeffnen();
    Client { conn, rx }
}

fn beitreten(d: &MessageDispatcher, c: &Client, raum: &str, id: &str) {
    let text = json!({
        "type": "join-room",
        "roomId": raum,
        "participantId": id,
        "displayName": id.to_uppercase(),
    })
    .to_string();
    d.text_verarbeiten(c.conn, &text).unwrap();
}

fn senden(d: &MessageDispatcher, c: &Client, nachricht: serde_json::Value) {
    d.text_verarbeiten(c.conn, &nachricht.to_string()).unwrap();
}

#[tokio::test]
async fn szenario_zwei_teilnehmer_in_r1() {
    let d = dispatcher();
    let r1 = RoomId::from("r1");
    let mut a = verbinden(&d);
    let mut b = verbinden(&d);

    beitreten(&d, &a, "r1", "A");
    assert!(matches!(a.naechste(), ServerMessage::RoomUsers(l) if l.users.is_empty()));

    beitreten(&d, &b, "r1", "B");
    match b.naechste() {
        ServerMessage::RoomUsers(liste) => {
            assert_eq!(liste.users.len(), 1);
            assert_eq!(liste.users[0].participant_id, ParticipantId::from("A"));
        }
        andere => panic!("room-users erwartet, erhalten: {andere:?}"),
    }
    assert_eq!(
        a.naechste(),
        ServerMessage::UserJoined(PresenceNotice {
            participant_id: "B".into(),
            display_name: "B".into(),
        })
    );

    // B sendet ein Offer ohne Ziel: A erhaelt es mit B als Absender
    senden(&d, &b, json!({"type": "offer", "payload": {"sdp": "v=0 b"}}));
    assert_eq!(
        a.naechste(),
        ServerMessage::Offer(RelayedSignal {
            payload: json!({"sdp": "v=0 b"}),
            sender_participant_id: "B".into(),
        })
    );
    b.nichts_mehr();

    // A trennt: B erhaelt user-left, r1 existiert weiter
    d.verbindung_beenden(a.conn);
    assert_eq!(
        b.naechste(),
        ServerMessage::UserLeft(PresenceNotice {
            participant_id: "A".into(),
            display_name: "A".into(),
        })
    );
    assert!(d.state().rooms.existiert(&r1));

    // B trennt: r1 ist weg
    d.verbindung_beenden(b.conn);
    assert!(!d.state().rooms.existiert(&r1));
    assert_eq!(d.state().status.snapshot().participant_count, 0);
}

#[tokio::test]
async fn broadcast_erreicht_alle_ausser_absender_und_niemanden_ausserhalb() {
    let d = dispatcher();
    let mut clients: Vec<Client> = (0..4).map(|_| verbinden(&d)).collect();
    let mut fremd = verbinden(&d);

    for (i, c) in clients.iter().enumerate() {
        beitreten(&d, c, "gruppe", &format!("p{i}"));
    }
    beitreten(&d, &fremd, "anderer", "x");
    for c in clients.iter_mut() {
        while c.rx.try_recv().is_ok() {}
    }
    while fremd.rx.try_recv().is_ok() {}

    senden(
        &d,
        &clients[0],
        json!({"type": "ice-candidate", "payload": {"candidate": "c1"}}),
    );

    clients[0].nichts_mehr();
    for c in clients.iter_mut().skip(1) {
        assert!(matches!(c.naechste(), ServerMessage::IceCandidate(s) if s.sender_participant_id == ParticipantId::from("p0")));
    }
    fremd.nichts_mehr();
}

#[tokio::test]
async fn gezielte_nachricht_an_ausgetretenen_wird_still_verworfen() {
    let d = dispatcher();
    let mut a = verbinden(&d);
    let b = verbinden(&d);
    let mut c = verbinden(&d);
    beitreten(&d, &a, "r1", "a");
    beitreten(&d, &b, "r1", "b");
    beitreten(&d, &c, "r1", "c");
    d.verbindung_beenden(b.conn);
    while a.rx.try_recv().is_ok() {}
    while c.rx.try_recv().is_ok() {}

    // Kein Fehler fuer den Absender
    senden(
        &d,
        &a,
        json!({"type": "answer", "payload": {"sdp": "x"}, "targetParticipantId": "b"}),
    );
    c.nichts_mehr();

    // Weitere Zustellungen sind nicht beeintraechtigt
    senden(
        &d,
        &a,
        json!({"type": "answer", "payload": {"sdp": "y"}, "targetParticipantId": "c"}),
    );
    assert!(matches!(c.naechste(), ServerMessage::Answer(_)));
    a.nichts_mehr();
}

#[tokio::test]
async fn erneuter_beitritt_erzeugt_keine_duplikate() {
    let d = dispatcher();
    let a = verbinden(&d);
    let r1 = RoomId::from("r1");

    beitreten(&d, &a, "r1", "a");
    beitreten(&d, &a, "r1", "a");

    assert_eq!(d.state().rooms.groesse(&r1), 1);
    assert_eq!(d.state().status.snapshot().participant_count, 1);
}

#[tokio::test]
async fn reconnect_uebernimmt_eintrag_und_alte_verbindung_raeumt_nicht_auf() {
    let d = dispatcher();
    let r1 = RoomId::from("r1");
    let alt = verbinden(&d);
    let mut b = verbinden(&d);
    beitreten(&d, &alt, "r1", "a");
    beitreten(&d, &b, "r1", "b");

    let neu = verbinden(&d);
    beitreten(&d, &neu, "r1", "a");

    assert_eq!(d.state().rooms.groesse(&r1), 2);
    assert_eq!(d.state().registry.zustand(alt.conn), VerbindungsZustand::Offen);
    assert_eq!(d.state().registry.zustand(neu.conn), VerbindungsZustand::ImRaum);

    // Timeout der alten Verbindung darf den neuen Eintrag nicht entfernen
    while b.rx.try_recv().is_ok() {}
    d.verbindung_beenden(alt.conn);
    b.nichts_mehr();

    let mitglieder = d.state().rooms.mitglieder_von(&r1);
    assert_eq!(mitglieder[&ParticipantId::from("a")].connection_id, neu.conn);

    // Weiterleitung an "a" erreicht die neue Verbindung
    senden(
        &d,
        &b,
        json!({"type": "offer", "payload": {}, "targetParticipantId": "a"}),
    );
    let mut neu = neu;
    assert!(matches!(neu.naechste(), ServerMessage::RoomUsers(_)));
    assert!(matches!(neu.naechste(), ServerMessage::Offer(_)));
}

#[test]
fn trennung_und_reconnect_gleichzeitig_ergeben_keinen_veralteten_austritt() {
    let r1 = RoomId::from("r1");
    let a = ParticipantId::from("a");

    for _ in 0..300 {
        let d = dispatcher();
        let mut b = verbinden(&d);
        let x = verbinden(&d);
        let y = verbinden(&d);
        beitreten(&d, &b, "r1", "B");
        beitreten(&d, &x, "r1", "a");
        while b.rx.try_recv().is_ok() {}

        let (x_conn, y_conn) = (x.conn, y.conn);
        let join_a = json!({
            "type": "join-room",
            "roomId": "r1",
            "participantId": "a",
            "displayName": "A",
        })
        .to_string();
        let start = std::sync::Barrier::new(2);
        std::thread::scope(|s| {
            let (d, start, join_a) = (&d, &start, &join_a);
            s.spawn(move || {
                start.wait();
                d.verbindung_beenden(x_conn);
            });
            s.spawn(move || {
                start.wait();
                d.text_verarbeiten(y_conn, join_a).unwrap();
            });
        });

        // `a` ist in jedem Fall ueber die neue Verbindung im Raum
        let mitglieder = d.state().rooms.mitglieder_von(&r1);
        assert_eq!(mitglieder.get(&a).map(|t| t.connection_id), Some(y_conn));

        // Die letzte Presence-Meldung ueber `a` muss der Beitritt sein
        let mut letzte = None;
        while let Ok(nachricht) = b.rx.try_recv() {
            match nachricht {
                ServerMessage::UserJoined(n) if n.participant_id == a => {
                    letzte = Some("user-joined")
                }
                ServerMessage::UserLeft(n) if n.participant_id == a => {
                    letzte = Some("user-left")
                }
                _ => {}
            }
        }
        assert_eq!(letzte, Some("user-joined"));
    }
}

#[tokio::test]
async fn signaling_vor_beitritt_wird_verworfen() {
    let d = dispatcher();
    let a = verbinden(&d);
    let mut b = verbinden(&d);
    beitreten(&d, &b, "r1", "b");
    let _ = b.naechste();

    let fehler = d
        .text_verarbeiten(a.conn, r#"{"type":"toggle-audio","isMuted":true}"#)
        .unwrap_err();
    assert!(matches!(fehler, SignalingError::NichtImRaum));
    b.nichts_mehr();
}

#[tokio::test]
async fn ungueltige_nachricht_haelt_verbindung_offen() {
    let d = dispatcher();
    let mut a = verbinden(&d);
    let mut b = verbinden(&d);
    beitreten(&d, &a, "r1", "a");
    beitreten(&d, &b, "r1", "b");
    while a.rx.try_recv().is_ok() {}
    while b.rx.try_recv().is_ok() {}

    for kaputt in [
        "{",
        r#"{"type":"offer"}"#,
        r#"{"type":"join-room","roomId":"","participantId":"a","displayName":"A"}"#,
        r#"{"type":"gibts-nicht"}"#,
    ] {
        assert!(matches!(
            d.text_verarbeiten(a.conn, kaputt),
            Err(SignalingError::Protokoll(_))
        ));
    }

    // Verbindung ist weiterhin im Raum und funktionsfaehig
    senden(&d, &a, json!({"type": "toggle-audio", "isMuted": true}));
    match b.naechste() {
        ServerMessage::UserAudioChanged(info) => {
            assert_eq!(info.participant_id, ParticipantId::from("a"));
            assert!(info.is_muted);
            assert_eq!(info.display_name, "A");
        }
        andere => panic!("user-audio-changed erwartet, erhalten: {andere:?}"),
    }
}

#[tokio::test]
async fn legacy_feldnamen_werden_akzeptiert() {
    let d = dispatcher();
    let mut a = verbinden(&d);
    let b = verbinden(&d);
    beitreten(&d, &a, "r1", "a");

    senden(
        &d,
        &b,
        json!({"type": "join-room", "roomId": "r1", "userId": "b", "username": "Bea"}),
    );
    let _ = a.naechste(); // room-users
    assert!(matches!(a.naechste(), ServerMessage::UserJoined(p) if p.display_name == "Bea"));

    senden(
        &d,
        &b,
        json!({"type": "offer", "offer": {"sdp": "alt"}, "targetUserId": "a"}),
    );
    assert!(matches!(a.naechste(), ServerMessage::Offer(s) if s.payload == json!({"sdp": "alt"})));
}
