//! haraka-signaling – WebSocket Signaling Layer
//!
//! Dieser Crate implementiert den Signaling-Relay fuer Haraka Afya Voice.
//! Clients treten ueber WebSocket einem Raum bei und tauschen ueber den
//! Server WebRTC-Offers, -Answers und ICE-Candidates aus. Audio laeuft
//! danach direkt zwischen den Peers.
//!
//! ## Architektur
//!
//! ```text
//! ws_router (GET /ws, /socket, Origin-Pruefung)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, Keepalive)
//!     |  State Machine: Offen -> ImRaum -> Geschlossen
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- RoomStore         (Raeume und Teilnehmer)
//!     +-- SignalRelay       (Offer, Answer, ICE, Audio-Status)
//!     +-- PresenceNotifier  (room-users, user-joined, user-left)
//!
//! ConnectionRegistry – Verbindung -> Raum/Teilnehmer
//! EventBroadcaster   – Send-Queue pro Verbindung
//! StatusReporter     – Zaehler fuer /health und /metrics
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod server_state;
pub mod status;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use presence::PresenceNotifier;
pub use registry::{Binding, ConnectionRegistry, VerbindungsZustand};
pub use relay::{Signal, SignalArt, SignalRelay, Zustellung};
pub use rooms::{JoinResult, Participant, RoomStore};
pub use server_state::{SignalingConfig, SignalingState};
pub use status::{RoomSnapshot, StatusReporter};
pub use ws::{origin_pruefen, ws_router, WEBSOCKET_PFAD};
