//! haraka-protocol – Signaling-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichten, die zwischen Client und Server
//! ueber die WebSocket-Verbindung ausgetauscht werden.
//!
//! ## Design
//! - Eine JSON-Textnachricht pro WebSocket-Frame
//! - Tagged Enums (`type`-Feld) fuer eine geschlossene Menge an Nachrichtentypen
//! - Validierung an der Grenze: unvollstaendige Nachrichten werden zu
//!   `ProtocolError`, nie zu halb gefuellten Strukturen

pub mod client;
pub mod error;
pub mod server;

pub use client::{ClientMessage, JoinRoomRequest, SignalRequest, ToggleAudioRequest};
pub use error::ProtocolError;
pub use server::{
    AudioChanged, ParticipantInfo, PresenceNotice, Pong, RelayedSignal, RoomUsers, ServerMessage,
};
