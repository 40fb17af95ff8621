//! haraka-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Identifikationstypen bereit, die von allen
//! anderen Haraka-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HarakaError, Result};
pub use types::{ConnectionId, ParticipantId, RoomId};
