//! Fehlertypen fuer Haraka
//!
//! Zentraler Fehler-Enum fuer Zustaende, die crate-uebergreifend auftreten.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Haraka
pub type Result<T> = std::result::Result<T, HarakaError>;

/// Crate-uebergreifende Fehlerzustaende
#[derive(Debug, Error)]
pub enum HarakaError {
    /// Verbindungsversuch von einer nicht erlaubten Origin
    #[error("Origin nicht erlaubt: {0}")]
    OriginAbgelehnt(String),

    /// Ungueltige oder widerspruechliche Konfiguration
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl HarakaError {
    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
