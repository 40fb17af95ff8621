//! Fehlertypen fuer das Signaling-Protokoll

use thiserror::Error;

/// Eine eingehende Nachricht konnte nicht interpretiert werden
///
/// Betrifft immer nur die einzelne Nachricht; die Verbindung bleibt offen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Kein gueltiges JSON, unbekannter `type` oder fehlendes Pflichtfeld
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigesJson(String),

    /// Pflichtfeld vorhanden aber leer
    #[error("Pflichtfeld '{0}' ist leer")]
    LeeresFeld(&'static str),

    /// Binaer-Frame statt JSON-Text
    #[error("Binaer-Frames werden nicht unterstuetzt")]
    BinaerFrame,
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::UngueltigesJson(e.to_string())
    }
}
