//! Fehlertypen fuer den Signaling-Service
//!
//! Kein Fehler hier ist fatal: jeder betrifft genau eine eingehende
//! Nachricht, die verworfen und protokolliert wird.

use haraka_core::types::ConnectionId;
use haraka_protocol::ProtocolError;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Nachricht unvollstaendig oder nicht interpretierbar
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Signaling-Nachricht von einer Verbindung ohne Raum
    #[error("Verbindung ist keinem Raum beigetreten")]
    NichtImRaum,

    /// Verbindung ist nicht (mehr) in der Registry
    #[error("Unbekannte Verbindung: {0}")]
    UnbekannteVerbindung(ConnectionId),
}

impl SignalingError {
    /// Kurzer Grund fuer Metrik-Labels
    pub fn grund(&self) -> &'static str {
        match self {
            Self::Protokoll(_) => "malformed",
            Self::NichtImRaum => "not_in_room",
            Self::UnbekannteVerbindung(_) => "unknown_connection",
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gruende_fuer_metriken() {
        let e: SignalingError = ProtocolError::BinaerFrame.into();
        assert_eq!(e.grund(), "malformed");
        assert_eq!(SignalingError::NichtImRaum.grund(), "not_in_room");
        assert!(SignalingError::UnbekannteVerbindung(ConnectionId::new())
            .to_string()
            .starts_with("Unbekannte Verbindung: conn:"));
    }
}
