//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt den Port
//! (Hosting-Plattformen setzen sie).

use haraka_core::HarakaError;
use haraka_observability::logging::{log_format_gueltig, log_level_gueltig};
use haraka_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Signaling-Einstellungen (Queues, Keepalive)
    pub signaling: SignalingEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Dienstes (erscheint in `GET /`)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Haraka Afya Voice Server".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
    /// Erlaubte Origins fuer WebSocket und CORS (leer = alle)
    pub erlaubte_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            erlaubte_origins: vec!["http://localhost:36236".into()],
        }
    }
}

/// Signaling-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        Self {
            send_queue_groesse: 64,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level ("trace" bis "error") oder EnvFilter-Direktive,
    /// z.B. "info,haraka_signaling=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    /// `PORT` aus der Umgebung hat Vorrang vor der Datei.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        if let Ok(port) = std::env::var("PORT") {
            config.port_ueberschreiben(&port)?;
        }
        config.validieren()?;
        Ok(config)
    }

    /// Setzt den Port aus einem String (z.B. aus `PORT`)
    pub fn port_ueberschreiben(&mut self, wert: &str) -> Result<(), HarakaError> {
        self.netzwerk.port = wert
            .trim()
            .parse()
            .map_err(|_| HarakaError::konfiguration(format!("Ungueltiger Port: '{wert}'")))?;
        Ok(())
    }

    /// Prueft Werte, die TOML allein nicht ausschliessen kann
    pub fn validieren(&self) -> Result<(), HarakaError> {
        if self.signaling.send_queue_groesse == 0 {
            return Err(HarakaError::konfiguration(
                "signaling.send_queue_groesse muss groesser als 0 sein",
            ));
        }
        if self.signaling.keepalive_sek == 0 {
            return Err(HarakaError::konfiguration(
                "signaling.keepalive_sek muss groesser als 0 sein",
            ));
        }
        if self.signaling.verbindungs_timeout_sek <= self.signaling.keepalive_sek {
            return Err(HarakaError::konfiguration(
                "signaling.verbindungs_timeout_sek muss groesser als keepalive_sek sein",
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(HarakaError::konfiguration(format!(
                "Unbekanntes Log-Level: '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(HarakaError::konfiguration(format!(
                "Unbekanntes Log-Format: '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Konfiguration fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            send_queue_groesse: self.signaling.send_queue_groesse,
            keepalive_sek: self.signaling.keepalive_sek,
            verbindungs_timeout_sek: self.signaling.verbindungs_timeout_sek,
            erlaubte_origins: self.netzwerk.erlaubte_origins.clone(),
        }
    }
}
