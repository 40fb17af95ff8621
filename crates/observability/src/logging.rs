//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfigurationsdatei):
//! - `HARAKA_LOG_LEVEL`: Log-Level oder EnvFilter-Direktive, Standard: info
//! - `HARAKA_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// Faellt auf `info` / `text` zurueck falls weder Umgebung noch Konfiguration
/// einen gueltigen Wert liefern.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("HARAKA_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env().unwrap_or_else(|| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Gibt das Log-Format aus der Umgebung zurueck, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var("HARAKA_LOG_FORMAT").ok()
}

/// Validiert ob ein Log-Level-String gueltig ist.
///
/// Erlaubt sind die fuenf Level sowie EnvFilter-Direktiven mit Ziel
/// (`haraka_signaling=debug`, `info,haraka_signaling=trace`). Ein einzelnes
/// unbekanntes Wort wie `verbose` gilt nicht als Direktive, sonst wuerde ein
/// Tippfehler still als Target-Filter durchgehen.
pub fn log_level_gueltig(level: &str) -> bool {
    if matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
        return true;
    }
    (level.contains('=') || level.contains(',')) && EnvFilter::try_new(level).is_ok()
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
