//! # haraka-observability
//!
//! Observability-Crate fuer Haraka:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Status-Endpunkte (`/health`, `/`)
//! - Structured Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{status_router, HealthResponse, ServiceInfo, StatusQuelle, StatusState, StatusWerte};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, HarakaMetrics};
pub use middleware::{request_timing_layer, timing_middleware};
