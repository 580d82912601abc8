//! Status and health check handlers.
//!
//! - `/health` - Simple liveness check for systemd/load balancers
//! - `/status` - Server status with uptime and mechanism counters
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "bragfeed",
//!   "uptime_seconds": 3600,
//!   "status": "running",
//!   "counters": {
//!     "admitted_total": 1024,
//!     "rejected_total": 17,
//!     "webhook_received_total": 42
//!   }
//! }
//! ```

use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::metrics::{global_metrics, MetricsSnapshot};

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Health check response for simple liveness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (always "healthy" if responding)
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Server status response with uptime and counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version (from Cargo.toml)
    pub version: String,

    /// Server name
    pub name: String,

    /// Server uptime in seconds
    pub uptime_seconds: u64,

    /// Admission and webhook counters
    pub counters: MetricsSnapshot,

    /// Server status (always "running" if responding)
    pub status: String,

    /// ISO8601 timestamp of when status was generated
    pub timestamp: String,
}

/// `GET /health`
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// `GET /status`
pub async fn status_handler() -> impl IntoResponse {
    let metrics = global_metrics();
    Json(StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: metrics.uptime().as_secs(),
        counters: metrics.snapshot(),
        status: "running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    global_metrics().to_prometheus_format()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serializes() {
        let json = serde_json::to_string(&HealthResponse::default()).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
    }

    #[tokio::test]
    async fn test_status_reports_name_and_version() {
        let metrics = global_metrics();
        let response = StatusResponse {
            version: SERVER_VERSION.to_string(),
            name: SERVER_NAME.to_string(),
            uptime_seconds: metrics.uptime().as_secs(),
            counters: metrics.snapshot(),
            status: "running".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };

        assert_eq!(response.name, "bragfeed");
        assert!(!response.version.is_empty());
    }
}
