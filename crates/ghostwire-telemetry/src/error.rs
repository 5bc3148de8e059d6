//! Error types for telemetry

/// Telemetry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    /// Transport rejected or failed to deliver a batch
    #[error("metrics transport failed: {0}")]
    Transport(String),

    /// Config value out of range
    #[error("invalid telemetry config {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}
