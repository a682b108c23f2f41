use thiserror::Error;

/// Failures surfaced to the operator. None of them stops the process.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Location permission not granted")]
    PermissionDenied,
    #[error("Please enter a session name")]
    EmptySessionIdentifier,
    #[error("Wifi scan failed: {0}")]
    ScanDriver(String),
    #[error("Magnetometer unavailable: {0}")]
    Sensor(String),
    #[error("Upload of '{document}' failed: {reason}")]
    UploadTransport { document: String, reason: String },
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("State store error: {0}")]
    Store(#[from] std::io::Error),
}
