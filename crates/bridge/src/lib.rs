pub mod agent;
pub mod config;
pub mod logs;
pub mod metrics;
pub mod server;
pub mod sinks;
pub mod sources;
pub mod template;
pub mod triage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Log unavailable: {0}")]
    LogUnavailable(String),
    #[error("Diagnosis unavailable: {0}")]
    DiagnosisUnavailable(String),
    #[error("Notification delivery failed: {0}")]
    NotificationDeliveryFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
