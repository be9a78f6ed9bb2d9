//! Alertmanager webhook payloads and the alert records derived from them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

pub const DEFAULT_SERVICE: &str = "通用业务";
pub const DEFAULT_INSTANCE: &str = "未知节点";
pub const DEFAULT_SUMMARY: &str = "系统异常";
pub const DEFAULT_DESCRIPTION: &str = "暂无详细描述";

/// Body returned to the caller when the webhook carried nothing usable.
pub const EMPTY_PAYLOAD: &str = "Empty data";

// AlertManager webhook payload structures. Only the fields the bridge reads
// are kept; unknown keys are ignored and even `alerts` may be missing.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AlertManagerWebhook {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub alerts: Vec<AlertManagerAlert>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AlertManagerAlert {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl AlertManagerWebhook {
    /// Parse a raw request body.
    ///
    /// An empty body, `null` and `{}` are all rejected as empty data; anything
    /// that is not a JSON object of the expected shape is rejected as malformed.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::InvalidPayload(EMPTY_PAYLOAD.to_string()));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::InvalidPayload(format!("Malformed JSON body: {}", e)))?;

        match &value {
            Value::Null => return Err(Error::InvalidPayload(EMPTY_PAYLOAD.to_string())),
            Value::Object(map) if map.is_empty() => {
                return Err(Error::InvalidPayload(EMPTY_PAYLOAD.to_string()))
            }
            Value::Object(_) => {}
            _ => {
                return Err(Error::InvalidPayload(
                    "Expected a JSON object".to_string(),
                ))
            }
        }

        serde_json::from_value(value)
            .map_err(|e| Error::InvalidPayload(format!("Unexpected payload structure: {}", e)))
    }

    /// Convert the payload into the ordered batch the dispatcher works on.
    pub fn into_batch(self) -> AlertBatch {
        AlertBatch {
            alerts: self.alerts.into_iter().map(AlertRecord::from).collect(),
        }
    }
}

/// Alert status as reported by the monitoring system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
    #[default]
    Unknown,
}

impl AlertStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("firing") => AlertStatus::Firing,
            Some("resolved") => AlertStatus::Resolved,
            _ => AlertStatus::Unknown,
        }
    }

    pub fn is_resolved(self) -> bool {
        self == AlertStatus::Resolved
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Firing => write!(f, "firing"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single alert with every optional field already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub status: AlertStatus,
    pub service: String,
    pub instance: String,
    pub summary: String,
    pub description: String,
}

impl From<AlertManagerAlert> for AlertRecord {
    fn from(alert: AlertManagerAlert) -> Self {
        let AlertManagerAlert {
            status,
            mut labels,
            mut annotations,
            ..
        } = alert;

        Self {
            status: AlertStatus::parse(status.as_deref()),
            service: labels
                .remove("service")
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            instance: labels
                .remove("instance")
                .unwrap_or_else(|| DEFAULT_INSTANCE.to_string()),
            summary: annotations
                .remove("summary")
                .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
            description: annotations
                .remove("description")
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        }
    }
}

/// Alerts of one inbound request, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertBatch {
    pub alerts: Vec<AlertRecord>,
}

impl AlertBatch {
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
