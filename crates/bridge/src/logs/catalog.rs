use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Log directory and the access/error log pair of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSource {
    pub dir: PathBuf,
    pub access_log: String,
    pub error_log: String,
}

impl LogSource {
    pub fn new(dir: impl Into<PathBuf>, access_log: &str, error_log: &str) -> Self {
        Self {
            dir: dir.into(),
            access_log: access_log.to_string(),
            error_log: error_log.to_string(),
        }
    }

    /// Files in the order they are presented: access log first.
    pub fn files(&self) -> [&str; 2] {
        [&self.access_log, &self.error_log]
    }
}

/// Outcome of looking a service up in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Known(&'a LogSource),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCatalog {
    services: BTreeMap<String, LogSource>,
}

impl LogCatalog {
    /// The services deployed alongside the bridge.
    pub fn builtin() -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            "ai_assistant".to_string(),
            LogSource::new(
                "/var/log/nginx/aiAssistant/",
                "ai_access_ssl.log",
                "ai_error_ssl.log",
            ),
        );
        services.insert(
            "kodbox".to_string(),
            LogSource::new(
                "/var/log/nginx/kodbox/",
                "kodbox_access_ssl.log",
                "kodbox_error_ssl.log",
            ),
        );
        Self { services }
    }

    pub fn empty() -> Self {
        Self {
            services: BTreeMap::new(),
        }
    }

    pub fn with_service(mut self, service: &str, source: LogSource) -> Self {
        self.services.insert(service.to_string(), source);
        self
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let catalog: LogCatalog = serde_yaml::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read log catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn resolve(&self, service: &str) -> LogTarget<'_> {
        match self.services.get(service) {
            Some(source) => LogTarget::Known(source),
            None => LogTarget::Unknown,
        }
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        for (service, source) in &self.services {
            for file in source.files() {
                if file.is_empty() || file.contains('/') {
                    return Err(Error::Config(format!(
                        "Invalid log file name {:?} for service {}",
                        file, service
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for LogCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
