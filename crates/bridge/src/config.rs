use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::provider::{DiagnosisConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::logs::LogCatalog;
use crate::sinks::dingtalk::DingTalkSink;
use crate::sinks::stdout::StdoutSink;
use crate::triage::DEFAULT_TITLE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub diagnosis: DiagnosisConfig,
    pub notifier: NotifierConfig,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Full robot webhook URL; `None` means notifications go to stdout.
    pub webhook_url: Option<String>,
    pub title: String,
    pub timeout_seconds: u64,
    /// Output format of the stdout fallback: `text` or `json`.
    pub stdout_format: String,
    pub stdout_pretty: bool,
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn stdout_sink(&self) -> crate::Result<StdoutSink> {
        StdoutSink::new(&self.stdout_format, self.stdout_pretty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// YAML file replacing the built-in service table.
    pub catalog_path: Option<PathBuf>,
}

impl LogsConfig {
    pub fn catalog(&self) -> crate::Result<LogCatalog> {
        match &self.catalog_path {
            Some(path) => LogCatalog::load(path),
            None => Ok(LogCatalog::builtin()),
        }
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        let config = Config {
            server: ServerConfig {
                addr: non_empty("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            },
            diagnosis: DiagnosisConfig {
                provider: non_empty("DIAGNOSIS_PROVIDER")
                    .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
                    .to_lowercase(),
                endpoint: non_empty("DIAGNOSIS_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                model: non_empty("DIAGNOSIS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_key: non_empty("ZHIPU_AI_KEY").or_else(|| non_empty("LLM_API_KEY")),
                timeout_seconds: parse_seconds(&non_empty, "DIAGNOSIS_TIMEOUT_SECONDS", 60)?,
            },
            notifier: NotifierConfig {
                webhook_url: non_empty("DINGTALK_WEBHOOK_URL").or_else(|| {
                    non_empty("DINGTALK_ACCESS_TOKEN").map(|token| DingTalkSink::robot_url(&token))
                }),
                title: non_empty("NOTIFY_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                timeout_seconds: parse_seconds(&non_empty, "NOTIFY_TIMEOUT_SECONDS", 10)?,
                stdout_format: non_empty("STDOUT_FORMAT")
                    .unwrap_or_else(|| "text".to_string())
                    .to_lowercase(),
                stdout_pretty: non_empty("STDOUT_PRETTY")
                    .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
            logs: LogsConfig {
                catalog_path: non_empty("LOG_CATALOG_PATH").map(PathBuf::from),
            },
        };

        // Validate required fields
        config.notifier.stdout_sink()?;
        if config.diagnosis.api_key.is_none() && config.diagnosis.provider != "mock" {
            tracing::warn!(
                "ZHIPU_AI_KEY / LLM_API_KEY is not set. Diagnosis requests will likely be rejected."
            );
        }
        if config.notifier.webhook_url.is_none() {
            tracing::warn!(
                "DINGTALK_WEBHOOK_URL / DINGTALK_ACCESS_TOKEN is not set. Notifications will be printed to stdout."
            );
        }

        Ok(config)
    }
}

fn parse_seconds(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> crate::Result<u64> {
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(crate::Error::Config(format!(
                "{} must be a positive number of seconds, got {:?}",
                key, raw
            ))),
            Ok(seconds) => Ok(seconds),
        },
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:5000".to_string(),
            },
            diagnosis: DiagnosisConfig::default(),
            notifier: NotifierConfig {
                webhook_url: None,
                title: DEFAULT_TITLE.to_string(),
                timeout_seconds: 10,
                stdout_format: "text".to_string(),
                stdout_pretty: false,
            },
            logs: LogsConfig { catalog_path: None },
        }
    }
}
