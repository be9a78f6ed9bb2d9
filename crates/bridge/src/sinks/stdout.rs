use async_trait::async_trait;
use serde_json::json;

use super::{NotificationMessage, Notifier};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

/// Prints notifications instead of delivering them. Used for dry runs and
/// when no chat webhook is configured.
#[derive(Debug)]
pub struct StdoutSink {
    format: OutputFormat,
    pretty: bool, // For JSON output
}

impl StdoutSink {
    pub fn new(format: &str, pretty: bool) -> Result<Self> {
        let format = match format.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "text" => OutputFormat::Text,
            other => {
                return Err(Error::Config(format!(
                    "Invalid format for stdout sink: {}. Must be 'json' or 'text'",
                    other
                )))
            }
        };

        Ok(StdoutSink { format, pretty })
    }

    fn render(&self, message: &NotificationMessage) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let value = json!({
                    "msgtype": "markdown",
                    "markdown": { "title": message.title, "text": message.body },
                });
                if self.pretty {
                    Ok(serde_json::to_string_pretty(&value)?)
                } else {
                    Ok(serde_json::to_string(&value)?)
                }
            }
            OutputFormat::Text => Ok(format!("# {}\n\n{}", message.title, message.body)),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            pretty: false,
        }
    }
}

#[async_trait]
impl Notifier for StdoutSink {
    fn name(&self) -> String {
        "stdout".to_string()
    }

    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        println!("{}", self.render(message)?);
        Ok(())
    }
}
