use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{NotificationMessage, Notifier};
use crate::template::MessageTemplates;
use crate::{Error, Result};

pub const ROBOT_SEND_URL: &str = "https://oapi.dingtalk.com/robot/send";

#[derive(Debug, Serialize)]
struct MarkdownMessage<'a> {
    msgtype: &'static str,
    markdown: MarkdownContent<'a>,
}

#[derive(Debug, Serialize)]
struct MarkdownContent<'a> {
    title: &'a str,
    text: &'a str,
}

// DingTalk answers 200 even for rejected messages and reports the outcome here.
#[derive(Debug, Deserialize)]
struct RobotResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// DingTalk custom robot webhook.
pub struct DingTalkSink {
    client: Client,
    url: String,
    templates: MessageTemplates,
}

impl DingTalkSink {
    pub fn new(url: &str, timeout: Duration, templates: MessageTemplates) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build DingTalk client: {}", e)))?;

        Ok(Self::with_client(client, url, templates))
    }

    pub fn with_client(client: Client, url: &str, templates: MessageTemplates) -> Self {
        Self {
            client,
            url: url.to_string(),
            templates,
        }
    }

    /// Robot URL for an access token.
    pub fn robot_url(access_token: &str) -> String {
        format!("{}?access_token={}", ROBOT_SEND_URL, access_token)
    }
}

#[async_trait]
impl Notifier for DingTalkSink {
    fn name(&self) -> String {
        "dingtalk".to_string()
    }

    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        let text = self.templates.envelope(&message.body)?;
        let payload = MarkdownMessage {
            msgtype: "markdown",
            markdown: MarkdownContent {
                title: &message.title,
                text: &text,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::NotificationDeliveryFailed(e.to_string()))?;

        let status = response.status();
        info!("DingTalk delivery status: {}", status.as_u16());

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::NotificationDeliveryFailed(format!(
                "DingTalk returned {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(reply) = serde_json::from_str::<RobotResponse>(&body) {
            if reply.errcode != 0 {
                return Err(Error::NotificationDeliveryFailed(format!(
                    "DingTalk rejected message ({}): {}",
                    reply.errcode, reply.errmsg
                )));
            }
        }

        Ok(())
    }
}
