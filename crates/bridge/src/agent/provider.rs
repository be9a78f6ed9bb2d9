//! Diagnosis Provider Abstraction
//!
//! Provides a unified interface over the completion services used for
//! diagnosis: any OpenAI-compatible chat-completions endpoint (Zhipu by
//! default) over plain HTTP, and OpenAI/Anthropic through Rig.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rig::completion::Prompt;
use rig::providers::{anthropic, openai};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_PROVIDER: &str = "zhipu";
pub const DEFAULT_ENDPOINT: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_MODEL: &str = "glm-4";

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const MAX_TOKENS: u64 = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

impl DiagnosisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// A completion service able to answer a system + user message exchange.
///
/// Every failure is reported as [`Error::DiagnosisUnavailable`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiagnosisProvider: Send + Sync {
    async fn diagnose(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsProvider {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build completion client: {}", e)))?;

        Ok(Self::with_client(client, endpoint, model, api_key))
    }

    /// Use a preconfigured HTTP client; its timeout applies to the call.
    pub fn with_client(client: Client, endpoint: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl DiagnosisProvider for ChatCompletionsProvider {
    async fn diagnose(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Requesting diagnosis from {} with model {}", url, self.model);
        let response = request
            .send()
            .await
            .map_err(|e| Error::DiagnosisUnavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::DiagnosisUnavailable(format!(
                "Completion service returned {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::DiagnosisUnavailable(format!("Malformed response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                Error::DiagnosisUnavailable("Response contained no message content".to_string())
            })
    }
}

enum RigClient {
    OpenAI(openai::Client),
    Anthropic(anthropic::Client),
}

/// OpenAI or Anthropic through Rig agents, with the system message as preamble.
pub struct RigProvider {
    client: RigClient,
    model: String,
    timeout: Duration,
}

impl RigProvider {
    pub fn openai(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: RigClient::OpenAI(openai::Client::new(api_key)),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn anthropic(api_key: &str, model: &str, timeout: Duration) -> Self {
        let client = anthropic::Client::new(
            api_key,
            ANTHROPIC_API_URL,
            None,
            anthropic::ANTHROPIC_VERSION_LATEST,
        );

        Self {
            client: RigClient::Anthropic(client),
            model: model.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl DiagnosisProvider for RigProvider {
    async fn diagnose(&self, system: &str, prompt: &str) -> Result<String> {
        let call = async {
            match &self.client {
                RigClient::OpenAI(client) => {
                    let agent = client
                        .agent(&self.model)
                        .preamble(system)
                        .max_tokens(MAX_TOKENS)
                        .build();
                    agent.prompt(prompt).await
                }
                RigClient::Anthropic(client) => {
                    let agent = client
                        .agent(&self.model)
                        .preamble(system)
                        .max_tokens(MAX_TOKENS)
                        .build();
                    agent.prompt(prompt).await
                }
            }
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                Error::DiagnosisUnavailable(format!(
                    "No answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::DiagnosisUnavailable(format!("{} API error: {:?}", self.model, e)))
    }
}

/// Canned provider for dry runs.
pub struct MockProvider;

#[async_trait]
impl DiagnosisProvider for MockProvider {
    async fn diagnose(&self, _system: &str, prompt: &str) -> Result<String> {
        let headline = prompt.lines().next().unwrap_or_default();
        Ok(format!(
            "（模拟诊断）{}\n\n\
            可能原因：上游服务响应缓慢或进程异常退出。\n\n\
            建议：检查错误日志中的最新报错，确认进程状态后重启服务。",
            headline
        ))
    }
}

/// Create a provider from configuration
pub fn create_provider(config: &DiagnosisConfig) -> Result<Arc<dyn DiagnosisProvider>> {
    match config.provider.to_lowercase().as_str() {
        "zhipu" | "openai-compatible" | "chat-completions" => {
            let provider = ChatCompletionsProvider::new(
                &config.endpoint,
                &config.model,
                config.api_key.clone(),
                config.timeout(),
            )?;
            Ok(Arc::new(provider))
        }
        "openai" => Ok(Arc::new(RigProvider::openai(
            required_key(config)?,
            &config.model,
            config.timeout(),
        ))),
        "anthropic" | "claude" => Ok(Arc::new(RigProvider::anthropic(
            required_key(config)?,
            &config.model,
            config.timeout(),
        ))),
        "mock" => Ok(Arc::new(MockProvider)),
        other => Err(Error::Config(format!(
            "Unsupported diagnosis provider: {}",
            other
        ))),
    }
}

fn required_key(config: &DiagnosisConfig) -> Result<&str> {
    config
        .api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "An API key is required for the {} provider",
                config.provider
            ))
        })
}
