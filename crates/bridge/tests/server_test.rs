use std::sync::{Arc, Mutex};

use alert_triage_bridge::{
    agent::DiagnosisProvider,
    logs::{LogCatalog, LogContextReader, LogSource, DIRECTORY_NOT_FOUND},
    server::Server,
    sinks::{NotificationMessage, Notifier},
    template::MessageTemplates,
    triage::TriageDispatcher,
    Error, Result,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingProvider {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl DiagnosisProvider for RecordingProvider {
    async fn diagnose(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            Err(Error::DiagnosisUnavailable("quota exceeded".to_string()))
        } else {
            Ok("php-fpm 进程数耗尽，建议调大 pm.max_children".to_string())
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<NotificationMessage>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> String {
        "recording".to_string()
    }

    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct Harness {
    server: TestServer,
    provider: Arc<RecordingProvider>,
    notifier: Arc<RecordingNotifier>,
    _logs: TempDir,
}

impl Harness {
    fn new(fail_diagnosis: bool) -> Self {
        let logs = TempDir::new().unwrap();
        // Both services point at directories that were never created.
        let catalog = LogCatalog::empty()
            .with_service(
                "ai_assistant",
                LogSource::new(
                    logs.path().join("aiAssistant"),
                    "ai_access_ssl.log",
                    "ai_error_ssl.log",
                ),
            )
            .with_service(
                "kodbox",
                LogSource::new(
                    logs.path().join("kodbox"),
                    "kodbox_access_ssl.log",
                    "kodbox_error_ssl.log",
                ),
            );

        let provider = Arc::new(RecordingProvider {
            fail: fail_diagnosis,
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let dispatcher = TriageDispatcher::new(
            Arc::new(LogContextReader::new(catalog)),
            provider.clone(),
            notifier.clone(),
            MessageTemplates::new().unwrap(),
        );
        let server = TestServer::new(Server::new(Arc::new(dispatcher)).build_router()).unwrap();

        Self {
            server,
            provider,
            notifier,
            _logs: logs,
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.provider.prompts.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<NotificationMessage> {
        self.notifier.messages.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::new(false);

    let response = harness.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_resolved_alert_sends_recovery_without_diagnosis() {
    let harness = Harness::new(false);

    let response = harness
        .server
        .post("/alert")
        .json(&json!({
            "status": "resolved",
            "alerts": [{"status": "resolved", "labels": {"service": "kodbox"}}]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>(), json!({"status": "success"}));
    assert!(harness.prompts().is_empty());

    let messages = harness.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].title, "AI 运维诊断报告");
    assert!(messages[0].body.contains("恢复"));
    assert!(messages[0].body.contains("**监控业务**：kodbox"));
    assert!(messages[0].body.contains("**所在节点**：未知节点"));
}

#[tokio::test]
async fn test_firing_alert_without_log_directory_is_diagnosed() {
    let harness = Harness::new(false);

    let response = harness
        .server
        .post("/alert")
        .json(&json!({
            "status": "firing",
            "alerts": [{
                "status": "firing",
                "labels": {"service": "ai_assistant"},
                "annotations": {"summary": "CPU high"}
            }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);

    let prompts = harness.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(
        prompts[0],
        format!(
            "系统收到告警: CPU high\n故障描述: 暂无详细描述\n现场证据: {}\n请分析故障原因并给出修复建议。",
            DIRECTORY_NOT_FOUND
        )
    );

    let messages = harness.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].body.contains("故障诊断报告 (ai_assistant)"));
    assert!(messages[0].body.contains("**告警摘要**：CPU high"));
    assert!(messages[0].body.contains("pm.max_children"));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let harness = Harness::new(false);

    let response = harness.server.post("/alert").text("this is not json").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(harness.prompts().is_empty());
    assert!(harness.messages().is_empty());

    let response = harness.server.post("/alert").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Empty data");

    let response = harness.server.post("/alert").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Empty data");
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let harness = Harness::new(false);

    let response = harness
        .server
        .post("/alert")
        .json(&json!({"status": "firing", "alerts": []}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>(), json!({"status": "success"}));

    let response = harness
        .server
        .post("/webhook/alerts")
        .json(&json!({"status": "firing"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    assert!(harness.prompts().is_empty());
    assert!(harness.messages().is_empty());
}

#[tokio::test]
async fn test_failed_diagnosis_still_returns_success() {
    let harness = Harness::new(true);

    let response = harness
        .server
        .post("/alert")
        .json(&json!({
            "alerts": [
                {"status": "firing", "labels": {"service": "kodbox"}},
                {"status": "resolved", "labels": {"service": "kodbox", "instance": "web-1"}},
                {"labels": {"service": "ai_assistant"}}
            ]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>(), json!({"status": "success"}));

    // Both non-resolved alerts were attempted; only the recovery notice went out.
    assert_eq!(harness.prompts().len(), 2);
    let messages = harness.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].body.contains("**所在节点**：web-1"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let harness = Harness::new(false);

    harness
        .server
        .post("/alert")
        .json(&json!({"alerts": [{"status": "resolved"}]}))
        .await;

    let response = harness.server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let text = response.text();
    assert!(text.contains("triage_alerts_total"));
    assert!(text.contains("triage_notifications_total"));
}
