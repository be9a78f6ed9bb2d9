//! Message rendering using Tera
//!
//! All chat-facing markdown is produced here so the dispatcher and sinks only
//! deal with plain values.

use serde::Serialize;
use tera::{Context, Tera};

use crate::sources::AlertRecord;
use crate::Result;

const RECOVERY: &str = "recovery.md";
const DIAGNOSIS_REPORT: &str = "diagnosis_report.md";
const ENVELOPE: &str = "envelope.md";

const RECOVERY_TEMPLATE: &str = "### ✅ 业务恢复通知\n\
**监控业务**：{{ service }}\n\
**所在节点**：{{ instance }}\n\n\
**当前状态**：服务已恢复正常运行。AI 诊断链路已自动挂起。";

const DIAGNOSIS_REPORT_TEMPLATE: &str = "### 🚨 故障诊断报告 ({{ service }})\n\n\
**告警摘要**：{{ summary }}\n\
**AI 分析建议**：\n\n\
{{ diagnosis }}";

const ENVELOPE_TEMPLATE: &str = "## 🚨 告警诊断已送达\n\n\
**分析结果：**\n\n\
{{ content }}\n\n";

#[derive(Serialize)]
struct RecoveryView<'a> {
    service: &'a str,
    instance: &'a str,
}

#[derive(Serialize)]
struct DiagnosisView<'a> {
    service: &'a str,
    summary: &'a str,
    diagnosis: &'a str,
}

#[derive(Serialize)]
struct EnvelopeView<'a> {
    content: &'a str,
}

#[derive(Debug, Clone)]
pub struct MessageTemplates {
    tera: Tera,
}

impl MessageTemplates {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (RECOVERY, RECOVERY_TEMPLATE),
            (DIAGNOSIS_REPORT, DIAGNOSIS_REPORT_TEMPLATE),
            (ENVELOPE, ENVELOPE_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    /// Recovery notice for a resolved alert.
    pub fn recovery(&self, alert: &AlertRecord) -> Result<String> {
        self.render(
            RECOVERY,
            &RecoveryView {
                service: &alert.service,
                instance: &alert.instance,
            },
        )
    }

    /// Report body for a firing alert that was diagnosed.
    pub fn diagnosis_report(&self, alert: &AlertRecord, diagnosis: &str) -> Result<String> {
        self.render(
            DIAGNOSIS_REPORT,
            &DiagnosisView {
                service: &alert.service,
                summary: &alert.summary,
                diagnosis,
            },
        )
    }

    /// Wrap a message body in the chat envelope text.
    pub fn envelope(&self, content: &str) -> Result<String> {
        self.render(ENVELOPE, &EnvelopeView { content })
    }

    fn render<T: Serialize>(&self, name: &str, view: &T) -> Result<String> {
        let context = Context::from_serialize(view)?;
        Ok(self.tera.render(name, &context)?)
    }
}
