//! Alert triage dispatcher
//!
//! Drives every alert of a webhook batch through its path:
//!
//! - resolved: recovery notice only, no log read and no diagnosis
//! - anything else: logs -> prompt -> diagnosis -> report
//!
//! Per-alert failures never abort the batch.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    agent::{build_diagnosis_prompt, DiagnosisProvider, SYSTEM_PROMPT},
    logs::{LogContextSource, DIRECTORY_NOT_FOUND},
    metrics::{ALERTS_TOTAL, DIAGNOSIS_FAILURES_TOTAL, NOTIFICATIONS_TOTAL},
    sinks::{NotificationMessage, Notifier},
    sources::{AlertBatch, AlertRecord},
    template::MessageTemplates,
};

pub const DEFAULT_TITLE: &str = "AI 运维诊断报告";

/// Terminal state of one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Resolved alert; `delivered` tells whether the notice reached the channel.
    RecoveryNotified { delivered: bool },
    /// Firing alert diagnosed and reported.
    Notified { delivered: bool },
    /// Firing alert dropped because no report could be produced.
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriageReport {
    pub outcomes: Vec<AlertOutcome>,
}

impl TriageReport {
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AlertOutcome::Skipped { .. }))
            .count()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    AlertOutcome::RecoveryNotified { delivered: true }
                        | AlertOutcome::Notified { delivered: true }
                )
            })
            .count()
    }
}

pub struct TriageDispatcher {
    logs: Arc<dyn LogContextSource>,
    diagnoser: Arc<dyn DiagnosisProvider>,
    notifier: Arc<dyn Notifier>,
    templates: MessageTemplates,
    title: String,
}

impl TriageDispatcher {
    pub fn new(
        logs: Arc<dyn LogContextSource>,
        diagnoser: Arc<dyn DiagnosisProvider>,
        notifier: Arc<dyn Notifier>,
        templates: MessageTemplates,
    ) -> Self {
        Self {
            logs,
            diagnoser,
            notifier,
            templates,
            title: DEFAULT_TITLE.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Process a batch strictly in arrival order, one alert at a time.
    pub async fn dispatch(&self, batch: AlertBatch) -> TriageReport {
        let mut report = TriageReport::default();

        for alert in &batch.alerts {
            let span = info_span!(
                "triage",
                triage_id = %Uuid::new_v4(),
                service = %alert.service,
                status = %alert.status
            );
            let outcome = self.triage(alert).instrument(span).await;
            report.outcomes.push(outcome);
        }

        report
    }

    pub async fn triage(&self, alert: &AlertRecord) -> AlertOutcome {
        if alert.status.is_resolved() {
            ALERTS_TOTAL.with_label_values(&["resolved"]).inc();
            info!("Service {} recovered, skipping AI diagnosis", alert.service);
            return self.notify_recovery(alert).await;
        }

        ALERTS_TOTAL.with_label_values(&["firing"]).inc();
        self.diagnose_and_report(alert).await
    }

    async fn notify_recovery(&self, alert: &AlertRecord) -> AlertOutcome {
        let delivered = match self.templates.recovery(alert) {
            Ok(body) => self.deliver(body).await,
            Err(e) => {
                warn!("Failed to render recovery notice: {}", e);
                false
            }
        };
        AlertOutcome::RecoveryNotified { delivered }
    }

    async fn diagnose_and_report(&self, alert: &AlertRecord) -> AlertOutcome {
        let evidence = self.gather_evidence(&alert.service).await;
        let prompt = build_diagnosis_prompt(&alert.summary, &alert.description, &evidence);

        let diagnosis = match self.diagnoser.diagnose(SYSTEM_PROMPT, &prompt).await {
            Ok(diagnosis) => diagnosis,
            Err(e) => {
                warn!("AI diagnosis failed: {}", e);
                DIAGNOSIS_FAILURES_TOTAL.inc();
                return AlertOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        match self.templates.diagnosis_report(alert, &diagnosis) {
            Ok(body) => AlertOutcome::Notified {
                delivered: self.deliver(body).await,
            },
            Err(e) => {
                warn!("Failed to render diagnosis report: {}", e);
                AlertOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    // A service without a readable log directory still gets diagnosed.
    async fn gather_evidence(&self, service: &str) -> String {
        match self.logs.collect(service).await {
            Ok(bundle) => bundle.render(),
            Err(e) => {
                info!("{}", e);
                DIRECTORY_NOT_FOUND.to_string()
            }
        }
    }

    async fn deliver(&self, body: String) -> bool {
        let message = NotificationMessage::new(self.title.clone(), body);
        match self.notifier.send(&message).await {
            Ok(()) => {
                NOTIFICATIONS_TOTAL.with_label_values(&["delivered"]).inc();
                true
            }
            Err(e) => {
                NOTIFICATIONS_TOTAL.with_label_values(&["failed"]).inc();
                warn!("Notification delivery failed: {}", e);
                false
            }
        }
    }
}
