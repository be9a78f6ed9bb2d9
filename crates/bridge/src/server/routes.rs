use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    metrics::gather_metrics, sources::AlertManagerWebhook, triage::TriageDispatcher, Error,
};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!("Error gathering metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn alert_webhook(
    State(dispatcher): State<Arc<TriageDispatcher>>,
    body: Bytes,
) -> Response {
    let payload = match AlertManagerWebhook::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejected webhook: {}", e);
            let message = match e {
                Error::InvalidPayload(message) => message,
                other => other.to_string(),
            };
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };

    info!(
        "Received webhook, receiver: {}, status: {}, alerts: {}",
        payload.receiver.as_deref().unwrap_or("unknown"),
        payload.status.as_deref().unwrap_or("unknown"),
        payload.alerts.len()
    );

    let report = dispatcher.dispatch(payload.into_batch()).await;
    info!(
        "Webhook processed: {} alerts, {} notifications delivered, {} skipped",
        report.outcomes.len(),
        report.delivered(),
        report.skipped()
    );

    (StatusCode::OK, Json(json!({ "status": "success" }))).into_response()
}
