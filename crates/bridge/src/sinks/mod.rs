pub mod dingtalk;
pub mod stdout;

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;

pub use dingtalk::DingTalkSink;
pub use stdout::StdoutSink;

/// A chat message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub title: String,
    /// Markdown body.
    pub body: String,
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Delivery channel for notifications. A single attempt is made per call;
/// failures come back as [`crate::Error::NotificationDeliveryFailed`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> String;
    async fn send(&self, message: &NotificationMessage) -> Result<()>;
}
