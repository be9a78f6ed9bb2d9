pub mod webhook;

pub use webhook::{AlertBatch, AlertManagerAlert, AlertManagerWebhook, AlertRecord, AlertStatus};
