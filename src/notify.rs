//! Outbound notifications: the operator alert and the customer follow-up.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::order::{NotificationHandle, OperatorNotification};

/// Delivery of messages outside the customer's own conversation
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post the order to an operator; the handle allows retracting it later
    async fn notify_operator(&self, notification: &OperatorNotification)
        -> Result<NotificationHandle>;

    async fn send_follow_up(&self, user_id: i64, text: String) -> Result<()>;
}

/// Send a follow-up after `delay` without waiting for it
///
/// Failures are logged and dropped.
pub fn schedule_follow_up(
    notifier: Arc<dyn Notifier>,
    user_id: i64,
    text: String,
    delay: Duration,
) -> JoinHandle<()> {
    debug!(user_id, delay_secs = delay.as_secs(), "Scheduling follow-up message");
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = notifier.send_follow_up(user_id, text).await {
            error!(user_id, error = %e, "Failed to send follow-up message");
        }
    })
}
