//! Notification service implementation
//!
//! Rule engines hand finished notices to a `Notifier` after their state change
//! is stored. The outbox notifier persists them as the user's in-app feed; the
//! dispatcher later pushes undelivered rows to the push gateway with its own
//! retry policy.

use std::sync::Arc;
use async_trait::async_trait;
use tracing::{debug, info, warn};
use crate::database::EventStore;
use crate::models::{Notice, Notification};
use crate::services::clock::Clock;
use crate::services::push::PushClient;
use crate::utils::errors::Result;
use crate::utils::retry::{with_retry, RetryPolicy};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: Notice) -> Result<()>;
}

/// Fire-and-forget delivery: a failing notifier never fails the caller
pub async fn notify_quietly(notifier: &dyn Notifier, notice: Notice) {
    let user_id = notice.user_id;
    let event_id = notice.event_id;
    let kind = notice.kind;
    if let Err(e) = notifier.notify(notice).await {
        warn!(
            user_id = user_id,
            event_id = event_id,
            kind = kind.as_str(),
            error = %e,
            "Failed to enqueue notification"
        );
    }
}

/// Writes notices into the store's notification table
#[derive(Clone)]
pub struct OutboxNotifier {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl OutboxNotifier {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(&self, notice: Notice) -> Result<()> {
        let notification = self.store.enqueue_notification(notice, self.clock.now()).await?;
        debug!(
            notification_id = notification.id,
            user_id = notification.user_id,
            kind = notification.kind.as_str(),
            "Notification queued"
        );
        Ok(())
    }
}

/// Result of one outbox drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Pushes undelivered outbox rows to the gateway
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn EventStore>,
    push: PushClient,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    batch_size: i64,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn EventStore>,
        push: PushClient,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            push,
            clock,
            policy,
            batch_size,
        }
    }

    /// Deliver one batch of pending notifications
    pub async fn dispatch_pending(&self) -> Result<DeliveryReport> {
        let pending = self.store.list_undelivered_notifications(self.batch_size).await?;
        let mut report = DeliveryReport {
            attempted: pending.len(),
            ..DeliveryReport::default()
        };

        for notification in pending {
            match self.deliver(&notification).await {
                Ok(()) => {
                    self.store.mark_notification_delivered(notification.id, self.clock.now()).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        notification_id = notification.id,
                        user_id = notification.user_id,
                        attempts = notification.attempts + 1,
                        error = %e,
                        "Notification delivery failed"
                    );
                    self.store.record_delivery_failure(notification.id).await?;
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                "Notification outbox drained"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        with_retry(self.policy, "push_notification", || self.push.send(notification)).await
    }
}
