use std::sync::Arc;

use wheelbase_core::audit::AuditSink;
use wheelbase_core::events::{ChatBootstrap, NotificationSink, OutboundEvent};

use wheelbase_db::{DbPool, SqlAuditLog, SqlChatBootstrap, SqlNotificationSink};

/// Drains the events a service call returned, after its transaction has
/// committed. A failing sink is logged and skipped; the booking it belongs
/// to is already durable and must not be disturbed.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
    chat: Arc<dyn ChatBootstrap>,
}

impl SideEffectDispatcher {
    pub fn new(
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
        chat: Arc<dyn ChatBootstrap>,
    ) -> Self {
        Self { audit, notifications, chat }
    }

    /// Wires every sink to the same sqlite pool.
    pub fn sqlite(pool: &DbPool) -> Self {
        Self::new(
            Arc::new(SqlAuditLog::new(pool.clone())),
            Arc::new(SqlNotificationSink::new(pool.clone())),
            Arc::new(SqlChatBootstrap::new(pool.clone())),
        )
    }

    pub async fn dispatch(&self, events: Vec<OutboundEvent>) {
        for event in events {
            let label = match &event {
                OutboundEvent::Audit(_) => "audit",
                OutboundEvent::Notify(_) => "notify",
                OutboundEvent::OpenChatThread { .. } => "chat_thread",
            };
            let result = match event {
                OutboundEvent::Audit(entry) => self.audit.record(entry).await,
                OutboundEvent::Notify(notification) => {
                    self.notifications.deliver(notification).await
                }
                OutboundEvent::OpenChatThread { rental_id, renter_id, owner_id } => {
                    self.chat.open_thread(&rental_id, &renter_id, &owner_id).await
                }
            };
            if let Err(error) = result {
                tracing::warn!(
                    event = label,
                    reason = %error.reason,
                    "side effect delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wheelbase_core::audit::{AuditEntry, InMemoryAuditSink};
    use wheelbase_core::domain::account::UserId;
    use wheelbase_core::domain::rental::RentalId;
    use wheelbase_core::events::{
        InMemoryChatBootstrap, InMemoryNotificationSink, Notification, NotificationKind,
        NotificationSink, OutboundEvent, SideEffectError,
    };

    use super::SideEffectDispatcher;

    struct UnreachableSink;

    #[async_trait::async_trait]
    impl NotificationSink for UnreachableSink {
        async fn deliver(&self, _notification: Notification) -> Result<(), SideEffectError> {
            Err(SideEffectError::new("sink offline"))
        }
    }

    fn sample_events() -> Vec<OutboundEvent> {
        vec![
            OutboundEvent::Audit(AuditEntry::new(
                UserId("usr-renter".to_string()),
                "rental.created",
                "rental",
                "rent-1".to_string(),
            )),
            OutboundEvent::Notify(Notification::new(
                UserId("usr-owner".to_string()),
                NotificationKind::BookingRequested,
                "New booking request",
                "Riley requested your vehicle",
            )),
            OutboundEvent::OpenChatThread {
                rental_id: RentalId("rent-1".to_string()),
                renter_id: UserId("usr-renter".to_string()),
                owner_id: UserId("usr-owner".to_string()),
            },
        ]
    }

    #[tokio::test]
    async fn delivers_every_event_kind() {
        let audit = InMemoryAuditSink::default();
        let notifications = InMemoryNotificationSink::default();
        let chat = InMemoryChatBootstrap::default();
        let dispatcher = SideEffectDispatcher::new(
            Arc::new(audit.clone()),
            Arc::new(notifications.clone()),
            Arc::new(chat.clone()),
        );

        dispatcher.dispatch(sample_events()).await;

        assert_eq!(audit.entries().len(), 1);
        assert_eq!(audit.entries()[0].action, "rental.created");
        assert_eq!(notifications.delivered().len(), 1);
        assert_eq!(chat.threads().len(), 1);
        assert_eq!(chat.threads()[0].0 .0, "rent-1");
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_the_rest() {
        let audit = InMemoryAuditSink::default();
        let chat = InMemoryChatBootstrap::default();
        let dispatcher = SideEffectDispatcher::new(
            Arc::new(audit.clone()),
            Arc::new(UnreachableSink),
            Arc::new(chat.clone()),
        );

        dispatcher.dispatch(sample_events()).await;

        assert_eq!(audit.entries().len(), 1);
        assert_eq!(chat.threads().len(), 1, "events after the failure still run");
    }
}
