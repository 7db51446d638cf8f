//! SQL-backed destinations for the side effects a lifecycle operation emits.
//! These implement the sink traits from `wheelbase_core` so the dispatcher
//! stays storage-agnostic.

use wheelbase_core::audit::{AuditEntry, AuditSink};
use wheelbase_core::domain::account::UserId;
use wheelbase_core::domain::rental::RentalId;
use wheelbase_core::events::{ChatBootstrap, Notification, NotificationSink, SideEffectError};

use crate::DbPool;

pub struct SqlAuditLog {
    pool: DbPool,
}

impl SqlAuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditSink for SqlAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), SideEffectError> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|error| SideEffectError::new(error.to_string()))?;

        sqlx::query(
            "INSERT INTO audit_log
                 (id, actor_id, action, target_type, target_id, metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.actor_id.0)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(metadata)
        .bind(entry.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| SideEffectError::new(error.to_string()))?;

        Ok(())
    }
}

pub struct SqlNotificationSink {
    pool: DbPool,
}

impl SqlNotificationSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationSink for SqlNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<(), SideEffectError> {
        let data = serde_json::to_string(&notification.data)
            .map_err(|error| SideEffectError::new(error.to_string()))?;

        sqlx::query(
            "INSERT INTO notification
                 (id, user_id, kind, title, message, data_json, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(format!("ntf-{}", uuid::Uuid::new_v4()))
        .bind(&notification.user_id.0)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(data)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| SideEffectError::new(error.to_string()))?;

        Ok(())
    }
}

pub struct SqlChatBootstrap {
    pool: DbPool,
}

impl SqlChatBootstrap {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatBootstrap for SqlChatBootstrap {
    async fn open_thread(
        &self,
        rental_id: &RentalId,
        renter_id: &UserId,
        owner_id: &UserId,
    ) -> Result<(), SideEffectError> {
        sqlx::query(
            "INSERT INTO chat_thread (id, rental_id, renter_id, owner_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (rental_id) DO NOTHING",
        )
        .bind(format!("thread-{}", uuid::Uuid::new_v4()))
        .bind(&rental_id.0)
        .bind(&renter_id.0)
        .bind(&owner_id.0)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| SideEffectError::new(error.to_string()))?;

        Ok(())
    }
}
