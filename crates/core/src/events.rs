use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::audit::AuditEntry;
use crate::domain::account::UserId;
use crate::domain::rental::RentalId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("side-effect delivery failed: {reason}")]
pub struct SideEffectError {
    pub reason: String,
}

impl SideEffectError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequested,
    BookingApproved,
    BookingCancelled,
    TripStarted,
    TripCompleted,
    DisputeOpened,
    DisputeUpdated,
    BookingUpdated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingRequested => "booking_requested",
            Self::BookingApproved => "booking_approved",
            Self::BookingCancelled => "booking_cancelled",
            Self::TripStarted => "trip_started",
            Self::TripCompleted => "trip_completed",
            Self::DisputeOpened => "dispute_opened",
            Self::DisputeUpdated => "dispute_updated",
            Self::BookingUpdated => "booking_updated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "booking_requested" => Some(Self::BookingRequested),
            "booking_approved" => Some(Self::BookingApproved),
            "booking_cancelled" => Some(Self::BookingCancelled),
            "trip_started" => Some(Self::TripStarted),
            "trip_completed" => Some(Self::TripCompleted),
            "dispute_opened" => Some(Self::DisputeOpened),
            "dispute_updated" => Some(Self::DisputeUpdated),
            "booking_updated" => Some(Self::BookingUpdated),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Value,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { user_id, kind, title: title.into(), message: message.into(), data: Value::Null }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Work a state-mutating operation wants done after its transaction has
/// committed. Delivery is best effort: the dispatcher logs failures and
/// moves on, it never rolls back the primary result.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundEvent {
    Audit(AuditEntry),
    Notify(Notification),
    OpenChatThread { rental_id: RentalId, renter_id: UserId, owner_id: UserId },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), SideEffectError>;
}

#[async_trait]
pub trait ChatBootstrap: Send + Sync {
    /// Opens the renter/owner conversation for a rental. Idempotent on the
    /// rental id.
    async fn open_thread(
        &self,
        rental_id: &RentalId,
        renter_id: &UserId,
        owner_id: &UserId,
    ) -> Result<(), SideEffectError>;
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<(), SideEffectError> {
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChatBootstrap {
    threads: Arc<Mutex<Vec<(RentalId, UserId, UserId)>>>,
}

impl InMemoryChatBootstrap {
    pub fn threads(&self) -> Vec<(RentalId, UserId, UserId)> {
        match self.threads.lock() {
            Ok(threads) => threads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ChatBootstrap for InMemoryChatBootstrap {
    async fn open_thread(
        &self,
        rental_id: &RentalId,
        renter_id: &UserId,
        owner_id: &UserId,
    ) -> Result<(), SideEffectError> {
        let mut threads = match self.threads.lock() {
            Ok(threads) => threads,
            Err(poisoned) => poisoned.into_inner(),
        };
        if threads.iter().any(|(existing, _, _)| existing == rental_id) {
            return Ok(());
        }
        threads.push((rental_id.clone(), renter_id.clone(), owner_id.clone()));
        Ok(())
    }
}
