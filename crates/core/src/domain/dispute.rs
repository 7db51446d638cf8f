use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::account::UserId;
use crate::domain::rental::RentalId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisputeId(pub String);

impl DisputeId {
    pub fn generate() -> Self {
        Self(format!("dsp-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    ResolvedRefund,
    ResolvedNoRefund,
    Cancelled,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::UnderReview => "under_review",
            Self::ResolvedRefund => "resolved_refund",
            Self::ResolvedNoRefund => "resolved_no_refund",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "under_review" => Some(Self::UnderReview),
            "resolved_refund" => Some(Self::ResolvedRefund),
            "resolved_no_refund" => Some(Self::ResolvedNoRefund),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// A disputed rental may only close as completed once its dispute has
    /// reached one of these.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::ResolvedRefund | Self::ResolvedNoRefund)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResolvedRefund | Self::ResolvedNoRefund | Self::Cancelled)
    }
}

/// At most one dispute exists per rental, opened by one of the parties after
/// the trip completed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub rental_id: RentalId,
    pub opened_by: UserId,
    pub reason: String,
    pub description: Option<String>,
    pub status: DisputeStatus,
    pub admin_notes: Option<String>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    pub fn open(
        rental_id: RentalId,
        opened_by: UserId,
        reason: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DisputeId::generate(),
            rental_id,
            opened_by,
            reason: reason.into(),
            description,
            status: DisputeStatus::Open,
            admin_notes: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an admin decision. Terminal statuses stamp the resolver;
    /// moving back to an open status clears the stamp.
    pub fn apply_review(
        &mut self,
        status: DisputeStatus,
        admin_notes: Option<String>,
        reviewer: &UserId,
        at: DateTime<Utc>,
    ) {
        if status.is_terminal() {
            self.resolved_by = Some(reviewer.clone());
            self.resolved_at = Some(at);
        } else {
            self.resolved_by = None;
            self.resolved_at = None;
        }
        self.status = status;
        if let Some(notes) = admin_notes {
            self.admin_notes = Some(notes);
        }
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::account::UserId;
    use crate::domain::rental::RentalId;

    use super::{Dispute, DisputeStatus};

    fn dispute() -> Dispute {
        Dispute::open(
            RentalId("rent-1".to_string()),
            UserId("usr-renter".to_string()),
            "vehicle returned damaged",
            None,
        )
    }

    #[test]
    fn resolution_stamps_reviewer_and_time() {
        let mut dispute = dispute();
        let admin = UserId("usr-admin".to_string());
        let now = Utc::now();

        dispute.apply_review(
            DisputeStatus::ResolvedRefund,
            Some("refund approved".to_string()),
            &admin,
            now,
        );

        assert_eq!(dispute.status, DisputeStatus::ResolvedRefund);
        assert_eq!(dispute.resolved_by, Some(admin));
        assert_eq!(dispute.resolved_at, Some(now));
        assert_eq!(dispute.admin_notes.as_deref(), Some("refund approved"));
        assert!(dispute.status.is_resolved());
    }

    #[test]
    fn reopening_clears_resolution_stamp() {
        let mut dispute = dispute();
        let admin = UserId("usr-admin".to_string());
        let now = Utc::now();

        dispute.apply_review(DisputeStatus::ResolvedNoRefund, None, &admin, now);
        dispute.apply_review(DisputeStatus::UnderReview, None, &admin, now);

        assert_eq!(dispute.status, DisputeStatus::UnderReview);
        assert_eq!(dispute.resolved_by, None);
        assert_eq!(dispute.resolved_at, None);
        assert!(!dispute.status.is_resolved());
    }

    #[test]
    fn cancelled_is_terminal_but_not_resolved() {
        assert!(DisputeStatus::Cancelled.is_terminal());
        assert!(!DisputeStatus::Cancelled.is_resolved());
    }
}
