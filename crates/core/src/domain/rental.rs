use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::account::{RentalParty, UserId};
use crate::domain::vehicle::VehicleId;
use crate::errors::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RentalId(pub String);

impl RentalId {
    pub fn generate() -> Self {
        Self(format!("rent-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    PendingPayment,
    AwaitApproval,
    Confirmed,
    OnTrip,
    Completed,
    Cancelled,
    Disputed,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::AwaitApproval => "await_approval",
            Self::Confirmed => "confirmed",
            Self::OnTrip => "on_trip",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending_payment" => Some(Self::PendingPayment),
            "await_approval" => Some(Self::AwaitApproval),
            "confirmed" => Some(Self::Confirmed),
            "on_trip" => Some(Self::OnTrip),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "disputed" => Some(Self::Disputed),
            _ => None,
        }
    }

    /// Statuses that keep the vehicle's calendar reserved. A block row must
    /// exist exactly while the rental is in one of these.
    pub fn holds_calendar(&self) -> bool {
        matches!(self, Self::PendingPayment | Self::AwaitApproval | Self::Confirmed | Self::OnTrip)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Aggregate root for one booking. Window and money fields are immutable
/// snapshots from creation time; only status, cancel_reason, and the
/// bookkeeping columns change afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub renter_id: UserId,
    pub owner_id: UserId,
    pub vehicle_id: VehicleId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_minutes: i64,
    pub duration_days: i64,
    pub price_per_day: Decimal,
    pub delivery_fee: Decimal,
    pub insurance_fee: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
    pub deposit_price: Decimal,
    pub platform_fee_ratio: Decimal,
    pub platform_fee: Decimal,
    pub owner_earning: Decimal,
    pub insurance_commission_ratio: Decimal,
    pub insurance_commission_amount: Decimal,
    pub insurance_payable_to_partner: Decimal,
    pub platform_earning: Decimal,
    pub delivery_address: Option<String>,
    pub status: RentalStatus,
    pub cancel_reason: Option<String>,
    pub status_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Rental {
    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!(
            (&self.status, next),
            (RentalStatus::PendingPayment, RentalStatus::AwaitApproval)
                | (RentalStatus::PendingPayment, RentalStatus::Cancelled)
                | (RentalStatus::AwaitApproval, RentalStatus::Confirmed)
                | (RentalStatus::AwaitApproval, RentalStatus::Cancelled)
                | (RentalStatus::Confirmed, RentalStatus::OnTrip)
                | (RentalStatus::Confirmed, RentalStatus::Cancelled)
                | (RentalStatus::OnTrip, RentalStatus::Completed)
                | (RentalStatus::OnTrip, RentalStatus::Cancelled)
                | (RentalStatus::Disputed, RentalStatus::Completed)
                | (RentalStatus::Disputed, RentalStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: RentalStatus) -> Result<(), EngineError> {
        if self.can_transition_to(next.clone()) {
            self.status = next;
            return Ok(());
        }

        Err(EngineError::InvalidTransition { from: self.status.clone(), to: next })
    }

    /// Dispute creation is the only path into `Disputed`, and only from a
    /// completed rental.
    pub fn mark_disputed(&mut self) -> Result<(), EngineError> {
        if self.status != RentalStatus::Completed {
            return Err(EngineError::InvalidState(format!(
                "disputes can only be opened on completed rentals (status is {})",
                self.status.as_str()
            )));
        }
        self.status = RentalStatus::Disputed;
        Ok(())
    }

    pub fn party_of(&self, user: &UserId) -> Option<RentalParty> {
        if self.renter_id == *user {
            Some(RentalParty::Renter)
        } else if self.owner_id == *user {
            Some(RentalParty::Owner)
        } else {
            None
        }
    }

    pub fn counterpart_of(&self, party: RentalParty) -> UserId {
        match party {
            RentalParty::Renter => self.owner_id.clone(),
            RentalParty::Owner => self.renter_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::account::{RentalParty, UserId};
    use crate::domain::vehicle::VehicleId;
    use crate::errors::EngineError;

    use super::{Rental, RentalId, RentalStatus};

    fn rental(status: RentalStatus) -> Rental {
        let now = Utc::now();
        Rental {
            id: RentalId("rent-1".to_string()),
            renter_id: UserId("usr-renter".to_string()),
            owner_id: UserId("usr-owner".to_string()),
            vehicle_id: VehicleId("veh-1".to_string()),
            start_date: "2026-03-10".parse().expect("date"),
            end_date: "2026-03-12".parse().expect("date"),
            duration_minutes: 4_320,
            duration_days: 3,
            price_per_day: Decimal::new(10_000, 2),
            delivery_fee: Decimal::new(2_000, 2),
            insurance_fee: Decimal::new(3_000, 2),
            discount_amount: Decimal::new(1_000, 2),
            total_price: Decimal::new(34_000, 2),
            deposit_price: Decimal::new(50_000, 2),
            platform_fee_ratio: Decimal::new(15, 2),
            platform_fee: Decimal::new(4_500, 2),
            owner_earning: Decimal::new(27_500, 2),
            insurance_commission_ratio: Decimal::new(20, 2),
            insurance_commission_amount: Decimal::new(600, 2),
            insurance_payable_to_partner: Decimal::new(2_400, 2),
            platform_earning: Decimal::new(4_100, 2),
            delivery_address: None,
            status,
            cancel_reason: None,
            status_version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        let cases = [
            RentalStatus::PendingPayment,
            RentalStatus::AwaitApproval,
            RentalStatus::Confirmed,
            RentalStatus::OnTrip,
            RentalStatus::Completed,
            RentalStatus::Cancelled,
            RentalStatus::Disputed,
        ];

        for status in cases {
            let decoded = RentalStatus::parse(status.as_str());
            assert_eq!(decoded, Some(status));
        }
    }

    #[test]
    fn allows_full_happy_path() {
        let mut rental = rental(RentalStatus::PendingPayment);
        rental.transition_to(RentalStatus::AwaitApproval).expect("pending -> await");
        rental.transition_to(RentalStatus::Confirmed).expect("await -> confirmed");
        rental.transition_to(RentalStatus::OnTrip).expect("confirmed -> on trip");
        rental.transition_to(RentalStatus::Completed).expect("on trip -> completed");
        assert_eq!(rental.status, RentalStatus::Completed);
    }

    #[test]
    fn blocks_skipping_approval() {
        let mut rental = rental(RentalStatus::PendingPayment);
        let error = rental
            .transition_to(RentalStatus::Confirmed)
            .expect_err("pending -> confirmed should fail");
        assert!(matches!(error, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_statuses_admit_no_transitions() {
        for terminal in [RentalStatus::Completed, RentalStatus::Cancelled] {
            let mut stuck = rental(terminal);
            for next in [
                RentalStatus::PendingPayment,
                RentalStatus::AwaitApproval,
                RentalStatus::Confirmed,
                RentalStatus::OnTrip,
                RentalStatus::Cancelled,
                RentalStatus::Disputed,
            ] {
                assert!(
                    stuck.transition_to(next).is_err(),
                    "no transition may leave {:?}",
                    stuck.status
                );
            }
        }
    }

    #[test]
    fn disputed_exits_only_to_completed_or_cancelled() {
        let mut disputed = rental(RentalStatus::Disputed);
        assert!(disputed.can_transition_to(RentalStatus::Completed));
        assert!(disputed.can_transition_to(RentalStatus::Cancelled));
        assert!(!disputed.can_transition_to(RentalStatus::OnTrip));
        assert!(!disputed.can_transition_to(RentalStatus::Confirmed));

        disputed.transition_to(RentalStatus::Completed).expect("disputed -> completed");
        assert_eq!(disputed.status, RentalStatus::Completed);
    }

    #[test]
    fn disputed_is_entered_only_through_mark_disputed() {
        let mut completed = rental(RentalStatus::Completed);
        assert!(!completed.can_transition_to(RentalStatus::Disputed));
        completed.mark_disputed().expect("completed -> disputed");
        assert_eq!(completed.status, RentalStatus::Disputed);

        let mut on_trip = rental(RentalStatus::OnTrip);
        let error = on_trip.mark_disputed().expect_err("on trip cannot be disputed");
        assert!(matches!(error, EngineError::InvalidState(_)));
    }

    #[test]
    fn calendar_held_exactly_while_active() {
        for status in [
            RentalStatus::PendingPayment,
            RentalStatus::AwaitApproval,
            RentalStatus::Confirmed,
            RentalStatus::OnTrip,
        ] {
            assert!(status.holds_calendar(), "{status:?} should hold the calendar");
        }
        for status in [RentalStatus::Completed, RentalStatus::Cancelled, RentalStatus::Disputed] {
            assert!(!status.holds_calendar(), "{status:?} should release the calendar");
        }
    }

    #[test]
    fn party_resolution_matches_ids() {
        let rental = rental(RentalStatus::Confirmed);
        assert_eq!(
            rental.party_of(&UserId("usr-renter".to_string())),
            Some(RentalParty::Renter)
        );
        assert_eq!(rental.party_of(&UserId("usr-owner".to_string())), Some(RentalParty::Owner));
        assert_eq!(rental.party_of(&UserId("usr-other".to_string())), None);
        assert_eq!(
            rental.counterpart_of(RentalParty::Renter),
            UserId("usr-owner".to_string())
        );
    }
}
