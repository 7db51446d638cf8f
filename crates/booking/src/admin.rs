use chrono::Utc;
use serde_json::json;

use wheelbase_core::audit::AuditEntry;
use wheelbase_core::domain::account::AccountRecord;
use wheelbase_core::domain::dispute::{Dispute, DisputeId, DisputeStatus};
use wheelbase_core::domain::rental::{Rental, RentalId, RentalStatus};
use wheelbase_core::errors::EngineError;
use wheelbase_core::events::{Notification, NotificationKind, OutboundEvent};

use wheelbase_db::stores::RentalFilter;

use crate::service::{block_maintenance_for, status_change_events, BookingStores, RentalDetail};

/// One page of the admin rental listing.
#[derive(Clone, Debug)]
pub struct AdminRentalPage {
    pub rentals: Vec<Rental>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Support-desk operations. Every entry point checks the actor's role; the
/// data access itself is unscoped.
pub struct AdminService {
    stores: BookingStores,
}

impl AdminService {
    pub fn new(stores: BookingStores) -> Self {
        Self { stores }
    }

    pub async fn list_rentals(
        &self,
        actor: &AccountRecord,
        filter: RentalFilter,
    ) -> Result<AdminRentalPage, EngineError> {
        require_staff(actor)?;
        let rentals = self.stores.rentals.list_admin(&filter).await?;
        let total = self.stores.rentals.count_admin(&filter).await?;
        Ok(AdminRentalPage { rentals, total, page: filter.page, per_page: filter.per_page })
    }

    pub async fn rental_detail(
        &self,
        actor: &AccountRecord,
        id: &RentalId,
    ) -> Result<RentalDetail, EngineError> {
        require_staff(actor)?;
        let rental = self.find_rental(id).await?;
        let evidence = self.stores.evidence.list_for_rental(id).await?;
        let dispute = self.stores.disputes.find_by_rental(id).await?;
        Ok(RentalDetail { rental, evidence, dispute })
    }

    /// Staff status override. Follows the same transition table as the
    /// parties, with one extra rule: a disputed rental can only complete
    /// once its dispute carries a resolution.
    pub async fn update_rental_status(
        &self,
        actor: &AccountRecord,
        id: &RentalId,
        next: RentalStatus,
        cancel_reason: Option<String>,
    ) -> Result<(Rental, Vec<OutboundEvent>), EngineError> {
        require_staff(actor)?;
        let rental = self.find_rental(id).await?;

        if rental.status == RentalStatus::Disputed && next == RentalStatus::Completed {
            let resolved = self
                .stores
                .disputes
                .find_by_rental(id)
                .await?
                .map(|dispute| dispute.status.is_resolved())
                .unwrap_or(false);
            if !resolved {
                return Err(EngineError::InvalidState(
                    "the dispute must be resolved before completing the rental".to_string(),
                ));
            }
        }

        let previous = rental.status.clone();
        let mut updated = rental;
        updated.transition_to(next)?;
        if updated.status == RentalStatus::Cancelled {
            if let Some(reason) = cancel_reason.filter(|reason| !reason.trim().is_empty()) {
                updated.cancel_reason = Some(reason);
            }
        }
        updated.updated_at = Utc::now();

        let maintenance = block_maintenance_for(&updated)?;
        let swapped =
            self.stores.rentals.transition_status(&updated, &previous, maintenance).await?;
        if !swapped {
            return Err(EngineError::InvalidState(
                "the rental changed concurrently; reload and retry".to_string(),
            ));
        }

        let fresh = self.find_rental(id).await?;
        let recipients = [fresh.renter_id.clone(), fresh.owner_id.clone()];
        let events = status_change_events(actor, &fresh, &previous, &recipients);
        Ok((fresh, events))
    }

    /// Records a review decision on a dispute and tells both parties.
    pub async fn update_dispute(
        &self,
        actor: &AccountRecord,
        id: &DisputeId,
        status: DisputeStatus,
        admin_notes: Option<String>,
    ) -> Result<(Dispute, Vec<OutboundEvent>), EngineError> {
        require_staff(actor)?;
        let mut dispute = self
            .stores
            .disputes
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("dispute", id.0.clone()))?;

        dispute.apply_review(status, admin_notes, &actor.id, Utc::now());
        self.stores.disputes.save(&dispute).await?;

        let rental = self.find_rental(&dispute.rental_id).await?;
        let mut events = vec![OutboundEvent::Audit(
            AuditEntry::new(actor.id.clone(), "dispute.reviewed", "dispute", dispute.id.0.clone())
                .with_metadata("rental_id", dispute.rental_id.0.clone())
                .with_metadata("status", dispute.status.as_str()),
        )];
        for recipient in [rental.renter_id.clone(), rental.owner_id.clone()] {
            events.push(OutboundEvent::Notify(
                Notification::new(
                    recipient,
                    NotificationKind::DisputeUpdated,
                    "Dispute updated",
                    format!(
                        "The dispute on rental {} is now {}",
                        rental.id.0,
                        dispute.status.as_str()
                    ),
                )
                .with_data(json!({
                    "rental_id": rental.id.0,
                    "dispute_id": dispute.id.0,
                    "status": dispute.status.as_str(),
                })),
            ));
        }
        Ok((dispute, events))
    }

    async fn find_rental(&self, id: &RentalId) -> Result<Rental, EngineError> {
        self.stores
            .rentals
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("rental", id.0.clone()))
    }
}

fn require_staff(actor: &AccountRecord) -> Result<(), EngineError> {
    if actor.role.is_staff() {
        Ok(())
    } else {
        Err(EngineError::forbidden("staff access required"))
    }
}
