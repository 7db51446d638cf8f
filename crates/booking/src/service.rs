use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use wheelbase_core::audit::AuditEntry;
use wheelbase_core::availability::BookingWindow;
use wheelbase_core::domain::account::{AccountRecord, RentalParty, UserId};
use wheelbase_core::domain::block::UnavailabilityBlock;
use wheelbase_core::domain::dispute::Dispute;
use wheelbase_core::domain::evidence::{Evidence, EvidenceId, EvidenceKind};
use wheelbase_core::domain::rental::{Rental, RentalId, RentalStatus};
use wheelbase_core::domain::vehicle::{Vehicle, VehicleId};
use wheelbase_core::errors::EngineError;
use wheelbase_core::events::{Notification, NotificationKind, OutboundEvent};
use wheelbase_core::pricing::{self, FeePolicy, PricingInputs};

use wheelbase_db::stores::{
    AccountDirectory, BlockMaintenance, BlockStore, DisputeOpenOutcome, DisputeStore,
    EvidenceStore, FeeSettingsStore, InsertOutcome, RentalStore, VehicleCatalog,
};
use wheelbase_db::{
    DbPool, SqlAccountDirectory, SqlBlockStore, SqlDisputeStore, SqlEvidenceStore,
    SqlFeeSettingsStore, SqlRentalStore, SqlVehicleCatalog,
};

/// The stores a lifecycle service works against. Held as trait objects so
/// tests can swap single stores out.
#[derive(Clone)]
pub struct BookingStores {
    pub rentals: Arc<dyn RentalStore>,
    pub blocks: Arc<dyn BlockStore>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub disputes: Arc<dyn DisputeStore>,
    pub vehicles: Arc<dyn VehicleCatalog>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub fees: Arc<dyn FeeSettingsStore>,
}

impl BookingStores {
    /// Wires every store to the same sqlite pool.
    pub fn sqlite(pool: &DbPool) -> Self {
        Self {
            rentals: Arc::new(SqlRentalStore::new(pool.clone())),
            blocks: Arc::new(SqlBlockStore::new(pool.clone())),
            evidence: Arc::new(SqlEvidenceStore::new(pool.clone())),
            disputes: Arc::new(SqlDisputeStore::new(pool.clone())),
            vehicles: Arc::new(SqlVehicleCatalog::new(pool.clone())),
            accounts: Arc::new(SqlAccountDirectory::new(pool.clone())),
            fees: Arc::new(SqlFeeSettingsStore::new(pool.clone())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CreateRentalRequest {
    pub vehicle_id: VehicleId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub delivery_fee: Decimal,
    pub insurance_fee: Decimal,
    pub discount_amount: Decimal,
    pub delivery_address: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewEvidence {
    pub kind: EvidenceKind,
    pub url: String,
    pub note: Option<String>,
    /// Explicit slot in the rental's evidence ordering; appended after the
    /// current maximum when absent.
    pub order: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct RentalDetail {
    pub rental: Rental,
    pub evidence: Vec<Evidence>,
    pub dispute: Option<Dispute>,
}

/// Member-facing lifecycle operations. Each mutating call persists its
/// primary effect transactionally and returns the side effects for the
/// dispatcher to drain after commit.
pub struct BookingService {
    stores: BookingStores,
    default_fees: FeePolicy,
}

impl BookingService {
    pub fn new(stores: BookingStores, default_fees: FeePolicy) -> Self {
        Self { stores, default_fees }
    }

    pub async fn create_rental(
        &self,
        actor: &AccountRecord,
        request: CreateRentalRequest,
    ) -> Result<(Rental, Vec<OutboundEvent>), EngineError> {
        let window = BookingWindow::new(request.start_date, request.end_date)?;
        if window.starts_before(Utc::now().date_naive()) {
            return Err(EngineError::Validation(
                "start_date must not be in the past".to_string(),
            ));
        }
        if request.delivery_fee < Decimal::ZERO
            || request.insurance_fee < Decimal::ZERO
            || request.discount_amount < Decimal::ZERO
        {
            return Err(EngineError::Validation(
                "fees and discounts must not be negative".to_string(),
            ));
        }

        let vehicle = self
            .stores
            .vehicles
            .find(&request.vehicle_id)
            .await?
            .ok_or_else(|| EngineError::not_found("vehicle", request.vehicle_id.0.clone()))?;
        if !vehicle.is_bookable() {
            return Err(EngineError::Unavailable("vehicle is not open for booking".to_string()));
        }
        if vehicle.owner_id == actor.id {
            return Err(EngineError::Validation("you cannot rent your own vehicle".to_string()));
        }

        let owner = self
            .stores
            .accounts
            .find(&vehicle.owner_id)
            .await?
            .ok_or_else(|| EngineError::not_found("account", vehicle.owner_id.0.clone()))?;
        if !owner.is_active {
            return Err(EngineError::Validation(
                "the vehicle's owner account is inactive".to_string(),
            ));
        }

        let policy = self.stores.fees.latest_active().await?.unwrap_or(self.default_fees);
        let rental = build_rental(&vehicle, actor, &window, &request, &policy);
        let block = UnavailabilityBlock::reserved(
            vehicle.id.clone(),
            rental.id.clone(),
            &window,
        );

        match self.stores.rentals.insert_booked(&rental, &block).await? {
            InsertOutcome::Inserted => {}
            InsertOutcome::WindowConflict => {
                return Err(EngineError::Unavailable(
                    "vehicle is already reserved for the requested dates".to_string(),
                ));
            }
        }

        let events = vec![
            OutboundEvent::Audit(
                AuditEntry::new(actor.id.clone(), "rental.created", "rental", rental.id.0.clone())
                    .with_metadata("vehicle_id", vehicle.id.0.clone())
                    .with_metadata("start_date", rental.start_date.to_string())
                    .with_metadata("end_date", rental.end_date.to_string())
                    .with_metadata("total_price", rental.total_price.to_string()),
            ),
            OutboundEvent::Notify(
                Notification::new(
                    rental.owner_id.clone(),
                    NotificationKind::BookingRequested,
                    "New booking request",
                    format!(
                        "{} requested your vehicle for {} to {}",
                        actor.display_name, rental.start_date, rental.end_date
                    ),
                )
                .with_data(json!({ "rental_id": rental.id.0 })),
            ),
            OutboundEvent::OpenChatThread {
                rental_id: rental.id.clone(),
                renter_id: rental.renter_id.clone(),
                owner_id: rental.owner_id.clone(),
            },
        ];

        Ok((rental, events))
    }

    /// Party-requested status change. The transition table is enforced on a
    /// copy, then compare-and-swapped against the stored status so a
    /// concurrent change loses cleanly.
    pub async fn update_status(
        &self,
        actor: &AccountRecord,
        id: &RentalId,
        next: RentalStatus,
        cancel_reason: Option<String>,
    ) -> Result<(Rental, Vec<OutboundEvent>), EngineError> {
        let rental = self.find_rental(id).await?;
        let party = rental
            .party_of(&actor.id)
            .ok_or_else(|| EngineError::forbidden("only the renter or owner may update this rental"))?;

        if rental.status == RentalStatus::Disputed {
            return Err(EngineError::forbidden("disputed rentals are resolved by support"));
        }
        if next == RentalStatus::Confirmed
            && rental.status == RentalStatus::AwaitApproval
            && party != RentalParty::Owner
        {
            return Err(EngineError::forbidden("only the owner may approve a booking request"));
        }

        let reason = if next == RentalStatus::Cancelled {
            let reason = cancel_reason
                .filter(|reason| !reason.trim().is_empty())
                .ok_or_else(|| {
                    EngineError::Validation("cancel_reason is required when cancelling".to_string())
                })?;
            Some(reason)
        } else {
            None
        };

        let previous = rental.status.clone();
        let mut updated = rental.clone();
        updated.transition_to(next)?;
        if let Some(reason) = reason {
            updated.cancel_reason = Some(reason);
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
        let counterpart = fresh.counterpart_of(party);
        let events = status_change_events(actor, &fresh, &previous, &[counterpart]);
        Ok((fresh, events))
    }

    /// Appends one or more evidence records. Pickup-condition kinds are
    /// restricted to the renter.
    pub async fn upload_evidence(
        &self,
        actor: &AccountRecord,
        rental_id: &RentalId,
        items: Vec<NewEvidence>,
    ) -> Result<(Vec<Evidence>, Vec<OutboundEvent>), EngineError> {
        if items.is_empty() {
            return Err(EngineError::Validation(
                "at least one evidence item is required".to_string(),
            ));
        }

        let rental = self.find_rental(rental_id).await?;
        let party = rental
            .party_of(&actor.id)
            .ok_or_else(|| EngineError::forbidden("only the renter or owner may attach evidence"))?;

        let mut next_position = self
            .stores
            .evidence
            .max_position(rental_id)
            .await?
            .map_or(1, |position| position + 1);

        let now = Utc::now();
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            if item.kind.is_pickup() && party != RentalParty::Renter {
                return Err(EngineError::forbidden(
                    "pickup evidence can only be filed by the renter",
                ));
            }
            if item.url.trim().is_empty() {
                return Err(EngineError::Validation("evidence url must not be empty".to_string()));
            }

            let position = match item.order {
                Some(order) => order,
                None => {
                    let position = next_position;
                    next_position += 1;
                    position
                }
            };
            records.push(Evidence {
                id: EvidenceId::generate(),
                rental_id: rental_id.clone(),
                kind: item.kind,
                url: item.url,
                note: item.note,
                position,
                created_by: actor.id.clone(),
                created_at: now,
            });
        }

        self.stores.evidence.insert_many(&records).await?;
        self.stores.rentals.touch(rental_id).await?;

        let events = vec![OutboundEvent::Audit(
            AuditEntry::new(actor.id.clone(), "rental.evidence_added", "rental", rental_id.0.clone())
                .with_metadata("count", records.len().to_string()),
        )];
        Ok((records, events))
    }

    /// Opens the rental's single dispute and force-moves it to `Disputed`.
    pub async fn create_dispute(
        &self,
        actor: &AccountRecord,
        rental_id: &RentalId,
        reason: String,
        description: Option<String>,
    ) -> Result<(Dispute, Vec<OutboundEvent>), EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation("dispute reason must not be empty".to_string()));
        }

        let rental = self.find_rental(rental_id).await?;
        let party = rental
            .party_of(&actor.id)
            .ok_or_else(|| EngineError::forbidden("only the renter or owner may open a dispute"))?;

        // Surfaces the only-from-Completed rule before touching storage.
        rental.clone().mark_disputed()?;

        let dispute = Dispute::open(rental_id.clone(), actor.id.clone(), reason, description);
        match self.stores.disputes.open(&dispute, &rental).await? {
            DisputeOpenOutcome::Opened => {}
            DisputeOpenOutcome::AlreadyExists => {
                return Err(EngineError::InvalidState(
                    "a dispute already exists for this rental".to_string(),
                ));
            }
            DisputeOpenOutcome::StaleRental => {
                return Err(EngineError::InvalidState(
                    "the rental changed concurrently; reload and retry".to_string(),
                ));
            }
        }

        let counterpart = rental.counterpart_of(party);
        let events = vec![
            OutboundEvent::Audit(
                AuditEntry::new(actor.id.clone(), "dispute.opened", "dispute", dispute.id.0.clone())
                    .with_metadata("rental_id", rental_id.0.clone())
                    .with_metadata("reason", dispute.reason.clone()),
            ),
            OutboundEvent::Notify(
                Notification::new(
                    counterpart,
                    NotificationKind::DisputeOpened,
                    "Dispute opened",
                    format!("{} opened a dispute on rental {}", actor.display_name, rental_id.0),
                )
                .with_data(json!({ "rental_id": rental_id.0, "dispute_id": dispute.id.0 })),
            ),
        ];
        Ok((dispute, events))
    }

    pub async fn list_rentals(
        &self,
        actor: &AccountRecord,
        party: RentalParty,
        status: Option<RentalStatus>,
    ) -> Result<Vec<Rental>, EngineError> {
        let rentals =
            self.stores.rentals.list_for_party(&actor.id, party, status.as_ref()).await?;
        Ok(rentals)
    }

    pub async fn rental_detail(
        &self,
        actor: &AccountRecord,
        id: &RentalId,
    ) -> Result<RentalDetail, EngineError> {
        let rental = self.find_rental(id).await?;
        if rental.party_of(&actor.id).is_none() {
            return Err(EngineError::forbidden("only the renter or owner may view this rental"));
        }

        let evidence = self.stores.evidence.list_for_rental(id).await?;
        let dispute = self.stores.disputes.find_by_rental(id).await?;
        Ok(RentalDetail { rental, evidence, dispute })
    }

    /// Read-only availability probe for a vehicle and day window.
    pub async fn is_available(
        &self,
        vehicle_id: &VehicleId,
        window: &BookingWindow,
        exclude: Option<&RentalId>,
    ) -> Result<bool, EngineError> {
        let vehicle = self
            .stores
            .vehicles
            .find(vehicle_id)
            .await?
            .ok_or_else(|| EngineError::not_found("vehicle", vehicle_id.0.clone()))?;
        if !vehicle.is_bookable() {
            return Ok(false);
        }

        let blocked = self
            .stores
            .blocks
            .list_overlapping(vehicle_id, window)
            .await?
            .iter()
            .any(|block| match (&block.rental_id, exclude) {
                (Some(held_by), Some(skip)) => held_by != skip,
                _ => true,
            });
        if blocked {
            return Ok(false);
        }

        let holding =
            self.stores.rentals.list_overlapping_active(vehicle_id, window, exclude).await?;
        Ok(holding.is_empty())
    }

    async fn find_rental(&self, id: &RentalId) -> Result<Rental, EngineError> {
        self.stores
            .rentals
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("rental", id.0.clone()))
    }
}

/// Calendar bookkeeping implied by the status a rental just moved to.
pub(crate) fn block_maintenance_for(rental: &Rental) -> Result<BlockMaintenance, EngineError> {
    Ok(match rental.status {
        RentalStatus::Confirmed => {
            let window = BookingWindow::new(rental.start_date, rental.end_date)?;
            BlockMaintenance::Ensure(UnavailabilityBlock::reserved(
                rental.vehicle_id.clone(),
                rental.id.clone(),
                &window,
            ))
        }
        RentalStatus::Cancelled | RentalStatus::Completed => BlockMaintenance::Clear,
        _ => BlockMaintenance::Keep,
    })
}

/// Audit plus one notification per recipient for a completed status change.
pub(crate) fn status_change_events(
    actor: &AccountRecord,
    rental: &Rental,
    previous: &RentalStatus,
    recipients: &[UserId],
) -> Vec<OutboundEvent> {
    let mut audit = AuditEntry::new(
        actor.id.clone(),
        "rental.status_changed",
        "rental",
        rental.id.0.clone(),
    )
    .with_metadata("from", previous.as_str())
    .with_metadata("to", rental.status.as_str());
    if let Some(reason) = &rental.cancel_reason {
        if rental.status == RentalStatus::Cancelled {
            audit = audit.with_metadata("cancel_reason", reason.clone());
        }
    }

    let (kind, title) = match (previous, &rental.status) {
        (RentalStatus::AwaitApproval, RentalStatus::Confirmed) => {
            (NotificationKind::BookingApproved, "Booking approved")
        }
        (_, RentalStatus::Cancelled) => (NotificationKind::BookingCancelled, "Booking cancelled"),
        (RentalStatus::Confirmed, RentalStatus::OnTrip) => {
            (NotificationKind::TripStarted, "Trip started")
        }
        (RentalStatus::OnTrip, RentalStatus::Completed) => {
            (NotificationKind::TripCompleted, "Trip completed")
        }
        _ => (NotificationKind::BookingUpdated, "Booking updated"),
    };
    let message = format!(
        "Rental {} moved from {} to {}",
        rental.id.0,
        previous.as_str(),
        rental.status.as_str()
    );

    let mut events = vec![OutboundEvent::Audit(audit)];
    for recipient in recipients {
        events.push(OutboundEvent::Notify(
            Notification::new(recipient.clone(), kind.clone(), title, message.clone())
                .with_data(json!({ "rental_id": rental.id.0, "status": rental.status.as_str() })),
        ));
    }
    events
}

fn build_rental(
    vehicle: &Vehicle,
    renter: &AccountRecord,
    window: &BookingWindow,
    request: &CreateRentalRequest,
    policy: &FeePolicy,
) -> Rental {
    let inputs = PricingInputs {
        price_per_day: vehicle.daily_rate,
        duration_minutes: window.duration_minutes(),
        delivery_fee: request.delivery_fee,
        insurance_fee: request.insurance_fee,
        discount_amount: request.discount_amount,
        deposit_amount: vehicle.deposit_amount,
    };
    let breakdown = pricing::quote(&inputs, policy);

    let status = if vehicle.instant_book {
        RentalStatus::PendingPayment
    } else {
        RentalStatus::AwaitApproval
    };
    let now = Utc::now();

    Rental {
        id: RentalId::generate(),
        renter_id: renter.id.clone(),
        owner_id: vehicle.owner_id.clone(),
        vehicle_id: vehicle.id.clone(),
        start_date: window.start_date(),
        end_date: window.end_date(),
        duration_minutes: breakdown.duration_minutes,
        duration_days: breakdown.duration_days,
        price_per_day: vehicle.daily_rate,
        delivery_fee: breakdown.delivery_fee,
        insurance_fee: breakdown.insurance_fee,
        discount_amount: breakdown.discount_amount,
        total_price: breakdown.total_price,
        deposit_price: breakdown.deposit_price,
        platform_fee_ratio: breakdown.platform_fee_ratio,
        platform_fee: breakdown.platform_fee,
        owner_earning: breakdown.owner_earning,
        insurance_commission_ratio: breakdown.insurance_commission_ratio,
        insurance_commission_amount: breakdown.insurance_commission_amount,
        insurance_payable_to_partner: breakdown.insurance_payable_to_partner,
        platform_earning: breakdown.platform_earning,
        delivery_address: request.delivery_address.clone(),
        status,
        cancel_reason: None,
        status_version: 1,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
