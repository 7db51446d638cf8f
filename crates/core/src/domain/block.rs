use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::availability::BookingWindow;
use crate::domain::rental::RentalId;
use crate::domain::vehicle::VehicleId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn generate() -> Self {
        Self(format!("blk-{}", Uuid::new_v4()))
    }
}

/// A reserved span on a vehicle's calendar. Booking-created blocks carry the
/// rental id so they can be found and released by equality; operator-created
/// maintenance blocks leave it empty and only describe themselves in
/// `reason`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailabilityBlock {
    pub id: BlockId,
    pub vehicle_id: VehicleId,
    pub rental_id: Option<RentalId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl UnavailabilityBlock {
    pub fn reserved(vehicle_id: VehicleId, rental_id: RentalId, window: &BookingWindow) -> Self {
        Self {
            id: BlockId::generate(),
            vehicle_id,
            rental_id: Some(rental_id),
            start_date: window.start_date(),
            end_date: window.end_date(),
            reason: "rental booking".to_string(),
            created_at: Utc::now(),
        }
    }
}
