use async_trait::async_trait;
use thiserror::Error;

use wheelbase_core::availability::BookingWindow;
use wheelbase_core::domain::account::{AccountRecord, RentalParty, UserId};
use wheelbase_core::domain::block::UnavailabilityBlock;
use wheelbase_core::domain::dispute::{Dispute, DisputeId};
use wheelbase_core::domain::evidence::Evidence;
use wheelbase_core::domain::rental::{Rental, RentalId, RentalStatus};
use wheelbase_core::domain::vehicle::{Vehicle, VehicleId};
use wheelbase_core::errors::EngineError;
use wheelbase_core::pricing::FeePolicy;

pub mod account;
pub mod block;
pub mod dispute;
pub mod evidence;
pub mod fees;
pub mod rental;
pub mod sinks;
pub mod vehicle;

pub use account::SqlAccountDirectory;
pub use block::SqlBlockStore;
pub use dispute::SqlDisputeStore;
pub use evidence::SqlEvidenceStore;
pub use fees::SqlFeeSettingsStore;
pub use rental::SqlRentalStore;
pub use sinks::{SqlAuditLog, SqlChatBootstrap, SqlNotificationSink};
pub use vehicle::SqlVehicleCatalog;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        EngineError::Storage(error.to_string())
    }
}

/// Result of the guarded insert: either the rental and its calendar block
/// went in, or the in-transaction recheck saw a competing reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    WindowConflict,
}

/// Calendar bookkeeping to run atomically with a status change.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockMaintenance {
    /// Status keeps holding the calendar, nothing to do.
    Keep,
    /// Make sure the rental's block exists (idempotent on the rental id).
    Ensure(UnavailabilityBlock),
    /// Release the rental's block.
    Clear,
}

/// Result of opening a dispute atomically with the rental's move to
/// `Disputed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisputeOpenOutcome {
    Opened,
    /// The unique-per-rental constraint fired.
    AlreadyExists,
    /// The rental left `Completed` between read and write.
    StaleRental,
}

/// Admin-surface listing filter. `page` is 1-based.
#[derive(Clone, Debug, PartialEq)]
pub struct RentalFilter {
    pub status: Option<RentalStatus>,
    pub disputed_only: bool,
    pub page: u32,
    pub per_page: u32,
}

impl RentalFilter {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(status: Option<RentalStatus>, disputed_only: bool, page: u32, per_page: u32) -> Self {
        Self {
            status,
            disputed_only,
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for RentalFilter {
    fn default() -> Self {
        Self { status: None, disputed_only: false, page: 1, per_page: Self::DEFAULT_PER_PAGE }
    }
}

#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn find(&self, id: &RentalId) -> Result<Option<Rental>, StoreError>;

    /// Inserts a rental and its calendar block in one `BEGIN IMMEDIATE`
    /// transaction, re-running the overlap check against blocks and active
    /// rentals inside it. Of two racing creates for overlapping windows, at
    /// most one observes `Inserted`.
    async fn insert_booked(
        &self,
        rental: &Rental,
        block: &UnavailabilityBlock,
    ) -> Result<InsertOutcome, StoreError>;

    /// Compare-and-swap status update plus calendar maintenance in one
    /// transaction. Returns `false` when the rental was no longer in
    /// `expected` (nothing is written in that case).
    async fn transition_status(
        &self,
        rental: &Rental,
        expected: &RentalStatus,
        maintenance: BlockMaintenance,
    ) -> Result<bool, StoreError>;

    async fn list_for_party(
        &self,
        user: &UserId,
        party: RentalParty,
        status: Option<&RentalStatus>,
    ) -> Result<Vec<Rental>, StoreError>;

    async fn list_admin(&self, filter: &RentalFilter) -> Result<Vec<Rental>, StoreError>;

    async fn count_admin(&self, filter: &RentalFilter) -> Result<i64, StoreError>;

    /// Rentals whose window overlaps `window` while holding the calendar,
    /// optionally ignoring one rental id.
    async fn list_overlapping_active(
        &self,
        vehicle_id: &VehicleId,
        window: &BookingWindow,
        exclude: Option<&RentalId>,
    ) -> Result<Vec<Rental>, StoreError>;

    async fn touch(&self, id: &RentalId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn insert(&self, block: &UnavailabilityBlock) -> Result<(), StoreError>;

    async fn find_by_rental(
        &self,
        rental_id: &RentalId,
    ) -> Result<Option<UnavailabilityBlock>, StoreError>;

    async fn list_overlapping(
        &self,
        vehicle_id: &VehicleId,
        window: &BookingWindow,
    ) -> Result<Vec<UnavailabilityBlock>, StoreError>;

    async fn delete_for_rental(&self, rental_id: &RentalId) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn insert_many(&self, items: &[Evidence]) -> Result<(), StoreError>;

    async fn list_for_rental(&self, rental_id: &RentalId) -> Result<Vec<Evidence>, StoreError>;

    /// Highest `position` currently on the rental, if any evidence exists.
    async fn max_position(&self, rental_id: &RentalId) -> Result<Option<u32>, StoreError>;
}

#[async_trait]
pub trait DisputeStore: Send + Sync {
    /// Inserts the dispute and swaps the rental `Completed -> Disputed` in
    /// one transaction.
    async fn open(
        &self,
        dispute: &Dispute,
        rental: &Rental,
    ) -> Result<DisputeOpenOutcome, StoreError>;

    async fn find(&self, id: &DisputeId) -> Result<Option<Dispute>, StoreError>;

    async fn find_by_rental(&self, rental_id: &RentalId) -> Result<Option<Dispute>, StoreError>;

    async fn save(&self, dispute: &Dispute) -> Result<(), StoreError>;
}

#[async_trait]
pub trait VehicleCatalog: Send + Sync {
    async fn find(&self, id: &VehicleId) -> Result<Option<Vehicle>, StoreError>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find(&self, id: &UserId) -> Result<Option<AccountRecord>, StoreError>;
}

#[async_trait]
pub trait FeeSettingsStore: Send + Sync {
    /// Newest active fee-settings row, if one has been written.
    async fn latest_active(&self) -> Result<Option<FeePolicy>, StoreError>;
}
