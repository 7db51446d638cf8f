pub mod audit;
pub mod availability;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod pricing;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink};
pub use availability::{BookingWindow, WindowError, MINUTES_PER_DAY};
pub use domain::account::{AccountRecord, AccountRole, RentalParty, UserId};
pub use domain::block::{BlockId, UnavailabilityBlock};
pub use domain::dispute::{Dispute, DisputeId, DisputeStatus};
pub use domain::evidence::{Evidence, EvidenceId, EvidenceKind};
pub use domain::rental::{Rental, RentalId, RentalStatus};
pub use domain::vehicle::{Vehicle, VehicleApproval, VehicleId};
pub use errors::EngineError;
pub use events::{
    ChatBootstrap, InMemoryChatBootstrap, InMemoryNotificationSink, Notification,
    NotificationKind, NotificationSink, OutboundEvent, SideEffectError,
};
pub use pricing::{FeePolicy, PriceBreakdown, PricingInputs, MINOR_UNIT_SCALE};
