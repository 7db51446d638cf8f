//! Booking lifecycle services: member-facing operations, the admin override
//! path, and the dispatcher that drains side effects after commit.

pub mod admin;
pub mod dispatch;
pub mod service;

pub use admin::{AdminRentalPage, AdminService};
pub use dispatch::SideEffectDispatcher;
pub use service::{BookingService, BookingStores, CreateRentalRequest, NewEvidence, RentalDetail};
