pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedResult, VerificationResult};
pub use stores::{
    AccountDirectory, BlockMaintenance, BlockStore, DisputeOpenOutcome, DisputeStore,
    EvidenceStore, FeeSettingsStore, InsertOutcome, RentalFilter, RentalStore, SqlAccountDirectory,
    SqlAuditLog, SqlBlockStore, SqlChatBootstrap, SqlDisputeStore, SqlEvidenceStore,
    SqlFeeSettingsStore, SqlNotificationSink, SqlRentalStore, SqlVehicleCatalog, StoreError,
    VehicleCatalog,
};
