use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use wheelbase_booking::{AdminService, BookingService, BookingStores, SideEffectDispatcher};
use wheelbase_core::config::{AppConfig, ConfigError, LoadOptions};
use wheelbase_core::pricing::FeePolicy;
use wheelbase_db::{connect_with_settings, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub stores: BookingStores,
    pub booking: Arc<BookingService>,
    pub admin: Arc<AdminService>,
    pub dispatcher: SideEffectDispatcher,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let stores = BookingStores::sqlite(&db_pool);
    let default_fees = FeePolicy::new(
        config.fees.platform_fee_ratio,
        config.fees.insurance_commission_ratio,
    );
    let booking = Arc::new(BookingService::new(stores.clone(), default_fees));
    let admin = Arc::new(AdminService::new(stores.clone()));
    let dispatcher = SideEffectDispatcher::sqlite(&db_pool);

    Ok(Application { config, db_pool, stores, booking, admin, dispatcher })
}
