use sqlx::Executor;

use crate::connection::DbPool;
use crate::stores::StoreError;

/// Canonical seed rows behind the `seed` CLI command and the end-to-end
/// checks: staff and marketplace accounts, one bookable vehicle, one pending
/// vehicle, active fee settings, a maintenance block and a finished trip.
const SEED_ENTITIES: &[SeedEntity] = &[
    SeedEntity { entity: "app_user", id: "usr-admin-001", description: "platform admin" },
    SeedEntity { entity: "app_user", id: "usr-support-001", description: "support staff" },
    SeedEntity { entity: "app_user", id: "usr-owner-001", description: "vehicle owner" },
    SeedEntity { entity: "app_user", id: "usr-renter-001", description: "renter" },
    SeedEntity { entity: "vehicle", id: "veh-approved-001", description: "approved, request-to-book" },
    SeedEntity { entity: "vehicle", id: "veh-pending-001", description: "awaiting listing approval" },
    SeedEntity { entity: "unavailability_block", id: "blk-maint-001", description: "maintenance span" },
    SeedEntity { entity: "rental", id: "rent-completed-001", description: "finished trip" },
];

const SEED_USER_IDS: &[&str] =
    &["usr-admin-001", "usr-support-001", "usr-owner-001", "usr-renter-001"];
const SEED_VEHICLE_IDS: &[&str] = &["veh-approved-001", "veh-pending-001"];
const SEED_RENTAL_IDS: &[&str] = &["rent-completed-001"];
const SEED_BLOCK_IDS: &[&str] = &["blk-maint-001"];

/// Deterministic development/E2E dataset.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Loads the dataset. Safe to run repeatedly; every row keys on a fixed
    /// id.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, StoreError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { seeded: SEED_ENTITIES.to_vec() })
    }

    /// Checks every seeded row against the contract above, including the
    /// lifecycle invariant that a completed rental holds no calendar block.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let user_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM app_user WHERE id IN {} AND is_active = 1",
            sql_array_from_ids(SEED_USER_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("seed-accounts", user_count == SEED_USER_IDS.len() as i64));

        let admin_role: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM app_user WHERE id = 'usr-admin-001' AND role = 'admin')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("admin-role", admin_role == 1));

        let support_role: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM app_user WHERE id = 'usr-support-001' AND role = 'support')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("support-role", support_role == 1));

        let approved_vehicle: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM vehicle
             WHERE id = 'veh-approved-001' AND approval_status = 'approved'
               AND daily_rate = '100.00' AND owner_id = 'usr-owner-001')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("approved-vehicle", approved_vehicle == 1));

        let pending_vehicle: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM vehicle
             WHERE id = 'veh-pending-001' AND approval_status = 'pending' AND instant_book = 1)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("pending-vehicle", pending_vehicle == 1));

        let active_fees: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM fee_settings
             WHERE is_active = 1 AND platform_fee_ratio = '0.15'
               AND insurance_commission_ratio = '0.20')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("active-fee-settings", active_fees == 1));

        let maintenance_block: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM unavailability_block
             WHERE id = 'blk-maint-001' AND rental_id IS NULL
               AND vehicle_id = 'veh-approved-001')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("maintenance-block", maintenance_block == 1));

        let completed_rental: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM rental
             WHERE id = 'rent-completed-001' AND status = 'completed'
               AND total_price = '300.00' AND owner_earning = '255.00')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("completed-rental", completed_rental == 1));

        let completed_released: i64 = sqlx::query_scalar(
            "SELECT NOT EXISTS(SELECT 1 FROM unavailability_block
             WHERE rental_id = 'rent-completed-001')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("completed-rental-released", completed_released == 1));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), StoreError> {
        let mut tx = pool.begin().await?;

        let quoted_rentals = sql_array_from_ids(SEED_RENTAL_IDS);
        let quoted_blocks = sql_array_from_ids(SEED_BLOCK_IDS);
        let quoted_vehicles = sql_array_from_ids(SEED_VEHICLE_IDS);
        let quoted_users = sql_array_from_ids(SEED_USER_IDS);

        sqlx::query(&format!(
            "DELETE FROM unavailability_block WHERE id IN {quoted_blocks}
                 OR rental_id IN {quoted_rentals}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM evidence WHERE rental_id IN {quoted_rentals}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM dispute WHERE rental_id IN {quoted_rentals}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM rental WHERE id IN {quoted_rentals}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM vehicle WHERE id IN {quoted_vehicles}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM fee_settings WHERE id = 1").execute(&mut *tx).await?;
        sqlx::query(&format!("DELETE FROM app_user WHERE id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedEntity {
    pub entity: &'static str,
    pub id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub seeded: Vec<SeedEntity>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}
