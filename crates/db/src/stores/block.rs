use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::availability::BookingWindow;
use wheelbase_core::domain::block::{BlockId, UnavailabilityBlock};
use wheelbase_core::domain::rental::RentalId;
use wheelbase_core::domain::vehicle::VehicleId;

use super::rental::{parse_date, parse_timestamp};
use super::{BlockStore, StoreError};
use crate::DbPool;

const BLOCK_COLUMNS: &str =
    "id, vehicle_id, rental_id, start_date, end_date, reason, created_at";

pub struct SqlBlockStore {
    pool: DbPool,
}

impl SqlBlockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BlockStore for SqlBlockStore {
    async fn insert(&self, block: &UnavailabilityBlock) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO unavailability_block ({BLOCK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&block.id.0)
        .bind(&block.vehicle_id.0)
        .bind(block.rental_id.as_ref().map(|id| &id.0))
        .bind(block.start_date.to_string())
        .bind(block.end_date.to_string())
        .bind(&block.reason)
        .bind(block.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_rental(
        &self,
        rental_id: &RentalId,
    ) -> Result<Option<UnavailabilityBlock>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM unavailability_block WHERE rental_id = ?"
        ))
        .bind(&rental_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(block_from_row).transpose()
    }

    async fn list_overlapping(
        &self,
        vehicle_id: &VehicleId,
        window: &BookingWindow,
    ) -> Result<Vec<UnavailabilityBlock>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM unavailability_block
             WHERE vehicle_id = ?1 AND start_date <= ?3 AND end_date >= ?2
             ORDER BY start_date ASC"
        ))
        .bind(&vehicle_id.0)
        .bind(window.start_date().to_string())
        .bind(window.end_date().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(block_from_row).collect()
    }

    async fn delete_for_rental(&self, rental_id: &RentalId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM unavailability_block WHERE rental_id = ?")
            .bind(&rental_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn block_from_row(row: SqliteRow) -> Result<UnavailabilityBlock, StoreError> {
    Ok(UnavailabilityBlock {
        id: BlockId(row.try_get("id")?),
        vehicle_id: VehicleId(row.try_get("vehicle_id")?),
        rental_id: row.try_get::<Option<String>, _>("rental_id")?.map(RentalId),
        start_date: parse_date("start_date", row.try_get("start_date")?)?,
        end_date: parse_date("end_date", row.try_get("end_date")?)?,
        reason: row.try_get("reason")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use wheelbase_core::availability::BookingWindow;
    use wheelbase_core::domain::block::{BlockId, UnavailabilityBlock};
    use wheelbase_core::domain::rental::RentalId;
    use wheelbase_core::domain::vehicle::VehicleId;

    use super::SqlBlockStore;
    use crate::migrations;
    use crate::stores::BlockStore;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn seed_vehicle(pool: &DbPool) {
        sqlx::query(
            "INSERT INTO app_user (id, display_name, role, is_active, created_at)
             VALUES ('usr-owner', 'Owner', 'user', 1, '2026-01-15T09:00:00+00:00')",
        )
        .execute(pool)
        .await
        .expect("insert owner");
        sqlx::query(
            "INSERT INTO vehicle
                 (id, owner_id, daily_rate, deposit_amount, instant_book, approval_status,
                  created_at, updated_at)
             VALUES ('veh-1', 'usr-owner', '100.00', '0', 0, 'approved',
                     '2026-01-15T09:00:00+00:00', '2026-01-15T09:00:00+00:00')",
        )
        .execute(pool)
        .await
        .expect("insert vehicle");
    }

    fn day(value: &str) -> NaiveDate {
        value.parse().expect("valid date")
    }

    fn maintenance_block(id: &str, start: &str, end: &str) -> UnavailabilityBlock {
        UnavailabilityBlock {
            id: BlockId(id.to_string()),
            vehicle_id: VehicleId("veh-1".to_string()),
            rental_id: None,
            start_date: day(start),
            end_date: day(end),
            reason: "maintenance".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn maintenance_block_round_trips_without_a_rental() {
        let pool = setup_pool().await;
        seed_vehicle(&pool).await;

        let store = SqlBlockStore::new(pool.clone());
        store
            .insert(&maintenance_block("blk-1", "2026-03-10", "2026-03-12"))
            .await
            .expect("insert block");

        let window = BookingWindow::new(day("2026-03-12"), day("2026-03-14")).expect("window");
        let overlapping = store
            .list_overlapping(&VehicleId("veh-1".to_string()), &window)
            .await
            .expect("list overlapping");

        assert_eq!(overlapping.len(), 1);
        assert_eq!(overlapping[0].id.0, "blk-1");
        assert!(overlapping[0].rental_id.is_none());
        assert_eq!(overlapping[0].reason, "maintenance");

        pool.close().await;
    }

    #[tokio::test]
    async fn non_overlapping_windows_are_not_listed() {
        let pool = setup_pool().await;
        seed_vehicle(&pool).await;

        let store = SqlBlockStore::new(pool.clone());
        store
            .insert(&maintenance_block("blk-1", "2026-03-10", "2026-03-12"))
            .await
            .expect("insert block");

        let window = BookingWindow::new(day("2026-03-13"), day("2026-03-15")).expect("window");
        let overlapping = store
            .list_overlapping(&VehicleId("veh-1".to_string()), &window)
            .await
            .expect("list overlapping");

        assert!(overlapping.is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn delete_for_rental_reports_removed_rows() {
        let pool = setup_pool().await;
        seed_vehicle(&pool).await;

        let store = SqlBlockStore::new(pool.clone());
        store
            .insert(&maintenance_block("blk-1", "2026-03-10", "2026-03-12"))
            .await
            .expect("insert maintenance block");

        let rental_id = RentalId("rent-1".to_string());
        assert_eq!(store.delete_for_rental(&rental_id).await.expect("delete miss"), 0);

        assert!(store.find_by_rental(&rental_id).await.expect("find").is_none());

        pool.close().await;
    }
}
