use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::availability::BookingWindow;
use wheelbase_core::domain::account::{RentalParty, UserId};
use wheelbase_core::domain::block::UnavailabilityBlock;
use wheelbase_core::domain::rental::{Rental, RentalId, RentalStatus};
use wheelbase_core::domain::vehicle::VehicleId;

use super::{BlockMaintenance, InsertOutcome, RentalFilter, RentalStore, StoreError};
use crate::DbPool;

const RENTAL_COLUMNS: &str = "id, renter_id, owner_id, vehicle_id, start_date, end_date,
    duration_minutes, duration_days, price_per_day, delivery_fee, insurance_fee,
    discount_amount, total_price, deposit_price, platform_fee_ratio, platform_fee,
    owner_earning, insurance_commission_ratio, insurance_commission_amount,
    insurance_payable_to_partner, platform_earning, delivery_address, status,
    cancel_reason, status_version, created_at, updated_at, deleted_at";

/// Statuses that hold the vehicle's calendar, as stored. Must stay in step
/// with `RentalStatus::holds_calendar`.
const HOLDING_STATUSES_SQL: &str = "('pending_payment', 'await_approval', 'confirmed', 'on_trip')";

pub struct SqlRentalStore {
    pool: DbPool,
}

impl SqlRentalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RentalStore for SqlRentalStore {
    async fn find(&self, id: &RentalId) -> Result<Option<Rental>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rental WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(rental_from_row).transpose()
    }

    async fn insert_booked(
        &self,
        rental: &Rental,
        block: &UnavailabilityBlock,
    ) -> Result<InsertOutcome, StoreError> {
        // IMMEDIATE takes the write lock up front, so the overlap recheck
        // below cannot race another create for the same vehicle.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let conflicted: i64 = sqlx::query_scalar(&format!(
            "SELECT EXISTS (
                 SELECT 1 FROM unavailability_block
                 WHERE vehicle_id = ?1 AND start_date <= ?3 AND end_date >= ?2
             ) OR EXISTS (
                 SELECT 1 FROM rental
                 WHERE vehicle_id = ?1
                   AND deleted_at IS NULL
                   AND status IN {HOLDING_STATUSES_SQL}
                   AND start_date <= ?3 AND end_date >= ?2
             )"
        ))
        .bind(&rental.vehicle_id.0)
        .bind(rental.start_date.to_string())
        .bind(rental.end_date.to_string())
        .fetch_one(&mut *tx)
        .await?;

        if conflicted != 0 {
            tx.rollback().await?;
            return Ok(InsertOutcome::WindowConflict);
        }

        sqlx::query(&format!(
            "INSERT INTO rental ({RENTAL_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&rental.id.0)
        .bind(&rental.renter_id.0)
        .bind(&rental.owner_id.0)
        .bind(&rental.vehicle_id.0)
        .bind(rental.start_date.to_string())
        .bind(rental.end_date.to_string())
        .bind(rental.duration_minutes)
        .bind(rental.duration_days)
        .bind(rental.price_per_day.to_string())
        .bind(rental.delivery_fee.to_string())
        .bind(rental.insurance_fee.to_string())
        .bind(rental.discount_amount.to_string())
        .bind(rental.total_price.to_string())
        .bind(rental.deposit_price.to_string())
        .bind(rental.platform_fee_ratio.to_string())
        .bind(rental.platform_fee.to_string())
        .bind(rental.owner_earning.to_string())
        .bind(rental.insurance_commission_ratio.to_string())
        .bind(rental.insurance_commission_amount.to_string())
        .bind(rental.insurance_payable_to_partner.to_string())
        .bind(rental.platform_earning.to_string())
        .bind(rental.delivery_address.as_deref())
        .bind(rental.status.as_str())
        .bind(rental.cancel_reason.as_deref())
        .bind(i64::from(rental.status_version))
        .bind(rental.created_at.to_rfc3339())
        .bind(rental.updated_at.to_rfc3339())
        .bind(rental.deleted_at.map(|value| value.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO unavailability_block
                 (id, vehicle_id, rental_id, start_date, end_date, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&block.id.0)
        .bind(&block.vehicle_id.0)
        .bind(block.rental_id.as_ref().map(|id| &id.0))
        .bind(block.start_date.to_string())
        .bind(block.end_date.to_string())
        .bind(&block.reason)
        .bind(block.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InsertOutcome::Inserted)
    }

    async fn transition_status(
        &self,
        rental: &Rental,
        expected: &RentalStatus,
        maintenance: BlockMaintenance,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE rental
             SET status = ?,
                 cancel_reason = COALESCE(?, cancel_reason),
                 status_version = status_version + 1,
                 updated_at = ?
             WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(rental.status.as_str())
        .bind(rental.cancel_reason.as_deref())
        .bind(rental.updated_at.to_rfc3339())
        .bind(&rental.id.0)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        match maintenance {
            BlockMaintenance::Keep => {}
            BlockMaintenance::Ensure(block) => {
                sqlx::query(
                    "INSERT INTO unavailability_block
                         (id, vehicle_id, rental_id, start_date, end_date, reason, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT (rental_id) WHERE rental_id IS NOT NULL DO NOTHING",
                )
                .bind(&block.id.0)
                .bind(&block.vehicle_id.0)
                .bind(block.rental_id.as_ref().map(|id| &id.0))
                .bind(block.start_date.to_string())
                .bind(block.end_date.to_string())
                .bind(&block.reason)
                .bind(block.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
            }
            BlockMaintenance::Clear => {
                sqlx::query("DELETE FROM unavailability_block WHERE rental_id = ?")
                    .bind(&rental.id.0)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_for_party(
        &self,
        user: &UserId,
        party: RentalParty,
        status: Option<&RentalStatus>,
    ) -> Result<Vec<Rental>, StoreError> {
        let column = match party {
            RentalParty::Renter => "renter_id",
            RentalParty::Owner => "owner_id",
        };

        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {RENTAL_COLUMNS} FROM rental
                 WHERE {column} = ? AND status = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC"
            ))
            .bind(&user.0)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {RENTAL_COLUMNS} FROM rental
                 WHERE {column} = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC"
            ))
            .bind(&user.0)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(rental_from_row).collect()
    }

    async fn list_admin(&self, filter: &RentalFilter) -> Result<Vec<Rental>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rental
             WHERE deleted_at IS NULL
               AND (?1 IS NULL OR status = ?1)
               AND (?2 = 0 OR EXISTS (SELECT 1 FROM dispute WHERE dispute.rental_id = rental.id))
             ORDER BY created_at DESC
             LIMIT ?3 OFFSET ?4"
        ))
        .bind(filter.status.as_ref().map(RentalStatus::as_str))
        .bind(i64::from(filter.disputed_only))
        .bind(i64::from(filter.per_page))
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rental_from_row).collect()
    }

    async fn count_admin(&self, filter: &RentalFilter) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(1) FROM rental
             WHERE deleted_at IS NULL
               AND (?1 IS NULL OR status = ?1)
               AND (?2 = 0 OR EXISTS (SELECT 1 FROM dispute WHERE dispute.rental_id = rental.id))",
        )
        .bind(filter.status.as_ref().map(RentalStatus::as_str))
        .bind(i64::from(filter.disputed_only))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_overlapping_active(
        &self,
        vehicle_id: &VehicleId,
        window: &BookingWindow,
        exclude: Option<&RentalId>,
    ) -> Result<Vec<Rental>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rental
             WHERE vehicle_id = ?1
               AND deleted_at IS NULL
               AND status IN {HOLDING_STATUSES_SQL}
               AND start_date <= ?3 AND end_date >= ?2
               AND (?4 IS NULL OR id != ?4)
             ORDER BY start_date ASC"
        ))
        .bind(&vehicle_id.0)
        .bind(window.start_date().to_string())
        .bind(window.end_date().to_string())
        .bind(exclude.map(|id| &id.0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rental_from_row).collect()
    }

    async fn touch(&self, id: &RentalId) -> Result<(), StoreError> {
        sqlx::query("UPDATE rental SET updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn rental_from_row(row: SqliteRow) -> Result<Rental, StoreError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = RentalStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown rental status `{status_raw}`")))?;

    Ok(Rental {
        id: RentalId(row.try_get("id")?),
        renter_id: UserId(row.try_get("renter_id")?),
        owner_id: UserId(row.try_get("owner_id")?),
        vehicle_id: VehicleId(row.try_get("vehicle_id")?),
        start_date: parse_date("start_date", row.try_get("start_date")?)?,
        end_date: parse_date("end_date", row.try_get("end_date")?)?,
        duration_minutes: row.try_get("duration_minutes")?,
        duration_days: row.try_get("duration_days")?,
        price_per_day: parse_decimal("price_per_day", row.try_get("price_per_day")?)?,
        delivery_fee: parse_decimal("delivery_fee", row.try_get("delivery_fee")?)?,
        insurance_fee: parse_decimal("insurance_fee", row.try_get("insurance_fee")?)?,
        discount_amount: parse_decimal("discount_amount", row.try_get("discount_amount")?)?,
        total_price: parse_decimal("total_price", row.try_get("total_price")?)?,
        deposit_price: parse_decimal("deposit_price", row.try_get("deposit_price")?)?,
        platform_fee_ratio: parse_decimal("platform_fee_ratio", row.try_get("platform_fee_ratio")?)?,
        platform_fee: parse_decimal("platform_fee", row.try_get("platform_fee")?)?,
        owner_earning: parse_decimal("owner_earning", row.try_get("owner_earning")?)?,
        insurance_commission_ratio: parse_decimal(
            "insurance_commission_ratio",
            row.try_get("insurance_commission_ratio")?,
        )?,
        insurance_commission_amount: parse_decimal(
            "insurance_commission_amount",
            row.try_get("insurance_commission_amount")?,
        )?,
        insurance_payable_to_partner: parse_decimal(
            "insurance_payable_to_partner",
            row.try_get("insurance_payable_to_partner")?,
        )?,
        platform_earning: parse_decimal("platform_earning", row.try_get("platform_earning")?)?,
        delivery_address: row.try_get("delivery_address")?,
        status,
        cancel_reason: row.try_get("cancel_reason")?,
        status_version: parse_u32("status_version", row.try_get("status_version")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        deleted_at: parse_optional_timestamp("deleted_at", row.try_get("deleted_at")?)?,
    })
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| {
        StoreError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_date(column: &str, value: String) -> Result<NaiveDate, StoreError> {
    value
        .parse::<NaiveDate>()
        .map_err(|error| StoreError::Decode(format!("invalid date in `{column}`: `{value}` ({error})")))
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, StoreError> {
    value.parse::<Decimal>().map_err(|error| {
        StoreError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            StoreError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use wheelbase_core::availability::BookingWindow;
    use wheelbase_core::domain::account::{RentalParty, UserId};
    use wheelbase_core::domain::block::UnavailabilityBlock;
    use wheelbase_core::domain::rental::{Rental, RentalId, RentalStatus};
    use wheelbase_core::domain::vehicle::VehicleId;

    use super::SqlRentalStore;
    use crate::migrations;
    use crate::stores::{BlockMaintenance, InsertOutcome, RentalFilter, RentalStore};
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn seed_parties(pool: &DbPool) {
        for user in ["usr-renter", "usr-owner", "usr-other"] {
            insert_user(pool, user).await;
        }
        insert_vehicle(pool, "veh-1", "usr-owner").await;
    }

    async fn insert_user(pool: &DbPool, id: &str) {
        sqlx::query(
            "INSERT INTO app_user (id, display_name, role, is_active, created_at)
             VALUES (?, ?, 'user', 1, ?)",
        )
        .bind(id)
        .bind(format!("{id} name"))
        .bind("2026-01-15T09:00:00+00:00")
        .execute(pool)
        .await
        .expect("insert user");
    }

    async fn insert_vehicle(pool: &DbPool, id: &str, owner_id: &str) {
        sqlx::query(
            "INSERT INTO vehicle
                 (id, owner_id, daily_rate, deposit_amount, instant_book, approval_status,
                  created_at, updated_at)
             VALUES (?, ?, '100.00', '150.00', 0, 'approved', ?, ?)",
        )
        .bind(id)
        .bind(owner_id)
        .bind("2026-01-15T09:00:00+00:00")
        .bind("2026-01-15T09:00:00+00:00")
        .execute(pool)
        .await
        .expect("insert vehicle");
    }

    fn day(value: &str) -> NaiveDate {
        value.parse().expect("valid date")
    }

    fn sample_rental(id: &str, start: &str, end: &str, status: RentalStatus) -> Rental {
        let start_date = day(start);
        let end_date = day(end);
        let duration_days = (end_date - start_date).num_days() + 1;
        let now = Utc::now();

        Rental {
            id: RentalId(id.to_string()),
            renter_id: UserId("usr-renter".to_string()),
            owner_id: UserId("usr-owner".to_string()),
            vehicle_id: VehicleId("veh-1".to_string()),
            start_date,
            end_date,
            duration_minutes: duration_days * 1_440,
            duration_days,
            price_per_day: Decimal::new(10_000, 2),
            delivery_fee: Decimal::new(2_000, 2),
            insurance_fee: Decimal::new(3_000, 2),
            discount_amount: Decimal::new(1_000, 2),
            total_price: Decimal::new(34_000, 2),
            deposit_price: Decimal::new(15_000, 2),
            platform_fee_ratio: Decimal::new(15, 2),
            platform_fee: Decimal::new(4_500, 2),
            owner_earning: Decimal::new(27_500, 2),
            insurance_commission_ratio: Decimal::new(20, 2),
            insurance_commission_amount: Decimal::new(600, 2),
            insurance_payable_to_partner: Decimal::new(2_400, 2),
            platform_earning: Decimal::new(4_100, 2),
            delivery_address: Some("12 Dock Street".to_string()),
            status,
            cancel_reason: None,
            status_version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn block_for(rental: &Rental) -> UnavailabilityBlock {
        let window = BookingWindow::new(rental.start_date, rental.end_date).expect("window");
        UnavailabilityBlock::reserved(rental.vehicle_id.clone(), rental.id.clone(), &window)
    }

    async fn block_count(pool: &DbPool, rental_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(1) FROM unavailability_block WHERE rental_id = ?")
            .bind(rental_id)
            .fetch_one(pool)
            .await
            .expect("count blocks")
    }

    #[tokio::test]
    async fn guarded_insert_round_trips_the_aggregate() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let rental = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::AwaitApproval);

        let outcome = store.insert_booked(&rental, &block_for(&rental)).await.expect("insert");
        assert_eq!(outcome, InsertOutcome::Inserted);

        let found = store.find(&rental.id).await.expect("find").expect("should exist");
        assert_eq!(found.id, rental.id);
        assert_eq!(found.start_date, rental.start_date);
        assert_eq!(found.total_price, rental.total_price);
        assert_eq!(found.platform_fee_ratio, rental.platform_fee_ratio);
        assert_eq!(found.status, RentalStatus::AwaitApproval);
        assert_eq!(found.delivery_address.as_deref(), Some("12 Dock Street"));
        assert_eq!(block_count(&pool, "rent-1").await, 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn overlapping_insert_is_rejected_and_writes_nothing() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let first = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::Confirmed);
        store.insert_booked(&first, &block_for(&first)).await.expect("first insert");

        // Shares the boundary day 2026-03-12.
        let second = sample_rental("rent-2", "2026-03-12", "2026-03-14", RentalStatus::Confirmed);
        let outcome = store.insert_booked(&second, &block_for(&second)).await.expect("second");

        assert_eq!(outcome, InsertOutcome::WindowConflict);
        assert!(store.find(&second.id).await.expect("find").is_none());
        assert_eq!(block_count(&pool, "rent-2").await, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn adjacent_windows_do_not_conflict() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let first = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::Confirmed);
        store.insert_booked(&first, &block_for(&first)).await.expect("first insert");

        let second = sample_rental("rent-2", "2026-03-13", "2026-03-14", RentalStatus::Confirmed);
        let outcome = store.insert_booked(&second, &block_for(&second)).await.expect("second");

        assert_eq!(outcome, InsertOutcome::Inserted);

        pool.close().await;
    }

    #[tokio::test]
    async fn cancelled_rental_no_longer_blocks_the_window() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let mut first = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::AwaitApproval);
        store.insert_booked(&first, &block_for(&first)).await.expect("first insert");

        let expected = first.status.clone();
        first.status = RentalStatus::Cancelled;
        first.cancel_reason = Some("plans changed".to_string());
        first.updated_at = Utc::now();
        let swapped = store
            .transition_status(&first, &expected, BlockMaintenance::Clear)
            .await
            .expect("cancel");
        assert!(swapped);
        assert_eq!(block_count(&pool, "rent-1").await, 0);

        let second = sample_rental("rent-2", "2026-03-11", "2026-03-13", RentalStatus::Confirmed);
        let outcome = store.insert_booked(&second, &block_for(&second)).await.expect("second");
        assert_eq!(outcome, InsertOutcome::Inserted);

        pool.close().await;
    }

    #[tokio::test]
    async fn stale_status_swap_is_refused() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let mut rental = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::AwaitApproval);
        store.insert_booked(&rental, &block_for(&rental)).await.expect("insert");

        rental.status = RentalStatus::Confirmed;
        rental.updated_at = Utc::now();
        let swapped = store
            .transition_status(&rental, &RentalStatus::AwaitApproval, BlockMaintenance::Keep)
            .await
            .expect("first swap");
        assert!(swapped);

        // A second caller still holding the await_approval snapshot loses.
        let stale = store
            .transition_status(&rental, &RentalStatus::AwaitApproval, BlockMaintenance::Keep)
            .await
            .expect("stale swap");
        assert!(!stale);

        let found = store.find(&rental.id).await.expect("find").expect("exists");
        assert_eq!(found.status, RentalStatus::Confirmed);
        assert_eq!(found.status_version, 2);

        pool.close().await;
    }

    #[tokio::test]
    async fn ensure_block_is_idempotent_on_the_rental_id() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let mut rental = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::AwaitApproval);
        store.insert_booked(&rental, &block_for(&rental)).await.expect("insert");

        let expected = rental.status.clone();
        rental.status = RentalStatus::Confirmed;
        rental.updated_at = Utc::now();
        let swapped = store
            .transition_status(&rental, &expected, BlockMaintenance::Ensure(block_for(&rental)))
            .await
            .expect("confirm");
        assert!(swapped);
        assert_eq!(block_count(&pool, "rent-1").await, 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn party_listing_is_scoped_and_filterable() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;
        insert_vehicle(&pool, "veh-2", "usr-other").await;

        let store = SqlRentalStore::new(pool.clone());
        let first = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::Confirmed);
        store.insert_booked(&first, &block_for(&first)).await.expect("first");

        let mut second = sample_rental("rent-2", "2026-04-01", "2026-04-03", RentalStatus::AwaitApproval);
        second.vehicle_id = VehicleId("veh-2".to_string());
        second.owner_id = UserId("usr-other".to_string());
        store.insert_booked(&second, &block_for(&second)).await.expect("second");

        let renter = UserId("usr-renter".to_string());
        let as_renter =
            store.list_for_party(&renter, RentalParty::Renter, None).await.expect("renter list");
        assert_eq!(as_renter.len(), 2);

        let confirmed_only = store
            .list_for_party(&renter, RentalParty::Renter, Some(&RentalStatus::Confirmed))
            .await
            .expect("filtered list");
        assert_eq!(confirmed_only.len(), 1);
        assert_eq!(confirmed_only[0].id.0, "rent-1");

        let owner = UserId("usr-owner".to_string());
        let as_owner =
            store.list_for_party(&owner, RentalParty::Owner, None).await.expect("owner list");
        assert_eq!(as_owner.len(), 1);
        assert_eq!(as_owner[0].id.0, "rent-1");

        pool.close().await;
    }

    #[tokio::test]
    async fn admin_listing_paginates_and_filters_disputed() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        for (id, start, end) in [
            ("rent-1", "2026-03-01", "2026-03-02"),
            ("rent-2", "2026-03-04", "2026-03-05"),
            ("rent-3", "2026-03-07", "2026-03-08"),
        ] {
            let rental = sample_rental(id, start, end, RentalStatus::Confirmed);
            store.insert_booked(&rental, &block_for(&rental)).await.expect("insert");
        }

        sqlx::query(
            "INSERT INTO dispute
                 (id, rental_id, opened_by, reason, status, created_at, updated_at)
             VALUES ('dsp-1', 'rent-2', 'usr-renter', 'damage', 'open', ?, ?)",
        )
        .bind("2026-03-06T09:00:00+00:00")
        .bind("2026-03-06T09:00:00+00:00")
        .execute(&pool)
        .await
        .expect("insert dispute");

        let all = RentalFilter::new(None, false, 1, 2);
        assert_eq!(store.list_admin(&all).await.expect("page 1").len(), 2);
        assert_eq!(store.count_admin(&all).await.expect("count"), 3);

        let page_two = RentalFilter::new(None, false, 2, 2);
        assert_eq!(store.list_admin(&page_two).await.expect("page 2").len(), 1);

        let disputed = RentalFilter::new(None, true, 1, 20);
        let disputed_rows = store.list_admin(&disputed).await.expect("disputed");
        assert_eq!(disputed_rows.len(), 1);
        assert_eq!(disputed_rows[0].id.0, "rent-2");

        let confirmed = RentalFilter::new(Some(RentalStatus::Confirmed), false, 1, 20);
        assert_eq!(store.count_admin(&confirmed).await.expect("count confirmed"), 3);

        pool.close().await;
    }

    #[tokio::test]
    async fn overlap_listing_ignores_released_statuses_and_excluded_id() {
        let pool = setup_pool().await;
        seed_parties(&pool).await;

        let store = SqlRentalStore::new(pool.clone());
        let holding = sample_rental("rent-1", "2026-03-10", "2026-03-12", RentalStatus::OnTrip);
        store.insert_booked(&holding, &block_for(&holding)).await.expect("holding insert");

        let mut done = sample_rental("rent-2", "2026-03-20", "2026-03-22", RentalStatus::OnTrip);
        store.insert_booked(&done, &block_for(&done)).await.expect("done insert");
        let expected = done.status.clone();
        done.status = RentalStatus::Completed;
        done.updated_at = Utc::now();
        assert!(store
            .transition_status(&done, &expected, BlockMaintenance::Clear)
            .await
            .expect("complete"));

        let window = BookingWindow::new(day("2026-03-01"), day("2026-03-31")).expect("window");
        let vehicle = VehicleId("veh-1".to_string());

        let active = store
            .list_overlapping_active(&vehicle, &window, None)
            .await
            .expect("active overlaps");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.0, "rent-1");

        let excluding = store
            .list_overlapping_active(&vehicle, &window, Some(&RentalId("rent-1".to_string())))
            .await
            .expect("excluded overlaps");
        assert!(excluding.is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn racing_creates_for_overlapping_windows_admit_one() {
        let dir = TempDir::new().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());
        let pool = connect_with_settings(&url, 5, 30).await.expect("connect file pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        seed_parties(&pool).await;

        let first = sample_rental("rent-a", "2026-03-10", "2026-03-12", RentalStatus::Confirmed);
        let second = sample_rental("rent-b", "2026-03-11", "2026-03-13", RentalStatus::Confirmed);

        let task_a = tokio::spawn({
            let store = SqlRentalStore::new(pool.clone());
            let rental = first.clone();
            let block = block_for(&rental);
            async move { store.insert_booked(&rental, &block).await }
        });
        let task_b = tokio::spawn({
            let store = SqlRentalStore::new(pool.clone());
            let rental = second.clone();
            let block = block_for(&rental);
            async move { store.insert_booked(&rental, &block).await }
        });

        let outcome_a = task_a.await.expect("join a").expect("insert a");
        let outcome_b = task_b.await.expect("join b").expect("insert b");

        let inserted = [&outcome_a, &outcome_b]
            .iter()
            .filter(|outcome| ***outcome == InsertOutcome::Inserted)
            .count();
        assert_eq!(inserted, 1, "exactly one of two racing creates may win");

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM rental")
            .fetch_one(&pool)
            .await
            .expect("count rentals");
        assert_eq!(stored, 1);

        pool.close().await;
    }
}
