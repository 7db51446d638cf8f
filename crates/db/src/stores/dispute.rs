use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::domain::account::UserId;
use wheelbase_core::domain::dispute::{Dispute, DisputeId, DisputeStatus};
use wheelbase_core::domain::rental::{Rental, RentalId};

use super::rental::{parse_optional_timestamp, parse_timestamp};
use super::{DisputeOpenOutcome, DisputeStore, StoreError};
use crate::DbPool;

const DISPUTE_COLUMNS: &str = "id, rental_id, opened_by, reason, description, status,
    admin_notes, resolved_by, resolved_at, created_at, updated_at";

pub struct SqlDisputeStore {
    pool: DbPool,
}

impl SqlDisputeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DisputeStore for SqlDisputeStore {
    async fn open(
        &self,
        dispute: &Dispute,
        rental: &Rental,
    ) -> Result<DisputeOpenOutcome, StoreError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM dispute WHERE rental_id = ?)")
                .bind(&rental.id.0)
                .fetch_one(&mut *tx)
                .await?;
        if exists != 0 {
            tx.rollback().await?;
            return Ok(DisputeOpenOutcome::AlreadyExists);
        }

        // A dispute can only be raised against a completed rental; the swap to
        // `disputed` rides in the same transaction as the insert.
        let swapped = sqlx::query(
            "UPDATE rental
             SET status = 'disputed', status_version = status_version + 1, updated_at = ?
             WHERE id = ? AND status = 'completed' AND deleted_at IS NULL",
        )
        .bind(dispute.created_at.to_rfc3339())
        .bind(&rental.id.0)
        .execute(&mut *tx)
        .await?;
        if swapped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(DisputeOpenOutcome::StaleRental);
        }

        sqlx::query(&format!(
            "INSERT INTO dispute ({DISPUTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&dispute.id.0)
        .bind(&dispute.rental_id.0)
        .bind(&dispute.opened_by.0)
        .bind(&dispute.reason)
        .bind(dispute.description.as_deref())
        .bind(dispute.status.as_str())
        .bind(dispute.admin_notes.as_deref())
        .bind(dispute.resolved_by.as_ref().map(|id| &id.0))
        .bind(dispute.resolved_at.map(|value| value.to_rfc3339()))
        .bind(dispute.created_at.to_rfc3339())
        .bind(dispute.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DisputeOpenOutcome::Opened)
    }

    async fn find(&self, id: &DisputeId) -> Result<Option<Dispute>, StoreError> {
        let row = sqlx::query(&format!("SELECT {DISPUTE_COLUMNS} FROM dispute WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(dispute_from_row).transpose()
    }

    async fn find_by_rental(&self, rental_id: &RentalId) -> Result<Option<Dispute>, StoreError> {
        let row = sqlx::query(&format!("SELECT {DISPUTE_COLUMNS} FROM dispute WHERE rental_id = ?"))
            .bind(&rental_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(dispute_from_row).transpose()
    }

    async fn save(&self, dispute: &Dispute) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO dispute ({DISPUTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 status = excluded.status,
                 admin_notes = excluded.admin_notes,
                 resolved_by = excluded.resolved_by,
                 resolved_at = excluded.resolved_at,
                 updated_at = excluded.updated_at"
        ))
        .bind(&dispute.id.0)
        .bind(&dispute.rental_id.0)
        .bind(&dispute.opened_by.0)
        .bind(&dispute.reason)
        .bind(dispute.description.as_deref())
        .bind(dispute.status.as_str())
        .bind(dispute.admin_notes.as_deref())
        .bind(dispute.resolved_by.as_ref().map(|id| &id.0))
        .bind(dispute.resolved_at.map(|value| value.to_rfc3339()))
        .bind(dispute.created_at.to_rfc3339())
        .bind(dispute.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn dispute_from_row(row: SqliteRow) -> Result<Dispute, StoreError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = DisputeStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown dispute status `{status_raw}`")))?;

    Ok(Dispute {
        id: DisputeId(row.try_get("id")?),
        rental_id: RentalId(row.try_get("rental_id")?),
        opened_by: UserId(row.try_get("opened_by")?),
        reason: row.try_get("reason")?,
        description: row.try_get("description")?,
        status,
        admin_notes: row.try_get("admin_notes")?,
        resolved_by: row.try_get::<Option<String>, _>("resolved_by")?.map(UserId),
        resolved_at: parse_optional_timestamp("resolved_at", row.try_get("resolved_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
