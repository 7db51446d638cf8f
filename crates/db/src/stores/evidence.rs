use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::domain::account::UserId;
use wheelbase_core::domain::evidence::{Evidence, EvidenceId, EvidenceKind};
use wheelbase_core::domain::rental::RentalId;

use super::rental::{parse_timestamp, parse_u32};
use super::{EvidenceStore, StoreError};
use crate::DbPool;

const EVIDENCE_COLUMNS: &str =
    "id, rental_id, kind, url, note, position, created_by, created_at";

pub struct SqlEvidenceStore {
    pool: DbPool,
}

impl SqlEvidenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EvidenceStore for SqlEvidenceStore {
    async fn insert_many(&self, items: &[Evidence]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query(&format!(
                "INSERT INTO evidence ({EVIDENCE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(&item.id.0)
            .bind(&item.rental_id.0)
            .bind(item.kind.as_str())
            .bind(&item.url)
            .bind(item.note.as_deref())
            .bind(i64::from(item.position))
            .bind(&item.created_by.0)
            .bind(item.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_rental(&self, rental_id: &RentalId) -> Result<Vec<Evidence>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence
             WHERE rental_id = ?
             ORDER BY position ASC, created_at ASC, id ASC"
        ))
        .bind(&rental_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(evidence_from_row).collect()
    }

    async fn max_position(&self, rental_id: &RentalId) -> Result<Option<u32>, StoreError> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(position) FROM evidence WHERE rental_id = ?")
                .bind(&rental_id.0)
                .fetch_one(&self.pool)
                .await?;

        max.map(|value| parse_u32("position", value)).transpose()
    }
}

fn evidence_from_row(row: SqliteRow) -> Result<Evidence, StoreError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = EvidenceKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown evidence kind `{kind_raw}`")))?;

    Ok(Evidence {
        id: EvidenceId(row.try_get("id")?),
        rental_id: RentalId(row.try_get("rental_id")?),
        kind,
        url: row.try_get("url")?,
        note: row.try_get("note")?,
        position: parse_u32("position", row.try_get("position")?)?,
        created_by: UserId(row.try_get("created_by")?),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
