use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::domain::account::{AccountRecord, AccountRole, UserId};

use super::rental::parse_timestamp;
use super::{AccountDirectory, StoreError};
use crate::DbPool;

pub struct SqlAccountDirectory {
    pool: DbPool,
}

impl SqlAccountDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccountDirectory for SqlAccountDirectory {
    async fn find(&self, id: &UserId) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, display_name, role, is_active, created_at FROM app_user WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }
}

fn account_from_row(row: SqliteRow) -> Result<AccountRecord, StoreError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = AccountRole::parse(&role_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown account role `{role_raw}`")))?;

    Ok(AccountRecord {
        id: UserId(row.try_get("id")?),
        display_name: row.try_get("display_name")?,
        role,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
