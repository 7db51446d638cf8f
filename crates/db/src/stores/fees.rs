use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::pricing::FeePolicy;

use super::rental::parse_decimal;
use super::{FeeSettingsStore, StoreError};
use crate::DbPool;

pub struct SqlFeeSettingsStore {
    pool: DbPool,
}

impl SqlFeeSettingsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FeeSettingsStore for SqlFeeSettingsStore {
    async fn latest_active(&self) -> Result<Option<FeePolicy>, StoreError> {
        let row = sqlx::query(
            "SELECT platform_fee_ratio, insurance_commission_ratio
             FROM fee_settings
             WHERE is_active = 1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(policy_from_row).transpose()
    }
}

fn policy_from_row(row: SqliteRow) -> Result<FeePolicy, StoreError> {
    Ok(FeePolicy::new(
        parse_decimal("platform_fee_ratio", row.try_get("platform_fee_ratio")?)?,
        parse_decimal("insurance_commission_ratio", row.try_get("insurance_commission_ratio")?)?,
    ))
}
