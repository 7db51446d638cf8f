use sqlx::{sqlite::SqliteRow, Row};

use wheelbase_core::domain::account::UserId;
use wheelbase_core::domain::vehicle::{Vehicle, VehicleApproval, VehicleId};

use super::rental::{parse_decimal, parse_timestamp};
use super::{StoreError, VehicleCatalog};
use crate::DbPool;

pub struct SqlVehicleCatalog {
    pool: DbPool,
}

impl SqlVehicleCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl VehicleCatalog for SqlVehicleCatalog {
    async fn find(&self, id: &VehicleId) -> Result<Option<Vehicle>, StoreError> {
        let row = sqlx::query(
            "SELECT id, owner_id, daily_rate, deposit_amount, instant_book, approval_status,
                    created_at, updated_at
             FROM vehicle WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(vehicle_from_row).transpose()
    }
}

fn vehicle_from_row(row: SqliteRow) -> Result<Vehicle, StoreError> {
    let approval_raw = row.try_get::<String, _>("approval_status")?;
    let approval_status = VehicleApproval::parse(&approval_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown approval status `{approval_raw}`")))?;

    Ok(Vehicle {
        id: VehicleId(row.try_get("id")?),
        owner_id: UserId(row.try_get("owner_id")?),
        daily_rate: parse_decimal("daily_rate", row.try_get("daily_rate")?)?,
        deposit_amount: parse_decimal("deposit_amount", row.try_get("deposit_amount")?)?,
        instant_book: row.try_get("instant_book")?,
        approval_status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
