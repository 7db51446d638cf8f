use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::account::UserId;
use crate::domain::rental::RentalId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub String);

impl EvidenceId {
    pub fn generate() -> Self {
        Self(format!("evd-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    PickupExterior,
    PickupInterior,
    PickupOdometer,
    PickupFuelGauge,
    ReturnExterior,
    ReturnInterior,
    ReturnOdometer,
    ReturnFuelGauge,
    DamageDetail,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PickupExterior => "pickup_exterior",
            Self::PickupInterior => "pickup_interior",
            Self::PickupOdometer => "pickup_odometer",
            Self::PickupFuelGauge => "pickup_fuel_gauge",
            Self::ReturnExterior => "return_exterior",
            Self::ReturnInterior => "return_interior",
            Self::ReturnOdometer => "return_odometer",
            Self::ReturnFuelGauge => "return_fuel_gauge",
            Self::DamageDetail => "damage_detail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pickup_exterior" => Some(Self::PickupExterior),
            "pickup_interior" => Some(Self::PickupInterior),
            "pickup_odometer" => Some(Self::PickupOdometer),
            "pickup_fuel_gauge" => Some(Self::PickupFuelGauge),
            "return_exterior" => Some(Self::ReturnExterior),
            "return_interior" => Some(Self::ReturnInterior),
            "return_odometer" => Some(Self::ReturnOdometer),
            "return_fuel_gauge" => Some(Self::ReturnFuelGauge),
            "damage_detail" => Some(Self::DamageDetail),
            _ => None,
        }
    }

    /// Pickup-condition shots are the renter's responsibility and only the
    /// renter may file them.
    pub fn is_pickup(&self) -> bool {
        matches!(
            self,
            Self::PickupExterior | Self::PickupInterior | Self::PickupOdometer | Self::PickupFuelGauge
        )
    }
}

/// Append-only photo/document record attached to a rental.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub rental_id: RentalId,
    pub kind: EvidenceKind,
    pub url: String,
    pub note: Option<String>,
    pub position: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
