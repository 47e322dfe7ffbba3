use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled bus run. `seats_available` is the authoritative, durable seat
/// count; it is only ever decremented by the settlement path, once per
/// confirmed booking, and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub origin: String,
    pub destination: String,
    /// Fare in minor currency units (paise).
    pub fare: i64,
    pub seats_available: i32,
    pub bus_type: BusType,
    pub departs_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BusType {
    Express,
    #[serde(rename = "Super Luxury")]
    SuperLuxury,
    #[serde(rename = "Ultra Deluxe")]
    UltraDeluxe,
    #[serde(rename = "Palle Velugu")]
    PalleVelugu,
}

impl BusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusType::Express => "Express",
            BusType::SuperLuxury => "Super Luxury",
            BusType::UltraDeluxe => "Ultra Deluxe",
            BusType::PalleVelugu => "Palle Velugu",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Express" => Some(BusType::Express),
            "Super Luxury" => Some(BusType::SuperLuxury),
            "Ultra Deluxe" => Some(BusType::UltraDeluxe),
            "Palle Velugu" => Some(BusType::PalleVelugu),
            _ => None,
        }
    }
}
