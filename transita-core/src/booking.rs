use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transita_shared::Masked;
use uuid::Uuid;

/// One reservation attempt. `transaction_id` is globally unique and is the
/// idempotency key for every provider callback and status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub transaction_id: String,
    pub route_id: Uuid,
    pub requester_id: String,
    /// Amount charged, in minor currency units (paise).
    pub amount: i64,
    /// Remaining-seat count observed at reservation time. Keys the snapshot
    /// lock held for this attempt, so a failed settlement can free the exact
    /// slot it still holds.
    pub observed_seats: i64,
    pub status: BookingStatus,
    pub passenger: PassengerContact,
    pub provider_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerContact {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

impl Booking {
    pub fn new(
        transaction_id: String,
        route_id: Uuid,
        requester_id: String,
        amount: i64,
        observed_seats: i64,
        passenger: PassengerContact,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            route_id,
            requester_id,
            amount,
            observed_seats,
            status: BookingStatus::Pending,
            passenger,
            provider_payload: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Booking lifecycle. PENDING is the only non-terminal state; once a booking
/// reaches CONFIRMED, FAILED or CANCELLED it is immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Failed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// The only legal transitions are PENDING to one of the terminal states.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(self, BookingStatus::Pending) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Failed => "FAILED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "FAILED" => Some(BookingStatus::Failed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
