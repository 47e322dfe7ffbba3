use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use transita_shared::Masked;
use uuid::Uuid;

/// Emitted exactly once per confirmed booking. Carries the passenger
/// contact fields and trip metadata the downstream mailer and push
/// subsystems need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub transaction_id: String,
    pub route_id: Uuid,
    pub requester_id: String,
    pub route_name: String,
    pub origin: String,
    pub destination: String,
    pub departs_at: i64,
    pub amount: i64,
    pub passenger_name: String,
    pub passenger_email: Masked<String>,
    pub passenger_phone: Masked<String>,
    pub confirmed_at: i64,
}

/// Outbound notification seam. Delivery is owned by external collaborators;
/// a failed publish is logged and never rolls back the settlement that
/// produced it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn booking_confirmed(
        &self,
        event: &BookingConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
