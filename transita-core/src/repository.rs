use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::error::LedgerError;
use crate::route::Route;

/// Repository trait for route data access. Reads come from the
/// administrative subsystem's data; the only write this core performs is the
/// durable seat consumption at confirmation time.
#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn route(&self, route_id: Uuid) -> Result<Option<Route>, LedgerError>;

    /// Decrement the authoritative seat count by one, guarded so it can
    /// never go below zero. Returns false when no seat was left to consume.
    async fn consume_seat(&self, route_id: Uuid) -> Result<bool, LedgerError>;
}

/// Result of a ledger transition. `applied` is true only for the one caller
/// that actually moved the booking out of PENDING; late duplicates get the
/// existing record back with `applied == false`.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub applied: bool,
}

/// Durable store of booking attempts and their lifecycle state. This is the
/// single source of truth for "has this transaction already been settled";
/// every settlement entry point consults it before mutating anything else.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn create(&self, booking: &Booking) -> Result<Booking, LedgerError>;

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Booking>, LedgerError>;

    /// Atomically move a PENDING booking to a terminal status, recording the
    /// provider payload. Idempotent: if the booking is already terminal the
    /// existing record is returned and no side effects are re-applied.
    async fn transition(
        &self,
        transaction_id: &str,
        next: BookingStatus,
        provider_payload: Option<serde_json::Value>,
    ) -> Result<TransitionOutcome, LedgerError>;

    /// PENDING bookings created before `older_than`, oldest first. Feed for
    /// the settlement sweeper.
    async fn stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, LedgerError>;
}
