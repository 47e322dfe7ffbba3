use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::SeatCacheError;

/// Fast, ephemeral per-route seat counter plus the short-lived reservation
/// lock protecting each attempt. Never the system of record: entries are
/// seeded lazily from the route's authoritative count and self-expire, so
/// any drift is bounded by the TTL.
#[async_trait]
pub trait SeatCache: Send + Sync {
    /// Cached remaining-seat count, or None when absent or expired.
    async fn availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError>;

    async fn seed_availability(
        &self,
        route_id: Uuid,
        seats: i64,
        ttl: Duration,
    ) -> Result<(), SeatCacheError>;

    /// Atomic decrement, applied only when the counter exists. Returns the
    /// new value, or None when the entry has expired and the next read must
    /// re-seed. Callers verify availability under the reservation lock
    /// before decrementing.
    async fn decrement_availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError>;

    /// Atomic increment with the same existence guard; used to release a
    /// soft hold after a failed or compensated reservation.
    async fn increment_availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError>;

    /// Set-if-not-present lock keyed on (route, observed count). Exactly one
    /// holder per key; losing the race is an immediate rejection. Expiry is
    /// the safety net against a crashed holder.
    async fn acquire_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, SeatCacheError>;

    /// Explicit release, used by the compensation path so a retry against
    /// the same restored count is not blocked for the full TTL.
    async fn release_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
    ) -> Result<(), SeatCacheError>;
}
