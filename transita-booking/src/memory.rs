//! Memory-backed implementations of the engine's collaborators, used by the
//! test suite and for wiring the service without external stores. TTLs are a
//! backing-store concern; these boards never expire entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use transita_core::booking::{Booking, BookingStatus};
use transita_core::error::{LedgerError, SeatCacheError};
use transita_core::events::{BookingConfirmedEvent, NotificationSink};
use transita_core::repository::{BookingLedger, RouteRepository, TransitionOutcome};
use transita_core::route::Route;
use transita_core::seats::SeatCache;

pub struct MemoryRoutes {
    routes: RwLock<HashMap<Uuid, Route>>,
}

impl MemoryRoutes {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, route: Route) {
        self.routes.write().await.insert(route.id, route);
    }

    pub async fn seats_available(&self, route_id: Uuid) -> Option<i32> {
        self.routes
            .read()
            .await
            .get(&route_id)
            .map(|r| r.seats_available)
    }
}

impl Default for MemoryRoutes {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteRepository for MemoryRoutes {
    async fn route(&self, route_id: Uuid) -> Result<Option<Route>, LedgerError> {
        Ok(self.routes.read().await.get(&route_id).cloned())
    }

    async fn consume_seat(&self, route_id: Uuid) -> Result<bool, LedgerError> {
        let mut routes = self.routes.write().await;
        let route = routes
            .get_mut(&route_id)
            .ok_or_else(|| LedgerError::Store(format!("route {} not found", route_id)))?;
        if route.seats_available > 0 {
            route.seats_available -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[derive(Default)]
struct SeatBoardInner {
    counters: HashMap<Uuid, i64>,
    locks: HashMap<(Uuid, i64), String>,
    lock_attempts: usize,
}

pub struct SeatBoard {
    inner: Mutex<SeatBoardInner>,
}

impl SeatBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SeatBoardInner::default()),
        }
    }

    pub async fn lock_attempts(&self) -> usize {
        self.inner.lock().await.lock_attempts
    }

    pub async fn active_locks(&self) -> usize {
        self.inner.lock().await.locks.len()
    }
}

impl Default for SeatBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeatCache for SeatBoard {
    async fn availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError> {
        Ok(self.inner.lock().await.counters.get(&route_id).copied())
    }

    async fn seed_availability(
        &self,
        route_id: Uuid,
        seats: i64,
        _ttl: Duration,
    ) -> Result<(), SeatCacheError> {
        self.inner.lock().await.counters.insert(route_id, seats);
        Ok(())
    }

    async fn decrement_availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.counters.get_mut(&route_id).map(|v| {
            *v -= 1;
            *v
        }))
    }

    async fn increment_availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.counters.get_mut(&route_id).map(|v| {
            *v += 1;
            *v
        }))
    }

    async fn acquire_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
        holder: &str,
        _ttl: Duration,
    ) -> Result<bool, SeatCacheError> {
        let mut inner = self.inner.lock().await;
        inner.lock_attempts += 1;
        match inner.locks.entry((route_id, observed)) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(holder.to_string());
                Ok(true)
            }
        }
    }

    async fn release_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
    ) -> Result<(), SeatCacheError> {
        self.inner.lock().await.locks.remove(&(route_id, observed));
        Ok(())
    }
}

pub struct MemoryLedger {
    bookings: Mutex<HashMap<String, Booking>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            bookings: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.bookings.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bookings.lock().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Booking> {
        self.bookings.lock().await.values().cloned().collect()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingLedger for MemoryLedger {
    async fn create(&self, booking: &Booking) -> Result<Booking, LedgerError> {
        let mut bookings = self.bookings.lock().await;
        if bookings.contains_key(&booking.transaction_id) {
            return Err(LedgerError::DuplicateTransaction(
                booking.transaction_id.clone(),
            ));
        }
        bookings.insert(booking.transaction_id.clone(), booking.clone());
        Ok(booking.clone())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Booking>, LedgerError> {
        Ok(self.bookings.lock().await.get(transaction_id).cloned())
    }

    async fn transition(
        &self,
        transaction_id: &str,
        next: BookingStatus,
        provider_payload: Option<serde_json::Value>,
    ) -> Result<TransitionOutcome, LedgerError> {
        // Only PENDING -> terminal moves exist in the state machine.
        if !BookingStatus::Pending.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                from: BookingStatus::Pending,
                to: next,
            });
        }

        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .get_mut(transaction_id)
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;

        if booking.status.is_terminal() {
            return Ok(TransitionOutcome {
                booking: booking.clone(),
                applied: false,
            });
        }

        booking.status = next;
        if provider_payload.is_some() {
            booking.provider_payload = provider_payload;
        }
        booking.updated_at = Utc::now();
        Ok(TransitionOutcome {
            booking: booking.clone(),
            applied: true,
        })
    }

    async fn stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, LedgerError> {
        let bookings = self.bookings.lock().await;
        let mut pending: Vec<Booking> = bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < older_than)
            .cloned()
            .collect();
        pending.sort_by_key(|b| b.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }
}

pub struct RecordingSink {
    events: Mutex<Vec<BookingConfirmedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub async fn count(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn events(&self) -> Vec<BookingConfirmedEvent> {
        self.events.lock().await.clone()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn booking_confirmed(
        &self,
        event: &BookingConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
