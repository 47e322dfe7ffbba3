use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use transita_core::booking::{Booking, BookingStatus, PassengerContact};
use transita_core::events::{BookingConfirmedEvent, NotificationSink};
use transita_core::payment::{GatewayVerdict, PaymentGateway, ProviderNotification};
use transita_core::repository::{BookingLedger, RouteRepository};
use transita_core::route::Route;
use transita_core::seats::SeatCache;

use crate::error::{ReserveError, SettleError};

/// Tunables for the reserve path, injected from configuration.
#[derive(Debug, Clone)]
pub struct ReservationRules {
    /// TTL of the soft seats-remaining counter.
    pub seat_cache_ttl: Duration,
    /// TTL of the reservation lock.
    pub reservation_lock_ttl: Duration,
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            seat_cache_ttl: Duration::from_secs(3600),
            reservation_lock_ttl: Duration::from_secs(300),
        }
    }
}

/// What the requester gets back from a successful reserve call.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationTicket {
    pub transaction_id: String,
    pub redirect_url: String,
    pub amount: i64,
}

/// Result of driving one settlement attempt. `newly_settled` is true only
/// for the call that actually applied the terminal transition.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub transaction_id: String,
    pub status: BookingStatus,
    pub newly_settled: bool,
}

/// Orchestrates the seat cache, reservation lock, booking ledger and payment
/// gateway. Invoked concurrently from many tasks and potentially several
/// service instances; all cross-request coordination lives in the injected
/// collaborators, none in this struct.
pub struct ReservationEngine {
    routes: Arc<dyn RouteRepository>,
    ledger: Arc<dyn BookingLedger>,
    seats: Arc<dyn SeatCache>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: Arc<dyn NotificationSink>,
    rules: ReservationRules,
}

impl ReservationEngine {
    pub fn new(
        routes: Arc<dyn RouteRepository>,
        ledger: Arc<dyn BookingLedger>,
        seats: Arc<dyn SeatCache>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: Arc<dyn NotificationSink>,
        rules: ReservationRules,
    ) -> Self {
        Self {
            routes,
            ledger,
            seats,
            gateway,
            notifications,
            rules,
        }
    }

    /// Reserve one seat on a route and open a payment session for it.
    ///
    /// The soft counter is decremented here as admission control; the
    /// route's authoritative count is only consumed at confirmation. Every
    /// failure after the decrement compensates synchronously before the
    /// error is returned.
    pub async fn reserve(
        &self,
        route_id: Uuid,
        requester_id: &str,
        passenger: PassengerContact,
    ) -> Result<ReservationTicket, ReserveError> {
        let route = self
            .routes
            .route(route_id)
            .await?
            .ok_or(ReserveError::RouteNotFound(route_id))?;

        let remaining = match self.seats.availability(route_id).await? {
            Some(v) => v,
            None => {
                let seeded = i64::from(route.seats_available);
                self.seats
                    .seed_availability(route_id, seeded, self.rules.seat_cache_ttl)
                    .await?;
                debug!(%route_id, seats = seeded, "seeded seat availability");
                seeded
            }
        };

        if remaining <= 0 {
            return Err(ReserveError::NoSeatsAvailable);
        }

        // Serialization point: the key encodes the observed count, so only
        // requesters transacting against this exact snapshot contend here.
        let acquired = self
            .seats
            .acquire_reservation_lock(
                route_id,
                remaining,
                requester_id,
                self.rules.reservation_lock_ttl,
            )
            .await?;
        if !acquired {
            return Err(ReserveError::ReservationInProgress);
        }

        if let Some(left) = self.seats.decrement_availability(route_id).await? {
            debug!(%route_id, left, "soft seat hold taken");
        }

        let transaction_id = new_transaction_id();
        let booking = Booking::new(
            transaction_id.clone(),
            route_id,
            requester_id.to_string(),
            route.fare,
            remaining,
            passenger,
        );

        if let Err(e) = self.ledger.create(&booking).await {
            self.release_hold(route_id, remaining).await;
            return Err(e.into());
        }

        match self
            .gateway
            .initiate(requester_id, &transaction_id, route.fare)
            .await
        {
            Ok(initiated) => {
                info!(%route_id, %transaction_id, "payment session opened");
                Ok(ReservationTicket {
                    transaction_id,
                    redirect_url: initiated.redirect_url,
                    amount: route.fare,
                })
            }
            Err(e) => {
                // The seat must not remain held without a payment session.
                self.release_hold(route_id, remaining).await;
                if let Err(le) = self
                    .ledger
                    .transition(&transaction_id, BookingStatus::Failed, None)
                    .await
                {
                    error!(%transaction_id, "failed to fail booking after gateway error: {}", le);
                }
                Err(e.into())
            }
        }
    }

    /// Resolve a PENDING booking to a terminal state based on the provider's
    /// verdict. Fed by both the webhook adapter and the status poller; safe
    /// to invoke any number of times, from either trigger, in any order.
    pub async fn settle(
        &self,
        transaction_id: &str,
        notification: Option<ProviderNotification>,
    ) -> Result<SettlementOutcome, SettleError> {
        let booking = self
            .ledger
            .find_by_transaction(transaction_id)
            .await?
            .ok_or_else(|| {
                error!(transaction_id, "settlement referenced an unknown transaction");
                SettleError::UnknownTransaction(transaction_id.to_string())
            })?;

        if booking.status.is_terminal() {
            return Ok(SettlementOutcome {
                transaction_id: booking.transaction_id,
                status: booking.status,
                newly_settled: false,
            });
        }

        let (verdict, payload) = match notification {
            Some(n) => (n.verdict, n.payload),
            None => (self.gateway.check_status(transaction_id).await?, None),
        };

        match verdict {
            GatewayVerdict::Success => {
                let outcome = self
                    .ledger
                    .transition(transaction_id, BookingStatus::Confirmed, payload)
                    .await?;
                if outcome.applied {
                    self.consume_confirmed_seat(&outcome.booking).await?;
                }
                Ok(SettlementOutcome {
                    transaction_id: outcome.booking.transaction_id,
                    status: outcome.booking.status,
                    newly_settled: outcome.applied,
                })
            }
            GatewayVerdict::Failed => {
                let outcome = self
                    .ledger
                    .transition(transaction_id, BookingStatus::Failed, payload)
                    .await?;
                if outcome.applied {
                    // Restore the soft hold and free the snapshot slot it was
                    // taken under, so the seat is reservable again without
                    // waiting out the lock TTL.
                    self.release_hold(booking.route_id, booking.observed_seats)
                        .await;
                    info!(transaction_id, "booking failed, seat released");
                }
                Ok(SettlementOutcome {
                    transaction_id: outcome.booking.transaction_id,
                    status: outcome.booking.status,
                    newly_settled: outcome.applied,
                })
            }
            GatewayVerdict::Pending => Ok(SettlementOutcome {
                transaction_id: booking.transaction_id,
                status: booking.status,
                newly_settled: false,
            }),
        }
    }

    /// Durable seat consumption plus the one confirmation notification.
    /// Runs only for the settle call that applied the CONFIRMED transition.
    async fn consume_confirmed_seat(&self, booking: &Booking) -> Result<(), SettleError> {
        let consumed = self.routes.consume_seat(booking.route_id).await?;
        if !consumed {
            // Overselling window closed by the soft counter's TTL; the
            // booking stands, but the discrepancy is worth an operator's eye.
            warn!(
                transaction_id = %booking.transaction_id,
                route_id = %booking.route_id,
                "confirmed booking found no authoritative seat to consume"
            );
        }
        info!(
            transaction_id = %booking.transaction_id,
            route_id = %booking.route_id,
            "booking confirmed"
        );

        match self.routes.route(booking.route_id).await? {
            Some(route) => {
                let event = confirmation_event(booking, &route);
                if let Err(e) = self.notifications.booking_confirmed(&event).await {
                    error!(
                        transaction_id = %booking.transaction_id,
                        "failed to dispatch confirmation: {}", e
                    );
                }
            }
            None => error!(
                transaction_id = %booking.transaction_id,
                route_id = %booking.route_id,
                "confirmed booking references a missing route"
            ),
        }
        Ok(())
    }

    /// Restore the soft counter and free the snapshot slot a hold was taken
    /// under. Used by both compensation paths: a reserve attempt that dies
    /// before a payment session exists, and a settlement that resolves FAILED.
    async fn release_hold(&self, route_id: Uuid, observed: i64) {
        if let Err(e) = self.seats.increment_availability(route_id).await {
            error!(%route_id, "failed to restore seat count: {}", e);
        }
        // Free the snapshot slot so an immediate retry against the restored
        // count is not blocked until the lock expires.
        if let Err(e) = self.seats.release_reservation_lock(route_id, observed).await {
            warn!(%route_id, observed, "failed to release reservation lock: {}", e);
        }
    }
}

fn confirmation_event(booking: &Booking, route: &Route) -> BookingConfirmedEvent {
    BookingConfirmedEvent {
        booking_id: booking.id,
        transaction_id: booking.transaction_id.clone(),
        route_id: route.id,
        requester_id: booking.requester_id.clone(),
        route_name: route.name.clone(),
        origin: route.origin.clone(),
        destination: route.destination.clone(),
        departs_at: route.departs_at.timestamp(),
        amount: booking.amount,
        passenger_name: booking.passenger.name.clone(),
        passenger_email: booking.passenger.email.clone(),
        passenger_phone: booking.passenger.phone.clone(),
        confirmed_at: Utc::now().timestamp(),
    }
}

/// Time-based transaction id with a random tail so concurrent requests in
/// the same millisecond cannot collide.
fn new_transaction_id() -> String {
    let tail = Uuid::new_v4().simple().to_string();
    format!("TXN_{}_{}", Utc::now().timestamp_millis(), &tail[..8])
}

#[cfg(test)]
mod tests {
    use super::new_transaction_id;

    #[test]
    fn transaction_ids_do_not_collide() {
        let a = new_transaction_id();
        let b = new_transaction_id();
        assert!(a.starts_with("TXN_"));
        assert_ne!(a, b);
    }
}
