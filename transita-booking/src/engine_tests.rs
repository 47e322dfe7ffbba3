use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use transita_core::booking::{BookingStatus, PassengerContact};
use transita_core::payment::{GatewayVerdict, ProviderNotification};
use transita_core::route::{BusType, Route};
use transita_core::seats::SeatCache;
use transita_shared::Masked;

use crate::engine::{ReservationEngine, ReservationRules};
use crate::error::{ReserveError, SettleError};
use crate::gateway::MockPaymentGateway;
use crate::memory::{MemoryLedger, MemoryRoutes, RecordingSink, SeatBoard};

struct Harness {
    engine: Arc<ReservationEngine>,
    routes: Arc<MemoryRoutes>,
    seats: Arc<SeatBoard>,
    ledger: Arc<MemoryLedger>,
    gateway: Arc<MockPaymentGateway>,
    sink: Arc<RecordingSink>,
    route_id: Uuid,
}

async fn harness(seats_available: i32) -> Harness {
    let routes = Arc::new(MemoryRoutes::new());
    let seats = Arc::new(SeatBoard::new());
    let ledger = Arc::new(MemoryLedger::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let sink = Arc::new(RecordingSink::new());

    let route = Route {
        id: Uuid::new_v4(),
        name: "Hyderabad Express".to_string(),
        origin: "Hyderabad".to_string(),
        destination: "Vijayawada".to_string(),
        fare: 45_000,
        seats_available,
        bus_type: BusType::Express,
        departs_at: Utc::now() + chrono::Duration::days(1),
        created_at: Utc::now(),
    };
    let route_id = route.id;
    routes.insert(route).await;

    let engine = Arc::new(ReservationEngine::new(
        routes.clone(),
        ledger.clone(),
        seats.clone(),
        gateway.clone(),
        sink.clone(),
        ReservationRules::default(),
    ));

    Harness {
        engine,
        routes,
        seats,
        ledger,
        gateway,
        sink,
        route_id,
    }
}

fn passenger() -> PassengerContact {
    PassengerContact {
        name: "Asha Rao".to_string(),
        email: Masked("asha@example.com".to_string()),
        phone: Masked("9000090000".to_string()),
    }
}

fn success() -> Option<ProviderNotification> {
    Some(ProviderNotification {
        verdict: GatewayVerdict::Success,
        payload: None,
    })
}

fn failure() -> Option<ProviderNotification> {
    Some(ProviderNotification {
        verdict: GatewayVerdict::Failed,
        payload: None,
    })
}

#[tokio::test]
async fn reserve_returns_ticket_and_pending_booking() {
    let h = harness(10).await;

    let ticket = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap();

    assert!(ticket.redirect_url.contains(&ticket.transaction_id));
    assert_eq!(ticket.amount, 45_000);

    let booking = h
        .ledger
        .find_by_transaction(&ticket.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.requester_id, "user-1");

    // Soft counter seeded from the authoritative count, then held.
    assert_eq!(h.seats.availability(h.route_id).await.unwrap(), Some(9));
    // Authoritative count untouched until confirmation.
    assert_eq!(h.routes.seats_available(h.route_id).await, Some(10));
}

#[tokio::test]
async fn cached_zero_rejects_before_lock_or_ledger() {
    let h = harness(10).await;
    h.seats
        .seed_availability(h.route_id, 0, std::time::Duration::from_secs(3600))
        .await
        .unwrap();

    let err = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap_err();

    assert!(matches!(err, ReserveError::NoSeatsAvailable));
    assert!(h.ledger.is_empty().await);
    assert_eq!(h.seats.lock_attempts().await, 0);
}

#[tokio::test]
async fn losing_the_snapshot_race_is_rejected() {
    let h = harness(5).await;
    h.seats
        .seed_availability(h.route_id, 5, std::time::Duration::from_secs(3600))
        .await
        .unwrap();
    // Someone else already holds the slot for this exact observed count.
    assert!(h
        .seats
        .acquire_reservation_lock(h.route_id, 5, "other", std::time::Duration::from_secs(300))
        .await
        .unwrap());

    let err = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap_err();

    assert!(matches!(err, ReserveError::ReservationInProgress));
    assert!(h.ledger.is_empty().await);
    assert_eq!(h.seats.availability(h.route_id).await.unwrap(), Some(5));
}

#[tokio::test]
async fn one_seat_race_has_exactly_one_winner() {
    let h = harness(1).await;

    let (a, b) = tokio::join!(
        h.engine.reserve(h.route_id, "user-a", passenger()),
        h.engine.reserve(h.route_id, "user-b", passenger()),
    );

    let (winner, loser) = match (a, b) {
        (Ok(t), Err(e)) => (t, e),
        (Err(e), Ok(t)) => (t, e),
        (Ok(_), Ok(_)) => panic!("both requesters won a single seat"),
        (Err(_), Err(_)) => panic!("nobody won the seat"),
    };
    assert!(matches!(
        loser,
        ReserveError::ReservationInProgress | ReserveError::NoSeatsAvailable
    ));

    let outcome = h
        .engine
        .settle(&winner.transaction_id, success())
        .await
        .unwrap();
    assert_eq!(outcome.status, BookingStatus::Confirmed);
    assert!(outcome.newly_settled);

    assert_eq!(h.routes.seats_available(h.route_id).await, Some(0));
    assert_eq!(h.sink.count().await, 1);
}

#[tokio::test]
async fn capacity_is_never_oversold() {
    let h = harness(5).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = h.engine.clone();
        let route_id = h.route_id;
        handles.push(tokio::spawn(async move {
            engine
                .reserve(route_id, &format!("user-{}", i), passenger())
                .await
        }));
    }

    let mut tickets = Vec::new();
    for handle in handles {
        if let Ok(ticket) = handle.await.unwrap() {
            tickets.push(ticket);
        }
    }

    assert!(!tickets.is_empty());
    assert!(tickets.len() <= 5, "more winners than seats: {}", tickets.len());

    for ticket in &tickets {
        let outcome = h
            .engine
            .settle(&ticket.transaction_id, success())
            .await
            .unwrap();
        assert!(outcome.newly_settled);
    }

    let remaining = h.routes.seats_available(h.route_id).await.unwrap();
    assert_eq!(remaining, 5 - tickets.len() as i32);
    assert_eq!(h.sink.count().await, tickets.len());
}

#[tokio::test]
async fn settle_success_is_idempotent() {
    let h = harness(10).await;
    let ticket = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap();

    let first = h
        .engine
        .settle(&ticket.transaction_id, success())
        .await
        .unwrap();
    assert_eq!(first.status, BookingStatus::Confirmed);
    assert!(first.newly_settled);

    let second = h
        .engine
        .settle(&ticket.transaction_id, success())
        .await
        .unwrap();
    assert_eq!(second.status, BookingStatus::Confirmed);
    assert!(!second.newly_settled);

    // One durable decrement, one notification, no matter how often the
    // provider repeats itself.
    assert_eq!(h.routes.seats_available(h.route_id).await, Some(9));
    assert_eq!(h.sink.count().await, 1);
}

#[tokio::test]
async fn first_settlement_wins_across_push_and_poll() {
    let h = harness(10).await;
    let ticket = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap();

    // Webhook says failed, a later poll would say success.
    let push = h
        .engine
        .settle(&ticket.transaction_id, failure())
        .await
        .unwrap();
    assert_eq!(push.status, BookingStatus::Failed);
    assert!(push.newly_settled);

    h.gateway
        .set_verdict(&ticket.transaction_id, GatewayVerdict::Success)
        .await;
    let poll = h.engine.settle(&ticket.transaction_id, None).await.unwrap();
    assert_eq!(poll.status, BookingStatus::Failed);
    assert!(!poll.newly_settled);

    // The failed settlement released the soft hold and its snapshot lock
    // once; nothing durable was consumed and no confirmation went out.
    assert_eq!(h.seats.availability(h.route_id).await.unwrap(), Some(10));
    assert_eq!(h.seats.active_locks().await, 0);
    assert_eq!(h.routes.seats_available(h.route_id).await, Some(10));
    assert_eq!(h.sink.count().await, 0);
}

#[tokio::test]
async fn gateway_failure_rolls_the_reservation_back() {
    let h = harness(5).await;
    h.gateway.fail_next_initiate();

    let err = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::Gateway(_)));

    // Net zero effect on the soft counter, no dangling lock, and no
    // PENDING row left pointing at a payment session that never opened.
    assert_eq!(h.seats.availability(h.route_id).await.unwrap(), Some(5));
    assert_eq!(h.seats.active_locks().await, 0);
    let bookings = h.ledger.all().await;
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, BookingStatus::Failed);
}

#[tokio::test]
async fn failed_settlement_restores_capacity_for_later_requests() {
    let h = harness(1).await;
    let ticket = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap();

    let err = h
        .engine
        .reserve(h.route_id, "user-2", passenger())
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::NoSeatsAvailable));

    h.engine
        .settle(&ticket.transaction_id, failure())
        .await
        .unwrap();
    assert_eq!(h.seats.availability(h.route_id).await.unwrap(), Some(1));
    // The snapshot slot the winner held is freed with the seat, so the
    // retry below is not blocked until the lock TTL fires.
    assert_eq!(h.seats.active_locks().await, 0);

    // The released seat is reservable again.
    h.engine
        .reserve(h.route_id, "user-2", passenger())
        .await
        .unwrap();
}

#[tokio::test]
async fn pending_verdict_mutates_nothing() {
    let h = harness(10).await;
    let ticket = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap();

    // Mock gateway reports Pending until scripted otherwise.
    let outcome = h.engine.settle(&ticket.transaction_id, None).await.unwrap();
    assert_eq!(outcome.status, BookingStatus::Pending);
    assert!(!outcome.newly_settled);
    assert_eq!(h.routes.seats_available(h.route_id).await, Some(10));
    assert_eq!(h.sink.count().await, 0);

    // A later poll that finds success settles normally.
    h.gateway
        .set_verdict(&ticket.transaction_id, GatewayVerdict::Success)
        .await;
    let outcome = h.engine.settle(&ticket.transaction_id, None).await.unwrap();
    assert_eq!(outcome.status, BookingStatus::Confirmed);
    assert!(outcome.newly_settled);
}

#[tokio::test]
async fn settlement_for_unknown_transaction_is_rejected() {
    let h = harness(10).await;
    let err = h
        .engine
        .settle("TXN_0_deadbeef", success())
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::UnknownTransaction(_)));
}

#[tokio::test]
async fn provider_payload_is_recorded_on_settlement() {
    let h = harness(10).await;
    let ticket = h
        .engine
        .reserve(h.route_id, "user-1", passenger())
        .await
        .unwrap();

    let payload = serde_json::json!({ "code": "PAYMENT_SUCCESS", "providerReferenceId": "P2406" });
    h.engine
        .settle(
            &ticket.transaction_id,
            Some(ProviderNotification {
                verdict: GatewayVerdict::Success,
                payload: Some(payload.clone()),
            }),
        )
        .await
        .unwrap();

    let booking = h
        .ledger
        .find_by_transaction(&ticket.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.provider_payload, Some(payload));
}
