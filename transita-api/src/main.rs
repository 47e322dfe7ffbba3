use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transita_api::{app, worker, AppState};
use transita_booking::engine::{ReservationEngine, ReservationRules};
use transita_booking::gateway::PhonePeGateway;
use transita_core::repository::BookingLedger;
use transita_store::{DbClient, EventProducer, RedisClient, StoreBookingLedger, StoreRouteRepository};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "transita_api=debug,transita_booking=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = transita_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Transita API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Redis Connection
    let redis_client = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);

    // Kafka Connection
    let kafka_producer =
        EventProducer::new(&config.kafka.brokers).expect("Failed to create Kafka producer");

    let route_repo = Arc::new(StoreRouteRepository::new(db.pool.clone()));
    let ledger: Arc<dyn BookingLedger> = Arc::new(StoreBookingLedger::new(db.pool.clone()));
    let gateway = Arc::new(
        PhonePeGateway::new(config.gateway.clone()).expect("Failed to build payment gateway client"),
    );

    let engine = Arc::new(ReservationEngine::new(
        route_repo,
        ledger.clone(),
        redis_arc.clone(),
        gateway,
        Arc::new(kafka_producer),
        ReservationRules {
            seat_cache_ttl: Duration::from_secs(config.booking_rules.seat_cache_ttl_seconds),
            reservation_lock_ttl: Duration::from_secs(config.booking_rules.reservation_lock_seconds),
        },
    ));

    // Re-drives settlement for bookings the provider never called back about.
    tokio::spawn(worker::start_settlement_sweeper(
        engine.clone(),
        ledger,
        config.booking_rules.settle_poll_interval_seconds,
        config.booking_rules.settle_poll_after_seconds,
    ));

    let app_state = AppState {
        engine,
        redis: redis_arc,
        rules: config.booking_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
