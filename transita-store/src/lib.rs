pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod redis_repo;
pub mod route_repo;

pub use booking_repo::StoreBookingLedger;
pub use database::DbClient;
pub use events::EventProducer;
pub use redis_repo::RedisClient;
pub use route_repo::StoreRouteRepository;
