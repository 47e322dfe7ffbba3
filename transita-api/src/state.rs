use std::sync::Arc;

use transita_booking::ReservationEngine;
use transita_store::app_config::BookingRules;
use transita_store::RedisClient;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReservationEngine>,
    pub redis: Arc<RedisClient>,
    pub rules: BookingRules,
}
