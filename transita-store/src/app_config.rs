use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub gateway: GatewayConfig,
    pub booking_rules: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

/// Credentials and endpoints for the payment provider. Injected into the
/// gateway client at construction time; never looked up ambiently.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: String,
    /// Where the provider sends the requester after checkout. The
    /// transaction id is appended as a path segment.
    pub redirect_url: String,
    /// Our webhook endpoint, registered with the provider.
    pub callback_url: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
}

fn default_gateway_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// TTL for the soft seats-remaining counter.
    pub seat_cache_ttl_seconds: u64,
    /// TTL for the reservation lock; bounds staleness if a holder crashes.
    pub reservation_lock_seconds: u64,
    /// How often the settlement sweeper re-drives pending bookings.
    pub settle_poll_interval_seconds: u64,
    /// Minimum booking age before the sweeper polls the provider for it.
    pub settle_poll_after_seconds: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 {
    100
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `TRANSITA__GATEWAY__SALT_KEY=...` overrides gateway.salt_key
            .add_source(config::Environment::with_prefix("TRANSITA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
