use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use transita_core::error::SeatCacheError;
use transita_core::seats::SeatCache;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

fn seats_key(route_id: Uuid) -> String {
    format!("route:{}:seats", route_id)
}

fn lock_key(route_id: Uuid, observed: i64) -> String {
    format!("lock:route:{}:seats:{}", route_id, observed)
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get_seat_availability(&self, route_id: Uuid) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(seats_key(route_id)).await
    }

    pub async fn seed_seat_availability(
        &self,
        route_id: Uuid,
        seats: i64,
        ttl_seconds: u64,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(seats_key(route_id), seats, ttl_seconds)
            .await?;
        debug!("Seeded availability for route {}: {}", route_id, seats);
        Ok(())
    }

    pub async fn decr_seat_availability(&self, route_id: Uuid) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        // Adjust only while the counter exists; on a miss return nil so the
        // next read re-seeds from the authoritative count instead of DECR
        // materializing a bogus negative key.
        let script = redis::Script::new(
            r#"
            if redis.call("EXISTS", KEYS[1]) == 1 then
                return redis.call("DECR", KEYS[1])
            else
                return nil
            end
        "#,
        );

        script.key(seats_key(route_id)).invoke_async(&mut conn).await
    }

    pub async fn incr_seat_availability(&self, route_id: Uuid) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(
            r#"
            if redis.call("EXISTS", KEYS[1]) == 1 then
                return redis.call("INCR", KEYS[1])
            else
                return nil
            end
        "#,
        );

        script.key(seats_key(route_id)).invoke_async(&mut conn).await
    }

    /// SET NX: only one holder per (route, observed count) key. The value
    /// records who holds the slot; expiry bounds a crashed holder.
    pub async fn acquire_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
        holder: &str,
        ttl_seconds: u64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(lock_key(route_id, observed))
            .arg(holder)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    pub async fn release_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(lock_key(route_id, observed)).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl SeatCache for RedisClient {
    async fn availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError> {
        self.get_seat_availability(route_id)
            .await
            .map_err(|e| SeatCacheError::Unavailable(e.to_string()))
    }

    async fn seed_availability(
        &self,
        route_id: Uuid,
        seats: i64,
        ttl: Duration,
    ) -> Result<(), SeatCacheError> {
        self.seed_seat_availability(route_id, seats, ttl.as_secs())
            .await
            .map_err(|e| SeatCacheError::Unavailable(e.to_string()))
    }

    async fn decrement_availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError> {
        self.decr_seat_availability(route_id)
            .await
            .map_err(|e| SeatCacheError::Unavailable(e.to_string()))
    }

    async fn increment_availability(&self, route_id: Uuid) -> Result<Option<i64>, SeatCacheError> {
        self.incr_seat_availability(route_id)
            .await
            .map_err(|e| SeatCacheError::Unavailable(e.to_string()))
    }

    async fn acquire_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, SeatCacheError> {
        RedisClient::acquire_reservation_lock(self, route_id, observed, holder, ttl.as_secs())
            .await
            .map_err(|e| SeatCacheError::Unavailable(e.to_string()))
    }

    async fn release_reservation_lock(
        &self,
        route_id: Uuid,
        observed: i64,
    ) -> Result<(), SeatCacheError> {
        RedisClient::release_reservation_lock(self, route_id, observed)
            .await
            .map_err(|e| SeatCacheError::Unavailable(e.to_string()))
    }
}
