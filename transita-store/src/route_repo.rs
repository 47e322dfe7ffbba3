use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use transita_core::error::LedgerError;
use transita_core::repository::RouteRepository;
use transita_core::route::{BusType, Route};

pub struct StoreRouteRepository {
    pool: PgPool,
}

impl StoreRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    origin: String,
    destination: String,
    fare: i64,
    seats_available: i32,
    bus_type: String,
    departs_at: chrono::DateTime<chrono::Utc>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl RouteRow {
    fn into_route(self) -> Route {
        Route {
            id: self.id,
            name: self.name,
            origin: self.origin,
            destination: self.destination,
            fare: self.fare,
            seats_available: self.seats_available,
            bus_type: BusType::from_str(&self.bus_type).unwrap_or(BusType::Express),
            departs_at: self.departs_at,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl RouteRepository for StoreRouteRepository {
    async fn route(&self, route_id: Uuid) -> Result<Option<Route>, LedgerError> {
        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT id, name, origin, destination, fare, seats_available, bus_type, departs_at, created_at
            FROM routes
            WHERE id = $1
            "#,
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Store(e.to_string()))?;

        Ok(row.map(RouteRow::into_route))
    }

    async fn consume_seat(&self, route_id: Uuid) -> Result<bool, LedgerError> {
        // The predicate keeps the authoritative count from ever going
        // negative, even when several instances confirm concurrently.
        let result = sqlx::query(
            r#"
            UPDATE routes
            SET seats_available = seats_available - 1
            WHERE id = $1 AND seats_available > 0
            "#,
        )
        .bind(route_id)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Store(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
