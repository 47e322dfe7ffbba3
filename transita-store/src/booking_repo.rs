use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use transita_core::booking::{Booking, BookingStatus, PassengerContact};
use transita_core::error::LedgerError;
use transita_core::repository::{BookingLedger, TransitionOutcome};
use transita_shared::Masked;

pub struct StoreBookingLedger {
    pool: PgPool,
}

impl StoreBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    transaction_id: String,
    route_id: Uuid,
    requester_id: String,
    amount: i64,
    observed_seats: i64,
    status: String,
    passenger_name: String,
    passenger_email: String,
    passenger_phone: String,
    provider_payload: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, LedgerError> {
        let status = BookingStatus::from_str(&self.status).ok_or_else(|| {
            LedgerError::Store(format!(
                "booking {} has unrecognized status {}",
                self.transaction_id, self.status
            ))
        })?;

        Ok(Booking {
            id: self.id,
            transaction_id: self.transaction_id,
            route_id: self.route_id,
            requester_id: self.requester_id,
            amount: self.amount,
            observed_seats: self.observed_seats,
            status,
            passenger: PassengerContact {
                name: self.passenger_name,
                email: Masked(self.passenger_email),
                phone: Masked(self.passenger_phone),
            },
            provider_payload: self.provider_payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str =
    "id, transaction_id, route_id, requester_id, amount, observed_seats, status, \
     passenger_name, passenger_email, passenger_phone, provider_payload, created_at, updated_at";

#[async_trait]
impl BookingLedger for StoreBookingLedger {
    async fn create(&self, booking: &Booking) -> Result<Booking, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookings
                (id, transaction_id, route_id, requester_id, amount, observed_seats,
                 status, passenger_name, passenger_email, passenger_phone,
                 provider_payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.transaction_id)
        .bind(booking.route_id)
        .bind(&booking.requester_id)
        .bind(booking.amount)
        .bind(booking.observed_seats)
        .bind(booking.status.as_str())
        .bind(&booking.passenger.name)
        .bind(booking.passenger.email.0.as_str())
        .bind(booking.passenger.phone.0.as_str())
        .bind(&booking.provider_payload)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(booking.clone()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                LedgerError::DuplicateTransaction(booking.transaction_id.clone()),
            ),
            Err(e) => Err(LedgerError::Store(e.to_string())),
        }
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE transaction_id = $1",
            BOOKING_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Store(e.to_string()))?;

        row.map(BookingRow::into_booking).transpose()
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

        // The status predicate is the idempotence guard: only one caller
        // ever observes the PENDING row, so terminal transitions apply
        // exactly once even across service instances.
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = $2,
                provider_payload = COALESCE($3, provider_payload),
                updated_at = NOW()
            WHERE transaction_id = $1 AND status = 'PENDING'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(transaction_id)
        .bind(next.as_str())
        .bind(&provider_payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Store(e.to_string()))?;

        match row {
            Some(row) => Ok(TransitionOutcome {
                booking: row.into_booking()?,
                applied: true,
            }),
            None => {
                let existing = self
                    .find_by_transaction(transaction_id)
                    .await?
                    .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;
                Ok(TransitionOutcome {
                    booking: existing,
                    applied: false,
                })
            }
        }
    }

    async fn stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, LedgerError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = 'PENDING' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
            BOOKING_COLUMNS
        ))
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Store(e.to_string()))?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}
