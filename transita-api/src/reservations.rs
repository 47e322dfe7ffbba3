use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use transita_booking::ReservationTicket;
use transita_core::booking::PassengerContact;
use transita_shared::Masked;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/reservations", post(create_reservation))
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub route_id: Uuid,
    pub passenger: PassengerInput,
}

#[derive(Debug, Deserialize)]
pub struct PassengerInput {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// POST /v1/reservations
/// Reserve a seat and open a payment session. The requester identity is
/// injected by the upstream auth layer.
pub async fn create_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationTicket>), AppError> {
    let requester_id = requester_id(&headers)?;
    validate_passenger(&req.passenger)?;

    let passenger = PassengerContact {
        name: req.passenger.name.trim().to_string(),
        email: Masked(req.passenger.email),
        phone: Masked(req.passenger.phone),
    };

    let ticket = state
        .engine
        .reserve(req.route_id, &requester_id, passenger)
        .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

fn requester_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-requester-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::AuthenticationError("missing requester identity".to_string()))
}

fn validate_passenger(passenger: &PassengerInput) -> Result<(), AppError> {
    let name = passenger.name.trim();
    if name.len() < 2 || name.len() > 50 {
        return Err(AppError::ValidationError(
            "passenger name must be between 2 and 50 characters".to_string(),
        ));
    }
    if !passenger.email.contains('@') {
        return Err(AppError::ValidationError(
            "passenger email is invalid".to_string(),
        ));
    }
    if passenger.phone.trim().len() < 10 {
        return Err(AppError::ValidationError(
            "passenger phone must be at least 10 digits".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, email: &str, phone: &str) -> PassengerInput {
        PassengerInput {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn accepts_a_complete_passenger() {
        assert!(validate_passenger(&input("Asha Rao", "asha@example.com", "9000090000")).is_ok());
    }

    #[test]
    fn rejects_bad_contact_fields() {
        assert!(validate_passenger(&input("A", "asha@example.com", "9000090000")).is_err());
        assert!(validate_passenger(&input("Asha Rao", "not-an-email", "9000090000")).is_err());
        assert!(validate_passenger(&input("Asha Rao", "asha@example.com", "12345")).is_err());
    }
}
