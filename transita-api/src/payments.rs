use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use transita_booking::SettlementOutcome;
use transita_core::booking::BookingStatus;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/payments/{transaction_id}/status",
        get(payment_status),
    )
}

#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub transaction_id: String,
    pub status: BookingStatus,
}

impl From<SettlementOutcome> for SettlementResponse {
    fn from(outcome: SettlementOutcome) -> Self {
        Self {
            transaction_id: outcome.transaction_id,
            status: outcome.status,
        }
    }
}

/// GET /v1/payments/{transaction_id}/status
/// Poll-side settlement trigger: asks the provider for the transaction's
/// verdict and drives the same idempotent settlement as the webhook.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<SettlementResponse>, AppError> {
    let outcome = state.engine.settle(&transaction_id, None).await?;
    Ok(Json(outcome.into()))
}
