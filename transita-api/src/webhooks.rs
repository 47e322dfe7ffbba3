use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use transita_core::payment::{GatewayVerdict, ProviderNotification};

use crate::error::AppError;
use crate::payments::SettlementResponse;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments/phonepe", post(handle_phonepe_webhook))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePeCallback {
    pub transaction_id: String,
    pub status: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub provider_reference_id: Option<String>,
}

/// POST /v1/webhooks/payments/phonepe
/// Push-side settlement trigger. The callback's verdict rides along as a
/// hint; the raw payload is persisted on the booking for reconciliation.
pub async fn handle_phonepe_webhook(
    State(state): State<AppState>,
    Json(callback): Json<PhonePeCallback>,
) -> Result<Json<SettlementResponse>, AppError> {
    tracing::info!(
        "Received provider callback for {}: {}",
        callback.transaction_id,
        callback.status
    );

    let verdict = classify_callback_status(&callback.status);
    let payload = serde_json::to_value(&callback).ok();

    let outcome = state
        .engine
        .settle(
            &callback.transaction_id,
            Some(ProviderNotification { verdict, payload }),
        )
        .await?;

    Ok(Json(outcome.into()))
}

fn classify_callback_status(status: &str) -> GatewayVerdict {
    match status {
        "SUCCESS" | "PAYMENT_SUCCESS" => GatewayVerdict::Success,
        "PENDING" | "PAYMENT_PENDING" => GatewayVerdict::Pending,
        _ => GatewayVerdict::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_payload_parses() {
        let body = r#"{
            "transactionId": "TXN_1718000000000_9f2c11aa",
            "status": "SUCCESS",
            "code": "PAYMENT_SUCCESS",
            "providerReferenceId": "P2406211545"
        }"#;
        let callback: PhonePeCallback = serde_json::from_str(body).unwrap();
        assert_eq!(callback.transaction_id, "TXN_1718000000000_9f2c11aa");
        assert_eq!(callback.code.as_deref(), Some("PAYMENT_SUCCESS"));
    }

    #[test]
    fn unrecognized_statuses_settle_as_failed() {
        assert_eq!(classify_callback_status("SUCCESS"), GatewayVerdict::Success);
        assert_eq!(classify_callback_status("PENDING"), GatewayVerdict::Pending);
        assert_eq!(classify_callback_status("DECLINED"), GatewayVerdict::Failed);
        assert_eq!(classify_callback_status(""), GatewayVerdict::Failed);
    }
}
