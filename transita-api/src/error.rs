use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use transita_booking::{ReserveError, SettleError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    /// The payment provider was unreachable or rejected the request.
    BadGateway(String),
    /// The provider referenced state we do not hold; rejected and logged
    /// for manual reconciliation.
    ProtocolError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => {
                tracing::error!("Payment gateway failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable".to_string())
            }
            AppError::ProtocolError(msg) => {
                tracing::error!("Settlement protocol error: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ReserveError> for AppError {
    fn from(err: ReserveError) -> Self {
        match err {
            ReserveError::RouteNotFound(id) => {
                AppError::NotFoundError(format!("route {} not found", id))
            }
            ReserveError::NoSeatsAvailable => {
                AppError::ConflictError("no seats available".to_string())
            }
            ReserveError::ReservationInProgress => {
                AppError::ConflictError("another transaction is in progress".to_string())
            }
            ReserveError::Gateway(e) => AppError::BadGateway(e.to_string()),
            e => AppError::Anyhow(anyhow::anyhow!(e)),
        }
    }
}

impl From<SettleError> for AppError {
    fn from(err: SettleError) -> Self {
        match err {
            SettleError::UnknownTransaction(txn) => {
                AppError::ProtocolError(format!("unknown transaction {}", txn))
            }
            SettleError::Gateway(e) => AppError::BadGateway(e.to_string()),
            e => AppError::Anyhow(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transita_core::payment::GatewayError;

    #[test]
    fn retryable_reserve_errors_map_to_conflict() {
        for err in [ReserveError::NoSeatsAvailable, ReserveError::ReservationInProgress] {
            assert!(matches!(AppError::from(err), AppError::ConflictError(_)));
        }
    }

    #[test]
    fn gateway_faults_map_to_bad_gateway() {
        let err = ReserveError::Gateway(GatewayError::Timeout);
        assert!(matches!(AppError::from(err), AppError::BadGateway(_)));
    }

    #[test]
    fn unknown_transaction_is_a_protocol_error() {
        let err = SettleError::UnknownTransaction("TXN_1".to_string());
        assert!(matches!(AppError::from(err), AppError::ProtocolError(_)));
    }
}
