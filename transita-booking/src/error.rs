use uuid::Uuid;

use transita_core::error::{LedgerError, SeatCacheError};
use transita_core::payment::GatewayError;

/// Failures of the reserve path. Seat exhaustion and lost races are
/// retryable client errors; everything else is a server fault.
#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    #[error("route {0} not found")]
    RouteNotFound(Uuid),

    #[error("no seats available")]
    NoSeatsAvailable,

    /// Another requester is mid-transaction against the same observed seat
    /// count. A retry will see a different count if that transaction
    /// completed, or fail again if it has not.
    #[error("another transaction is in progress")]
    ReservationInProgress,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Cache(#[from] SeatCacheError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Failures of the settlement path.
#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    /// The provider referenced a transaction we never created. A protocol
    /// integrity error, logged and rejected, never silently accepted.
    #[error("unknown transaction {0}")]
    UnknownTransaction(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Cache(#[from] SeatCacheError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
