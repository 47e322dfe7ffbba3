use crate::booking::BookingStatus;

/// Failures from the durable store (routes and the booking ledger).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Identifier collision at creation. Must not happen given the
    /// transaction id generation scheme; surfaced for investigation.
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(String),

    #[error("unknown transaction id {0}")]
    UnknownTransaction(String),

    #[error("illegal booking transition {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("ledger store failure: {0}")]
    Store(String),
}

/// Failures from the seat availability cache and reservation lock substrate.
/// Callers must fail a reservation attempt closed when the cache is
/// unreachable rather than assume availability.
#[derive(Debug, thiserror::Error)]
pub enum SeatCacheError {
    #[error("seat cache unavailable: {0}")]
    Unavailable(String),
}
