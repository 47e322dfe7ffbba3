use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use transita_booking::ReservationEngine;
use transita_core::repository::BookingLedger;

const SWEEP_BATCH: i64 = 100;

/// Re-drives settlement for PENDING bookings the provider never called back
/// about. Safe to run alongside the webhook because settlement is
/// idempotent; whichever trigger observes the booking first wins.
pub async fn start_settlement_sweeper(
    engine: Arc<ReservationEngine>,
    ledger: Arc<dyn BookingLedger>,
    poll_interval_seconds: u64,
    poll_after_seconds: u64,
) {
    let mut ticker = interval(Duration::from_secs(poll_interval_seconds));
    info!(
        "Settlement sweeper started, polling every {}s for bookings older than {}s",
        poll_interval_seconds, poll_after_seconds
    );

    loop {
        ticker.tick().await;

        let cutoff = Utc::now() - chrono::Duration::seconds(poll_after_seconds as i64);
        let stale = match ledger.stale_pending(cutoff, SWEEP_BATCH).await {
            Ok(stale) => stale,
            Err(e) => {
                error!("Failed to list stale pending bookings: {}", e);
                continue;
            }
        };

        for booking in stale {
            match engine.settle(&booking.transaction_id, None).await {
                Ok(outcome) if outcome.newly_settled => {
                    info!(
                        "Swept booking {} to {}",
                        outcome.transaction_id, outcome.status
                    );
                }
                Ok(_) => {} // Provider still reports pending.
                Err(e) => {
                    error!(
                        "Sweep settlement failed for {}: {}",
                        booking.transaction_id, e
                    );
                }
            }
        }
    }
}
