use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::AppState;

/// Releases reservation holds that were never confirmed. The inventory
/// itself owns no timer; this sweep is the timeout policy that calls
/// release on its behalf.
pub struct CleanupService {
    state: Arc<AppState>,
}

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Loops forever, sweeping at the configured interval.
    pub async fn run(self) {
        let interval = Duration::from_secs(self.state.config.booking.cleanup_interval_seconds);
        loop {
            self.sweep_expired_holds().await;
            tokio::time::sleep(interval).await;
        }
    }

    /// One sweep: cancel every pending booking older than the hold TTL
    /// and free its seats.
    pub async fn sweep_expired_holds(&self) {
        let ttl = self.state.config.booking.hold_ttl_seconds;
        let expired = match self.state.ledger.expired_pending(ttl).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("cleanup: failed to query expired holds: {:?}", e);
                return;
            }
        };

        if expired.is_empty() {
            return;
        }
        info!("cleanup: found {} expired holds", expired.len());

        for booking in expired {
            // Cancel in the ledger first; if payment confirmed the
            // booking in the meantime the conditional update loses and
            // the seats stay sold.
            let cancelled = self
                .state
                .ledger
                .transition(
                    booking.id,
                    &[crate::models::BookingStatus::Pending],
                    crate::models::BookingStatus::Cancelled,
                )
                .await
                .unwrap_or(false);
            if !cancelled {
                continue;
            }

            let seats = match booking.seat_coords() {
                Ok(seats) => seats,
                Err(e) => {
                    warn!("cleanup: booking {} has corrupt seats: {}", booking.id, e);
                    continue;
                }
            };

            match self.state.registry.release(booking.event_id, &seats).await {
                Ok(freed) => {
                    self.state.cache.invalidate_occupancy(booking.event_id).await;
                    info!(
                        "cleanup: expired hold {} released, {} seats freed",
                        booking.id, freed
                    );
                }
                Err(e) => {
                    // Event may have been deleted between query and release.
                    warn!("cleanup: could not release booking {}: {}", booking.id, e);
                }
            }
        }
    }
}
