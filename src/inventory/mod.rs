//! Seat inventory: the one component allowed to mutate seat state.
//!
//! Each event owns a single [`EventInventory`] aggregate holding the
//! `sold` and `reserved` coordinate sets. The [`InventoryRegistry`]
//! guards every aggregate with its own mutex, so the check-then-mutate
//! sequence of a claim is atomic per event while claims against
//! different events never block each other.

pub mod coord;
pub mod error;

pub use coord::SeatCoord;
pub use error::InventoryError;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::models::EventStatus;

/// Read-only snapshot of one event's occupancy. `version` counts
/// mutations to the seat sets; a snapshot is current exactly while the
/// inventory still reports the same version.
#[derive(Debug, Clone, Serialize)]
pub struct Occupancy {
    pub rows: u16,
    pub cols: u16,
    pub version: u64,
    pub sold: Vec<SeatCoord>,
    pub reserved: Vec<SeatCoord>,
}

/// Outcome of a successful claim.
#[derive(Debug, Clone)]
pub struct Claim {
    pub seats: Vec<SeatCoord>,
    pub total_price: i64,
}

/// Seat state for one event. Invariants held at all times:
/// `sold` and `reserved` are disjoint, and every stored coordinate is
/// within the grid.
#[derive(Debug)]
pub struct EventInventory {
    rows: u16,
    cols: u16,
    price: i64,
    status: EventStatus,
    version: u64,
    sold: BTreeSet<SeatCoord>,
    reserved: BTreeSet<SeatCoord>,
}

impl EventInventory {
    pub fn new(rows: u16, cols: u16, price: i64, status: EventStatus) -> Self {
        Self {
            rows,
            cols,
            price,
            status,
            version: 0,
            sold: BTreeSet::new(),
            reserved: BTreeSet::new(),
        }
    }

    /// Validates a seat selection: non-empty, duplicate-free, in bounds.
    /// Runs before any conflict check so malformed requests never reach it.
    fn validate(&self, seats: &[SeatCoord]) -> Result<(), InventoryError> {
        if seats.is_empty() {
            return Err(InventoryError::InvalidSeat("empty seat selection".into()));
        }
        let mut seen = BTreeSet::new();
        for seat in seats {
            if !seat.in_bounds(self.rows, self.cols) {
                return Err(InventoryError::InvalidSeat(format!(
                    "{seat} is outside the {}x{} grid",
                    self.rows, self.cols
                )));
            }
            if !seen.insert(*seat) {
                return Err(InventoryError::InvalidSeat(format!("duplicate seat {seat}")));
            }
        }
        Ok(())
    }

    /// Moves every requested seat into `reserved`, or nothing at all.
    /// Returns the total price on success.
    fn claim(&mut self, event_id: i64, seats: &[SeatCoord]) -> Result<i64, InventoryError> {
        self.validate(seats)?;
        if !self.status.accepts_claims() {
            return Err(InventoryError::EventNotBookable(event_id));
        }

        let contested: Vec<SeatCoord> = seats
            .iter()
            .filter(|s| self.sold.contains(s) || self.reserved.contains(s))
            .copied()
            .collect();
        if !contested.is_empty() {
            return Err(InventoryError::SeatConflict { contested });
        }

        // A misconfigured price must fail the claim, not bring the task down.
        let total = (seats.len() as i64)
            .checked_mul(self.price)
            .ok_or_else(|| InventoryError::InvalidSeat("total price overflows".into()))?;

        self.reserved.extend(seats.iter().copied());
        self.version += 1;
        Ok(total)
    }

    /// Reserved -> Sold. All-or-nothing: if any seat is not currently
    /// reserved the whole confirm fails and nothing moves.
    fn confirm(&mut self, seats: &[SeatCoord]) -> Result<(), InventoryError> {
        self.validate(seats)?;

        let stale: Vec<SeatCoord> = seats
            .iter()
            .filter(|s| !self.reserved.contains(s))
            .copied()
            .collect();
        if !stale.is_empty() {
            return Err(InventoryError::InvalidTransition { seats: stale });
        }

        for seat in seats {
            self.reserved.remove(seat);
            self.sold.insert(*seat);
        }
        self.version += 1;
        Ok(())
    }

    /// Reserved|Sold -> Available. Idempotent: seats already available
    /// are skipped, so a retried release is harmless. Returns how many
    /// seats actually changed state.
    fn release(&mut self, seats: &[SeatCoord]) -> usize {
        let mut freed = 0;
        for seat in seats {
            if self.reserved.remove(seat) || self.sold.remove(seat) {
                freed += 1;
            }
        }
        if freed > 0 {
            self.version += 1;
        }
        freed
    }

    fn occupancy(&self) -> Occupancy {
        Occupancy {
            rows: self.rows,
            cols: self.cols,
            version: self.version,
            sold: self.sold.iter().copied().collect(),
            reserved: self.reserved.iter().copied().collect(),
        }
    }

    fn is_unoccupied(&self) -> bool {
        self.sold.is_empty() && self.reserved.is_empty()
    }

    /// Rebuild path: marks seats without a status check, used when
    /// replaying active ledger rows at startup. Out-of-bounds rows in
    /// the ledger indicate drift and are rejected.
    fn restore(&mut self, seats: &[SeatCoord], sold: bool) -> Result<(), InventoryError> {
        for seat in seats {
            if !seat.in_bounds(self.rows, self.cols) {
                return Err(InventoryError::InvalidSeat(format!(
                    "{seat} from ledger is outside the {}x{} grid",
                    self.rows, self.cols
                )));
            }
            if sold {
                self.reserved.remove(seat);
                self.sold.insert(*seat);
            } else if !self.sold.contains(seat) {
                self.reserved.insert(*seat);
            }
        }
        self.version += 1;
        Ok(())
    }
}

/// All live inventories, indexed by event id.
///
/// The outer map is only touched on catalog changes; claims clone the
/// per-event `Arc` and release the map lock before entering the
/// per-event critical section.
#[derive(Default)]
pub struct InventoryRegistry {
    events: RwLock<HashMap<i64, Arc<Mutex<EventInventory>>>>,
}

impl InventoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, event_id: i64, inventory: EventInventory) {
        self.events
            .write()
            .await
            .insert(event_id, Arc::new(Mutex::new(inventory)));
    }

    pub async fn remove(&self, event_id: i64) {
        self.events.write().await.remove(&event_id);
    }

    async fn entry(&self, event_id: i64) -> Result<Arc<Mutex<EventInventory>>, InventoryError> {
        self.events
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or(InventoryError::EventNotFound(event_id))
    }

    /// Atomically claims `seats` for `event_id`. Either every seat moves
    /// to reserved, or the inventory is untouched and the error names
    /// exactly what went wrong.
    pub async fn claim(&self, event_id: i64, seats: &[SeatCoord]) -> Result<Claim, InventoryError> {
        let entry = self.entry(event_id).await?;
        let mut inv = entry.lock().await;
        let total_price = inv.claim(event_id, seats)?;
        Ok(Claim {
            seats: seats.to_vec(),
            total_price,
        })
    }

    pub async fn confirm(&self, event_id: i64, seats: &[SeatCoord]) -> Result<(), InventoryError> {
        let entry = self.entry(event_id).await?;
        let mut inv = entry.lock().await;
        inv.confirm(seats)
    }

    /// Idempotent release; returns the number of seats actually freed.
    pub async fn release(&self, event_id: i64, seats: &[SeatCoord]) -> Result<usize, InventoryError> {
        let entry = self.entry(event_id).await?;
        let mut inv = entry.lock().await;
        Ok(inv.release(seats))
    }

    pub async fn occupancy(&self, event_id: i64) -> Result<Occupancy, InventoryError> {
        let entry = self.entry(event_id).await?;
        let inv = entry.lock().await;
        Ok(inv.occupancy())
    }

    pub async fn set_status(&self, event_id: i64, status: EventStatus) -> Result<(), InventoryError> {
        let entry = self.entry(event_id).await?;
        entry.lock().await.status = status;
        Ok(())
    }

    pub async fn set_price(&self, event_id: i64, price: i64) -> Result<(), InventoryError> {
        let entry = self.entry(event_id).await?;
        entry.lock().await.price = price;
        Ok(())
    }

    /// Changes the grid shape. Refused while any seat is reserved or
    /// sold; shrinking an occupied grid would orphan coordinates.
    pub async fn resize(&self, event_id: i64, rows: u16, cols: u16) -> Result<(), InventoryError> {
        let entry = self.entry(event_id).await?;
        let mut inv = entry.lock().await;
        if !inv.is_unoccupied() {
            return Err(InventoryError::InvalidSeat(format!(
                "cannot resize event {event_id}: seats are already booked"
            )));
        }
        inv.rows = rows;
        inv.cols = cols;
        inv.version += 1;
        Ok(())
    }

    /// Current mutation counter for `event_id`. A cached occupancy
    /// snapshot is only still valid if this matches its `version`.
    pub async fn version(&self, event_id: i64) -> Result<u64, InventoryError> {
        let entry = self.entry(event_id).await?;
        let inv = entry.lock().await;
        Ok(inv.version)
    }

    /// Replays one active ledger row into the inventory (startup rebuild).
    pub async fn restore(
        &self,
        event_id: i64,
        seats: &[SeatCoord],
        sold: bool,
    ) -> Result<(), InventoryError> {
        let entry = self.entry(event_id).await?;
        let mut inv = entry.lock().await;
        inv.restore(seats, sold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn coords(specs: &[&str]) -> Vec<SeatCoord> {
        specs.iter().map(|s| SeatCoord::from_str(s).unwrap()).collect()
    }

    async fn registry_with_event(id: i64, rows: u16, cols: u16, price: i64) -> InventoryRegistry {
        let registry = InventoryRegistry::new();
        registry
            .register(id, EventInventory::new(rows, cols, price, EventStatus::Active))
            .await;
        registry
    }

    #[tokio::test]
    async fn claim_reserves_all_seats_and_prices_them() {
        let registry = registry_with_event(1, 8, 12, 1000).await;

        let claim = registry.claim(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        assert_eq!(claim.total_price, 2000);

        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.reserved, coords(&["R1C1", "R1C2"]));
        assert!(occ.sold.is_empty());
    }

    #[tokio::test]
    async fn overlapping_claim_fails_naming_only_the_contested_seats() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1", "R1C2"])).await.unwrap();

        let err = registry.claim(1, &coords(&["R1C2", "R1C3"])).await.unwrap_err();
        assert_eq!(
            err,
            InventoryError::SeatConflict {
                contested: coords(&["R1C2"])
            }
        );

        // Losing claim must not have touched anything: R1C3 is still free.
        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.reserved, coords(&["R1C1", "R1C2"]));
    }

    #[tokio::test]
    async fn sold_and_reserved_stay_disjoint_across_the_lifecycle() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        registry.confirm(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        registry.claim(1, &coords(&["R2C1"])).await.unwrap();

        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.sold, coords(&["R1C1", "R1C2"]));
        assert_eq!(occ.reserved, coords(&["R2C1"]));
        for seat in &occ.sold {
            assert!(!occ.reserved.contains(seat));
        }
    }

    #[tokio::test]
    async fn confirm_requires_every_seat_to_be_reserved() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();

        let err = registry
            .confirm(1, &coords(&["R1C1", "R1C2"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InventoryError::InvalidTransition {
                seats: coords(&["R1C2"])
            }
        );

        // Nothing moved: R1C1 is still only reserved.
        let occ = registry.occupancy(1).await.unwrap();
        assert!(occ.sold.is_empty());
        assert_eq!(occ.reserved, coords(&["R1C1"]));
    }

    #[tokio::test]
    async fn confirming_a_sold_seat_is_an_invalid_transition() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();
        registry.confirm(1, &coords(&["R1C1"])).await.unwrap();

        let err = registry.confirm(1, &coords(&["R1C1"])).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();

        assert_eq!(registry.release(1, &coords(&["R1C1"])).await.unwrap(), 1);
        assert_eq!(registry.release(1, &coords(&["R1C1"])).await.unwrap(), 0);

        let occ = registry.occupancy(1).await.unwrap();
        assert!(occ.sold.is_empty());
        assert!(occ.reserved.is_empty());
    }

    #[tokio::test]
    async fn release_frees_sold_seats_too() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();
        registry.confirm(1, &coords(&["R1C1"])).await.unwrap();

        assert_eq!(registry.release(1, &coords(&["R1C1"])).await.unwrap(), 1);
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();
    }

    #[tokio::test]
    async fn out_of_bounds_fails_before_any_conflict_check() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();

        // R1C1 is taken, but the bad coordinate must win: InvalidSeat,
        // never SeatConflict.
        let err = registry
            .claim(1, &coords(&["R1C1", "R1C13"]))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeat(_)));

        let err = registry.claim(1, &coords(&["R9C1"])).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeat(_)));
    }

    #[tokio::test]
    async fn empty_and_duplicate_selections_are_invalid() {
        let registry = registry_with_event(1, 8, 12, 1000).await;

        let err = registry.claim(1, &[]).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeat(_)));

        let err = registry.claim(1, &coords(&["R1C1", "R1C1"])).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeat(_)));
    }

    #[tokio::test]
    async fn confirm_then_release_through_the_registry() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.claim(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        registry.confirm(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        assert_eq!(registry.release(1, &coords(&["R1C1", "R1C2"])).await.unwrap(), 2);
        registry.restore(1, &coords(&["R1C1"]), true).await.unwrap();

        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.sold, coords(&["R1C1"]));
        assert!(occ.reserved.is_empty());
    }

    #[tokio::test]
    async fn absurd_price_fails_the_claim_instead_of_panicking() {
        let registry = registry_with_event(1, 8, 12, i64::MAX).await;

        let err = registry.claim(1, &coords(&["R1C1", "R1C2"])).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeat(_)));

        // The failed claim must not have held anything.
        let occ = registry.occupancy(1).await.unwrap();
        assert!(occ.reserved.is_empty());

        // A single seat at the maximum price is still representable.
        let claim = registry.claim(1, &coords(&["R1C1"])).await.unwrap();
        assert_eq!(claim.total_price, i64::MAX);
    }

    #[tokio::test]
    async fn closed_events_reject_claims() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.set_status(1, EventStatus::Closed).await.unwrap();

        let err = registry.claim(1, &coords(&["R1C1"])).await.unwrap_err();
        assert_eq!(err, InventoryError::EventNotBookable(1));
    }

    #[tokio::test]
    async fn version_tracks_mutations_but_not_reads() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        let snapshot = registry.occupancy(1).await.unwrap();
        assert_eq!(registry.version(1).await.unwrap(), snapshot.version);

        // A claim after the snapshot must make it detectably stale.
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();
        assert_ne!(registry.version(1).await.unwrap(), snapshot.version);

        // Reads and no-op releases leave the version alone.
        let v = registry.version(1).await.unwrap();
        registry.occupancy(1).await.unwrap();
        registry.release(1, &coords(&["R5C5"])).await.unwrap();
        assert_eq!(registry.version(1).await.unwrap(), v);

        registry.confirm(1, &coords(&["R1C1"])).await.unwrap();
        registry.release(1, &coords(&["R1C1"])).await.unwrap();
        assert_eq!(registry.version(1).await.unwrap(), v + 2);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let registry = InventoryRegistry::new();
        let err = registry.claim(42, &coords(&["R1C1"])).await.unwrap_err();
        assert_eq!(err, InventoryError::EventNotFound(42));
    }

    #[tokio::test]
    async fn resize_refused_once_seats_are_taken() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.resize(1, 10, 10).await.unwrap();

        registry.claim(1, &coords(&["R1C1"])).await.unwrap();
        let err = registry.resize(1, 20, 20).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSeat(_)));
    }

    #[tokio::test]
    async fn restore_replays_ledger_rows() {
        let registry = registry_with_event(1, 8, 12, 1000).await;
        registry.restore(1, &coords(&["R1C1"]), false).await.unwrap();
        registry.restore(1, &coords(&["R2C1", "R2C2"]), true).await.unwrap();

        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.reserved, coords(&["R1C1"]));
        assert_eq!(occ.sold, coords(&["R2C1", "R2C2"]));

        let err = registry.claim(1, &coords(&["R2C1"])).await.unwrap_err();
        assert!(matches!(err, InventoryError::SeatConflict { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_overlapping_claims_have_exactly_one_winner() {
        use std::sync::Arc as StdArc;
        use tokio::sync::Barrier;

        for _ in 0..50 {
            let registry = StdArc::new(registry_with_event(1, 8, 12, 1000).await);
            let barrier = StdArc::new(Barrier::new(2));

            let a = {
                let registry = registry.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    registry.claim(1, &coords(&["R1C1", "R1C2"])).await
                })
            };
            let b = {
                let registry = registry.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    registry.claim(1, &coords(&["R1C2", "R1C3"])).await
                })
            };

            let (a, b) = (a.await.unwrap(), b.await.unwrap());
            let (winner, loser) = match (a, b) {
                (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
                (Ok(_), Ok(_)) => panic!("both overlapping claims succeeded"),
                (Err(_), Err(_)) => panic!("both overlapping claims failed"),
            };

            assert_eq!(winner.total_price, 2000);
            match loser {
                InventoryError::SeatConflict { contested } => {
                    assert_eq!(contested, coords(&["R1C2"]));
                }
                other => panic!("loser got {other:?}, expected SeatConflict"),
            }
        }
    }

    #[tokio::test]
    async fn full_booking_scenario_on_an_8_by_12_grid() {
        let registry = registry_with_event(1, 8, 12, 1000).await;

        let claim = registry.claim(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        assert_eq!(claim.total_price, 2000);
        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.reserved, coords(&["R1C1", "R1C2"]));

        let err = registry.claim(1, &coords(&["R1C2", "R1C3"])).await.unwrap_err();
        assert_eq!(
            err,
            InventoryError::SeatConflict {
                contested: coords(&["R1C2"])
            }
        );

        registry.confirm(1, &coords(&["R1C1", "R1C2"])).await.unwrap();
        let occ = registry.occupancy(1).await.unwrap();
        assert_eq!(occ.sold, coords(&["R1C1", "R1C2"]));
        assert!(occ.reserved.is_empty());

        registry.release(1, &coords(&["R1C1"])).await.unwrap();
        registry.claim(1, &coords(&["R1C1"])).await.unwrap();
    }
}
