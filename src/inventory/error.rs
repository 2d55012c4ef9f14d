use super::coord::{ParseSeatError, SeatCoord};

fn join(coords: &[SeatCoord]) -> String {
    coords
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything a seat-inventory operation can fail with. All variants are
/// terminal and synchronous; the inventory never retries on the caller's
/// behalf.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// No inventory registered for this event id.
    #[error("event {0} not found")]
    EventNotFound(i64),

    /// Event status is closed; no new claims accepted.
    #[error("event {0} is not accepting bookings")]
    EventNotBookable(i64),

    /// Malformed coordinate, out-of-bounds, duplicate, empty selection,
    /// or a grid-shape configuration error. Caller bug, never retried.
    #[error("invalid seat selection: {0}")]
    InvalidSeat(String),

    /// A claim lost the race: some requested seats are already taken.
    /// Carries exactly the contested coordinates so the caller can
    /// re-render availability and let the user pick again.
    #[error("seats already taken: {}", join(.contested))]
    SeatConflict { contested: Vec<SeatCoord> },

    /// Confirm attempted on seats that are not currently reserved.
    /// Indicates a stale client view or a workflow bug.
    #[error("seats not in a confirmable state: {}", join(.seats))]
    InvalidTransition { seats: Vec<SeatCoord> },
}

impl From<ParseSeatError> for InventoryError {
    fn from(e: ParseSeatError) -> Self {
        InventoryError::InvalidSeat(e.to_string())
    }
}
