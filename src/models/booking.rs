use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::inventory::coord::{ParseSeatError, SeatCoord};

/// Ledger status of a booking.
///
/// `Pending` corresponds to a reservation hold on the seats; `Paid` and
/// `CheckedIn` to sold seats. `Cancelled` bookings hold no seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Paid,
    CheckedIn,
    Cancelled,
}

impl BookingStatus {
    /// Whether a booking in this status still holds seats in the inventory.
    pub fn holds_seats(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    /// Whether the held seats count as sold rather than reserved.
    pub fn seats_are_sold(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::CheckedIn)
    }

    /// The TEXT value stored in the bookings table.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i32,
    /// Seat coordinates in `R<row>C<col>` form, as claimed.
    pub seats: Vec<String>,
    /// Total charged, `seats.len() * event.price`, in minor units.
    pub amount: i64,
    pub status: BookingStatus,
    /// Opaque code printed into the QR ticket.
    pub ticket_code: Uuid,
    pub created_at: NaiveDateTime,
}

impl Booking {
    /// Parses the stored seat strings back into coordinates. A parse
    /// failure here means the ledger was written by something other than
    /// a successful claim.
    pub fn seat_coords(&self) -> Result<Vec<SeatCoord>, ParseSeatError> {
        self.seats.iter().map(|s| s.parse()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn booking(seats: &[&str], status: BookingStatus) -> Booking {
        Booking {
            id: 1,
            event_id: 1,
            user_id: 7,
            seats: seats.iter().map(|s| s.to_string()).collect(),
            amount: 1000,
            status,
            ticket_code: Uuid::nil(),
            created_at: NaiveDate::from_ymd_opt(2026, 1, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn ledger_status_maps_onto_seat_state() {
        assert!(booking(&["R1C1"], BookingStatus::Pending).status.holds_seats());
        assert!(!booking(&["R1C1"], BookingStatus::Pending).status.seats_are_sold());
        assert!(booking(&["R1C1"], BookingStatus::Paid).status.seats_are_sold());
        assert!(booking(&["R1C1"], BookingStatus::CheckedIn).status.seats_are_sold());
        assert!(!booking(&["R1C1"], BookingStatus::Cancelled).status.holds_seats());
    }

    #[test]
    fn stored_seats_parse_back_to_coordinates() {
        let b = booking(&["R3C12", "R3C13"], BookingStatus::Pending);
        let coords = b.seat_coords().unwrap();
        assert_eq!(coords, vec![SeatCoord::new(3, 12), SeatCoord::new(3, 13)]);

        let corrupt = booking(&["seat-9"], BookingStatus::Pending);
        assert!(corrupt.seat_coords().is_err());
    }
}
