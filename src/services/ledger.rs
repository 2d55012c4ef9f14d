use sqlx::Row;
use uuid::Uuid;

use crate::database::Database;
use crate::inventory::SeatCoord;
use crate::models::{Booking, BookingStatus};

/// System of record for who booked what and at what price. The ledger
/// never adjudicates seat availability; that already happened in the
/// inventory registry by the time a row is written here.
#[derive(Clone)]
pub struct BookingLedger {
    db: Database,
}

impl BookingLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Writes the booking produced by a successful claim, status pending.
    pub async fn record_claim(
        &self,
        event_id: i64,
        user_id: i32,
        seats: &[SeatCoord],
        amount: i64,
    ) -> Result<Booking, sqlx::Error> {
        let seat_strings: Vec<String> = seats.iter().map(|s| s.to_string()).collect();
        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (event_id, user_id, seats, amount, status, ticket_code)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(&seat_strings)
        .bind(amount)
        .bind(Uuid::new_v4())
        .fetch_one(&self.db.pool)
        .await
    }

    pub async fn find(&self, booking_id: i64) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.db.pool)
            .await
    }

    pub async fn find_by_ticket(&self, ticket_code: Uuid) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE ticket_code = $1")
            .bind(ticket_code)
            .fetch_optional(&self.db.pool)
            .await
    }

    pub async fn for_user(&self, user_id: i32) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await
    }

    /// Conditional status transition: succeeds only if the row is
    /// currently in one of `from`. Returns whether a row changed, so
    /// callers can tell a stale transition from a missing booking.
    pub async fn transition(
        &self,
        booking_id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<bool, sqlx::Error> {
        let from_values: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let res = sqlx::query("UPDATE bookings SET status = $1 WHERE id = $2 AND status = ANY($3)")
            .bind(to.as_str())
            .bind(booking_id)
            .bind(from_values)
            .execute(&self.db.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Every non-cancelled booking; replayed into the inventory registry
    /// at startup so ledger and inventory agree after a restart.
    pub async fn active_bookings(&self) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE status <> 'cancelled'")
            .fetch_all(&self.db.pool)
            .await
    }

    /// Pending bookings whose reservation hold has outlived the TTL.
    pub async fn expired_pending(&self, ttl_seconds: u64) -> Result<Vec<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE status = 'pending'
              AND created_at < NOW() - ($1 * interval '1 second')
            "#,
        )
        .bind(ttl_seconds as i64)
        .fetch_all(&self.db.pool)
        .await
    }

    /// Cancels every open booking for an event (event deletion path).
    /// Returns the ids that were cancelled.
    pub async fn cancel_open_for_event(&self, event_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            UPDATE bookings SET status = 'cancelled'
            WHERE event_id = $1 AND status <> 'cancelled'
            RETURNING id
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }
}
