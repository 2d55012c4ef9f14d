use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of an event. Only `Upcoming` and `Active` accept new claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Active,
    Closed,
}

impl EventStatus {
    pub fn accepts_claims(&self) -> bool {
        matches!(self, EventStatus::Upcoming | EventStatus::Active)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: NaiveDateTime,
    /// Grid shape; seats are addressed `R<row>C<col>`, 1-based.
    pub seat_rows: i32,
    pub seat_cols: i32,
    /// Price per seat in minor currency units.
    pub price: i64,
    pub status: EventStatus,
}
