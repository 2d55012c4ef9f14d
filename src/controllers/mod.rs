pub mod bookings;
pub mod events;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::inventory::InventoryError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(bookings::routes())
}

/// Maps inventory failures onto HTTP responses. Conflict bodies carry the
/// exact contested coordinates so the frontend can re-render the seat map
/// instead of showing a generic failure.
pub(crate) fn inventory_error(err: &InventoryError) -> (StatusCode, Json<Value>) {
    match err {
        InventoryError::EventNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "event_not_found", "event_id": id })),
        ),
        InventoryError::EventNotBookable(id) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "event_not_bookable", "event_id": id })),
        ),
        InventoryError::InvalidSeat(detail) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_seat", "detail": detail })),
        ),
        InventoryError::SeatConflict { contested } => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "seat_conflict", "contested": contested })),
        ),
        InventoryError::InvalidTransition { seats } => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "invalid_transition", "seats": seats })),
        ),
    }
}
