use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::inventory_error;
use crate::inventory::{InventoryError, SeatCoord};
use crate::middleware::AuthUser;
use crate::models::BookingStatus;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/confirm", patch(confirm_booking))
        .route("/bookings/cancel", patch(cancel_booking))
        .route("/bookings/checkin", patch(checkin_booking))
}

/* ---------- helpers ---------- */

/// Parses the wire-form seat list. Malformed coordinates are an
/// InvalidSeat failure before any availability logic runs.
fn parse_seats(raw: &[String]) -> Result<Vec<SeatCoord>, InventoryError> {
    raw.iter()
        .map(|s| s.parse::<SeatCoord>().map_err(InventoryError::from))
        .collect()
}

/* ---------- claim ---------- */

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    pub event_id: i64,
    pub seats: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    pub id: i64,
    pub ticket_code: Uuid,
    pub total_price: i64,
    pub seats: Vec<SeatCoord>,
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Response {
    if req.event_id <= 0 {
        return (StatusCode::BAD_REQUEST, "event_id must be > 0").into_response();
    }

    let seats = match parse_seats(&req.seats) {
        Ok(seats) => seats,
        Err(e) => return inventory_error(&e).into_response(),
    };

    // Atomic check-then-mutate: either every seat is now reserved for
    // this caller, or the inventory is untouched.
    let claim = match state.registry.claim(req.event_id, &seats).await {
        Ok(claim) => claim,
        Err(e) => return inventory_error(&e).into_response(),
    };

    // Ledger write happens outside the critical section. If it fails the
    // claim is compensated, so no seat stays held without a booking row.
    let booking = match state
        .ledger
        .record_claim(req.event_id, user.user_id, &claim.seats, claim.total_price)
        .await
    {
        Ok(booking) => booking,
        Err(e) => {
            tracing::error!("failed to record booking, rolling back claim: {:?}", e);
            let _ = state.registry.release(req.event_id, &claim.seats).await;
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to record booking").into_response();
        }
    };

    state.cache.invalidate_occupancy(req.event_id).await;

    (
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            id: booking.id,
            ticket_code: booking.ticket_code,
            total_price: booking.amount,
            seats: claim.seats,
        }),
    )
        .into_response()
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bookings = state.ledger.for_user(user.user_id).await.map_err(|e| {
        tracing::error!("get_user_bookings sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve bookings".to_string())
    })?;
    Ok(Json(bookings))
}

/* ---------- confirm / cancel / check-in ---------- */

#[derive(Debug, Deserialize)]
struct BookingActionRequest {
    pub booking_id: i64,
}

// PATCH /api/bookings/confirm — payment recorded; seats go reserved -> sold.
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<BookingActionRequest>,
) -> Response {
    let booking = match load_owned_booking(&state, req.booking_id, &user).await {
        Ok(booking) => booking,
        Err(resp) => return resp,
    };

    // The conditional ledger update is the arbiter against the cleanup
    // sweep: whoever transitions the row first wins, the loser backs off.
    let moved = state
        .ledger
        .transition(booking.id, &[BookingStatus::Pending], BookingStatus::Paid)
        .await
        .unwrap_or(false);
    if !moved {
        return (
            StatusCode::CONFLICT,
            "Booking is not pending; the hold may have expired",
        )
            .into_response();
    }

    let seats = match booking.seat_coords() {
        Ok(seats) => seats,
        Err(e) => {
            tracing::error!("booking {} has corrupt seats: {}", booking.id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Corrupt booking").into_response();
        }
    };

    if let Err(e) = state.registry.confirm(booking.event_id, &seats).await {
        // Ledger says paid but seats did not move; put the row back so
        // the two never disagree.
        tracing::error!("confirm failed for booking {}: {}", booking.id, e);
        let _ = state
            .ledger
            .transition(booking.id, &[BookingStatus::Paid], BookingStatus::Pending)
            .await;
        return inventory_error(&e).into_response();
    }

    state.cache.invalidate_occupancy(booking.event_id).await;
    Json(serde_json::json!({ "message": "Booking confirmed", "booking_id": booking.id }))
        .into_response()
}

// PATCH /api/bookings/cancel — release seats; idempotent.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<BookingActionRequest>,
) -> Response {
    let booking = match load_owned_booking(&state, req.booking_id, &user).await {
        Ok(booking) => booking,
        Err(resp) => return resp,
    };

    if booking.status == BookingStatus::CheckedIn {
        return (StatusCode::CONFLICT, "Cannot cancel a checked-in booking").into_response();
    }

    let moved = state
        .ledger
        .transition(
            booking.id,
            &[BookingStatus::Pending, BookingStatus::Paid],
            BookingStatus::Cancelled,
        )
        .await
        .unwrap_or(false);

    // Already cancelled is fine: release below is a no-op and the caller
    // can safely retry.
    if moved || booking.status == BookingStatus::Cancelled {
        let seats = match booking.seat_coords() {
            Ok(seats) => seats,
            Err(e) => {
                tracing::error!("booking {} has corrupt seats: {}", booking.id, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Corrupt booking").into_response();
            }
        };
        match state.registry.release(booking.event_id, &seats).await {
            Ok(_) => {
                state.cache.invalidate_occupancy(booking.event_id).await;
            }
            Err(InventoryError::EventNotFound(_)) => {
                // Event deleted after the booking; nothing left to free.
            }
            Err(e) => return inventory_error(&e).into_response(),
        }
        Json(serde_json::json!({ "message": "Booking cancelled", "booking_id": booking.id }))
            .into_response()
    } else {
        (StatusCode::CONFLICT, "Booking state changed; refresh and retry").into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CheckinRequest {
    pub ticket_code: Uuid,
}

// PATCH /api/bookings/checkin — QR scan at the door; seats stay sold.
async fn checkin_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CheckinRequest>,
) -> Response {
    if !user.is_admin {
        return (StatusCode::FORBIDDEN, "Admin access required").into_response();
    }

    let booking = match state.ledger.find_by_ticket(req.ticket_code).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return (StatusCode::NOT_FOUND, "Ticket not found").into_response(),
        Err(e) => {
            tracing::error!("checkin lookup error: {:?}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to look up ticket").into_response();
        }
    };

    let moved = state
        .ledger
        .transition(booking.id, &[BookingStatus::Paid], BookingStatus::CheckedIn)
        .await
        .unwrap_or(false);
    if !moved {
        return (
            StatusCode::CONFLICT,
            "Ticket is not paid or was already checked in",
        )
            .into_response();
    }

    Json(serde_json::json!({
        "message": "Checked in",
        "booking_id": booking.id,
        "event_id": booking.event_id,
        "seats": booking.seats,
    }))
    .into_response()
}

/// Loads a booking and enforces ownership: the booking's user, or an admin.
async fn load_owned_booking(
    state: &Arc<AppState>,
    booking_id: i64,
    user: &AuthUser,
) -> Result<crate::models::Booking, Response> {
    if booking_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "booking_id must be > 0").into_response());
    }
    let booking = state
        .ledger
        .find(booking_id)
        .await
        .map_err(|e| {
            tracing::error!("booking lookup error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to look up booking").into_response()
        })?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Booking not found").into_response())?;

    if booking.user_id != user.user_id && !user.is_admin {
        return Err((StatusCode::FORBIDDEN, "Booking does not belong to you").into_response());
    }
    Ok(booking)
}
