use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::inventory_error;
use crate::inventory::EventInventory;
use crate::middleware::AuthUser;
use crate::models::{Event, EventStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/seats", get(get_occupancy))
}

/* ---------- catalog CRUD ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: NaiveDateTime,
    #[validate(range(min = 1, max = 500))]
    pub seat_rows: u16,
    #[validate(range(min = 1, max = 500))]
    pub seat_cols: u16,
    #[validate(range(min = 0, max = 1_000_000_000_000i64))]
    pub price: i64,
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !user.is_admin {
        return Err((StatusCode::FORBIDDEN, "Admin access required".to_string()));
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (title, description, venue, starts_at, seat_rows, seat_cols, price, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'upcoming')
        RETURNING *
        "#,
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.venue)
    .bind(req.starts_at)
    .bind(req.seat_rows as i32)
    .bind(req.seat_cols as i32)
    .bind(req.price)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_event sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create event".to_string())
    })?;

    // Fresh inventory, empty occupancy, same grid shape as the row.
    state
        .registry
        .register(
            event.id,
            EventInventory::new(req.seat_rows, req.seat_cols, req.price, EventStatus::Upcoming),
        )
        .await;

    Ok((StatusCode::CREATED, Json(event)))
}

/// Paging math in i64, the width it is bound at. `u32` arithmetic here
/// overflows on attacker-chosen page numbers.
fn page_offset(page: u32, page_size: u32) -> i64 {
    (page.max(1) as i64 - 1) * page_size as i64
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50);
    let offset = page_offset(page, page_size);
    let pattern = format!("%{}%", params.query.as_deref().unwrap_or_default());

    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT * FROM events
        WHERE title ILIKE $1
        ORDER BY starts_at
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_events sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve events".to_string())
    })?;

    Ok(Json(json!({ "events": events, "count": events.len() })))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("get_event sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve event".to_string())
        })?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Event not found".to_string()))?;

    Ok(Json(event))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: Option<NaiveDateTime>,
    #[validate(range(min = 1, max = 500))]
    pub seat_rows: Option<u16>,
    #[validate(range(min = 1, max = 500))]
    pub seat_cols: Option<u16>,
    #[validate(range(min = 0, max = 1_000_000_000_000i64))]
    pub price: Option<i64>,
    pub status: Option<EventStatus>,
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Response {
    if !user.is_admin {
        return (StatusCode::FORBIDDEN, "Admin access required").into_response();
    }
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    let current = match sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await
    {
        Ok(Some(event)) => event,
        Ok(None) => return (StatusCode::NOT_FOUND, "Event not found").into_response(),
        Err(e) => {
            tracing::error!("update_event sql error: {:?}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve event").into_response();
        }
    };

    // Grid changes go through the registry first: it refuses the resize
    // atomically while any seat is reserved or sold.
    let rows = req.seat_rows.unwrap_or(current.seat_rows as u16);
    let cols = req.seat_cols.unwrap_or(current.seat_cols as u16);
    let grid_changed = rows as i32 != current.seat_rows || cols as i32 != current.seat_cols;
    if grid_changed {
        if let Err(e) = state.registry.resize(id, rows, cols).await {
            return inventory_error(&e).into_response();
        }
    }

    let updated = sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET title = $1, description = $2, venue = $3, starts_at = $4,
            seat_rows = $5, seat_cols = $6, price = $7, status = $8
        WHERE id = $9
        RETURNING *
        "#,
    )
    .bind(req.title.clone().unwrap_or_else(|| current.title.clone()))
    .bind(req.description.clone().or_else(|| current.description.clone()))
    .bind(req.venue.clone().or_else(|| current.venue.clone()))
    .bind(req.starts_at.unwrap_or(current.starts_at))
    .bind(rows as i32)
    .bind(cols as i32)
    .bind(req.price.unwrap_or(current.price))
    .bind(req.status.unwrap_or(current.status))
    .bind(id)
    .fetch_one(&state.db.pool)
    .await;

    let updated = match updated {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("update_event sql error: {:?}", e);
            // Undo the registry resize so inventory and catalog agree.
            if grid_changed {
                let _ = state
                    .registry
                    .resize(id, current.seat_rows as u16, current.seat_cols as u16)
                    .await;
            }
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update event").into_response();
        }
    };

    // Write price/status through to the live inventory.
    if let Some(price) = req.price {
        let _ = state.registry.set_price(id, price).await;
    }
    if let Some(status) = req.status {
        let _ = state.registry.set_status(id, status).await;
    }
    if grid_changed {
        state.cache.invalidate_occupancy(id).await;
    }

    Json(updated).into_response()
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !user.is_admin {
        return Err((StatusCode::FORBIDDEN, "Admin access required".to_string()));
    }

    let cancelled = state.ledger.cancel_open_for_event(id).await.map_err(|e| {
        tracing::error!("delete_event ledger error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to cancel bookings".to_string())
    })?;

    let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .map_err(|e| {
            tracing::error!("delete_event sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete event".to_string())
        })?;

    if !deleted {
        return Err((StatusCode::NOT_FOUND, "Event not found".to_string()));
    }

    // Inventory dies with the event.
    state.registry.remove(id).await;
    state.cache.invalidate_occupancy(id).await;

    Ok(Json(json!({
        "message": "Event deleted",
        "cancelled_bookings": cancelled.len()
    })))
}

/* ---------- occupancy ---------- */

#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    pub event_id: i64,
}

/// Seat-map read for the frontend grid. Snapshot comes from the registry;
/// redis only caches the serialized form.
async fn get_occupancy(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OccupancyQuery>,
) -> Response {
    if params.event_id <= 0 {
        return (StatusCode::BAD_REQUEST, "event_id must be > 0").into_response();
    }

    if let Some(cached) = state.cache.get_occupancy(params.event_id).await {
        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "HIT")
            .body(Body::from(cached))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    let occupancy = match state.registry.occupancy(params.event_id).await {
        Ok(occ) => occ,
        Err(e) => return inventory_error(&e).into_response(),
    };

    match serde_json::to_string(&occupancy) {
        Ok(json_str) => {
            // Only cache if no claim/release slipped in after the
            // snapshot; re-caching a stale snapshot would undo that
            // mutation's invalidation for a full TTL.
            if state.registry.version(params.event_id).await == Ok(occupancy.version) {
                state.cache.cache_occupancy(params.event_id, &json_str).await;
            }
            Response::builder()
                .header("Content-Type", "application/json")
                .header("X-Cache", "MISS")
                .body(Body::from(json_str))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            tracing::error!("failed to serialize occupancy: {:?}", e);
            Json(occupancy).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::page_offset;

    #[test]
    fn page_offset_survives_extreme_page_numbers() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        // u32::MAX pages at the largest page size stays in range.
        assert_eq!(page_offset(u32::MAX, 50), (u32::MAX as i64 - 1) * 50);
    }
}
