use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingEventKind, BookingStatus, BusinessHours, Service, Shop};
use crate::state::AppState;

use super::{booking_json, check_auth, emit_event};

fn shop_json(shop: &Shop) -> serde_json::Value {
    json!({
        "id": shop.id,
        "name": shop.name,
        "hours": shop.hours,
        "bay_count": shop.bay_count,
        "slot_minutes": shop.slot_minutes,
        "auto_confirm": shop.auto_confirm,
        "active": shop.active,
    })
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub shop_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_all_bookings(&db, query.shop_id.as_deref(), query.status.as_deref(), limit)?
    };

    let response: Vec<serde_json::Value> = bookings.iter().map(booking_json).collect();
    Ok(Json(json!(response)))
}

// POST /api/admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        let booking = queries::get_booking_by_id(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        queries::update_booking_status(&db, &id, &BookingStatus::Cancelled)?;
        booking
    };

    emit_event(&state, &booking, BookingEventKind::Cancelled);
    Ok(Json(json!({ "ok": true })))
}

// POST /api/admin/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        let booking = queries::get_booking_by_id(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::Validation(
                "cannot confirm a cancelled booking".to_string(),
            ));
        }
        queries::update_booking_status(&db, &id, &BookingStatus::Confirmed)?;
        booking
    };

    emit_event(&state, &booking, BookingEventKind::Confirmed);
    Ok(Json(json!({ "ok": true })))
}

// POST /api/admin/shops (tenant onboarding)
#[derive(Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
    pub hours: Option<BusinessHours>,
    pub bay_count: Option<i64>,
    pub slot_minutes: Option<i64>,
    pub auto_confirm: Option<bool>,
}

pub async fn create_shop(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateShopRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("shop name is required".to_string()));
    }
    let hours = match request.hours {
        Some(hours) => revalidated(hours)?,
        None => BusinessHours { days: vec![] },
    };

    let now = Utc::now().naive_utc();
    let shop = Shop {
        id: uuid::Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        hours,
        bay_count: request.bay_count.unwrap_or(1).max(1),
        slot_minutes: request.slot_minutes.unwrap_or(60).max(5),
        auto_confirm: request.auto_confirm.unwrap_or(false),
        active: true,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_shop(&db, &shop)?;
    }

    tracing::info!(shop_id = %shop.id, name = %shop.name, "shop onboarded");
    Ok(Json(shop_json(&shop)))
}

// GET /api/admin/shops/:id/settings
pub async fn get_shop_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let shop = {
        let db = state.db.lock().unwrap();
        queries::get_shop(&db, &id)?.ok_or_else(|| AppError::ShopNotFound(id.clone()))?
    };
    Ok(Json(shop_json(&shop)))
}

// POST /api/admin/shops/:id/settings
// Partial update; absent fields keep their committed value. There is no
// delete: `active = false` retires a shop while its booking history stays.
#[derive(Deserialize)]
pub struct UpdateShopSettingsRequest {
    pub name: Option<String>,
    pub hours: Option<BusinessHours>,
    pub bay_count: Option<i64>,
    pub slot_minutes: Option<i64>,
    pub auto_confirm: Option<bool>,
    pub active: Option<bool>,
}

pub async fn update_shop_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<UpdateShopSettingsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let shop = {
        let db = state.db.lock().unwrap();
        let mut shop =
            queries::get_shop(&db, &id)?.ok_or_else(|| AppError::ShopNotFound(id.clone()))?;

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("shop name cannot be empty".to_string()));
            }
            shop.name = name.trim().to_string();
        }
        if let Some(hours) = request.hours {
            shop.hours = revalidated(hours)?;
        }
        if let Some(bay_count) = request.bay_count {
            if bay_count < 1 {
                return Err(AppError::Validation("bay count must be at least 1".to_string()));
            }
            shop.bay_count = bay_count;
        }
        if let Some(slot_minutes) = request.slot_minutes {
            if slot_minutes < 5 {
                return Err(AppError::Validation(
                    "slot granularity must be at least 5 minutes".to_string(),
                ));
            }
            shop.slot_minutes = slot_minutes;
        }
        if let Some(auto_confirm) = request.auto_confirm {
            shop.auto_confirm = auto_confirm;
        }
        if let Some(active) = request.active {
            shop.active = active;
        }

        queries::update_shop(&db, &shop)?;
        shop
    };

    Ok(Json(shop_json(&shop)))
}

/// Hours arrive already deserialized; run them back through the JSON
/// validator so malformed weekdays or inverted windows are refused here
/// rather than at the next availability query.
fn revalidated(hours: BusinessHours) -> Result<BusinessHours, AppError> {
    let json = hours.to_json()?;
    BusinessHours::from_json(&json).map_err(|e| AppError::Validation(e.to_string()))
}

// GET /api/admin/shops/:id/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let services = {
        let db = state.db.lock().unwrap();
        queries::get_shop(&db, &id)?.ok_or_else(|| AppError::ShopNotFound(id.clone()))?;
        queries::list_services(&db, &id)?
    };
    Ok(Json(json!(services)))
}

// POST /api/admin/shops/:id/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: Option<i64>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("service name is required".to_string()));
    }
    if request.duration_minutes < 1 {
        return Err(AppError::Validation(
            "service duration must be positive".to_string(),
        ));
    }

    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        shop_id: id.clone(),
        name: request.name.trim().to_string(),
        duration_minutes: request.duration_minutes,
        price_cents: request.price_cents,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::get_shop(&db, &id)?.ok_or_else(|| AppError::ShopNotFound(id.clone()))?;
        queries::create_service(&db, &service)?;
    }

    Ok(Json(json!(service)))
}

// GET /api/admin/events (SSE stream of booking events)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Auth via query param (EventSource can't set headers)
    let token = query.token.as_deref().unwrap_or("");
    if token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    let rx = state.events_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("booking_event")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}
