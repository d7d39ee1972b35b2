use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::slot::parse_hhmm;
use crate::models::{BookingEventKind, Shop};
use crate::services::availability;
use crate::services::booking::{self, BookingRequest};
use crate::services::slots::BookingPolicy;
use crate::state::AppState;

use super::{dispatch_confirmation, emit_event};

const AVAILABILITY_FAILED: &str = "Failed to load availability. Please try again.";
const BOOKING_FAILED: &str = "Failed to create booking. Please try again.";

fn rpc_data(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(json!({ "result": { "data": data } }))
}

/// Public callers get one fixed message per path; the actual cause goes to
/// the log only. Staff endpoints are the ones allowed to see real errors.
fn public_failure(err: AppError, message: &'static str) -> Response {
    tracing::warn!(error = %err, "public booking endpoint failed");
    (err.status_code(), Json(json!({ "error": message }))).into_response()
}

fn load_active_shop(conn: &rusqlite::Connection, shop_id: &str) -> Result<Shop, AppError> {
    queries::get_shop(conn, shop_id)?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::ShopNotFound(shop_id.to_string()))
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {s}")))
}

// POST /public.availability
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub shop_id: String,
    pub date: String,
    pub service_type: String,
    pub service_duration: i64,
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    match compute_availability(&state, &request) {
        Ok(slots) => Ok(rpc_data(json!({ "slots": slots }))),
        Err(e) => Err(public_failure(e, AVAILABILITY_FAILED)),
    }
}

fn compute_availability(
    state: &AppState,
    request: &AvailabilityRequest,
) -> Result<Vec<String>, AppError> {
    if request.service_type.trim().is_empty() {
        return Err(AppError::Validation("service type is required".to_string()));
    }
    if request.service_duration <= 0 || request.service_duration > 24 * 60 {
        return Err(AppError::Validation(format!(
            "invalid service duration: {}",
            request.service_duration
        )));
    }
    let date = parse_date(&request.date)?;
    let today = Local::now().date_naive();

    let db = state.db.lock().unwrap();
    let shop = load_active_shop(&db, &request.shop_id)?;
    let open = availability::available_slots(
        &db,
        &shop,
        date,
        request.service_duration,
        today,
        BookingPolicy::PUBLIC,
    )?;

    Ok(open.iter().map(|slot| slot.start_label()).collect())
}

// POST /public.createBooking
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBookingRequest {
    pub shop_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub vehicle_registration: Option<String>,
    pub service_type: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub notes: Option<String>,
    pub captcha_token: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublicBookingRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    // CAPTCHA first, before any database work. An empty configured secret
    // disables the check (local development, tests).
    if !state.config.captcha_secret.is_empty() {
        let token = request.captcha_token.as_deref().unwrap_or("");
        match state.captcha.verify(token).await {
            Ok(true) => {}
            Ok(false) => return Err(public_failure(AppError::Captcha, BOOKING_FAILED)),
            Err(e) => return Err(public_failure(AppError::Internal(e), BOOKING_FAILED)),
        }
    }

    let booking_request = build_request(&request).map_err(|e| public_failure(e, BOOKING_FAILED))?;
    let today = Local::now().date_naive();

    let result = {
        let mut db = state.db.lock().unwrap();
        booking::create_booking(&mut db, &booking_request, today, BookingPolicy::PUBLIC)
    };

    match result {
        Ok((booking, shop)) => {
            emit_event(&state, &booking, BookingEventKind::Created);
            dispatch_confirmation(&state, &booking, &shop);
            Ok(rpc_data(json!({ "success": true })))
        }
        Err(e) => Err(public_failure(e, BOOKING_FAILED)),
    }
}

fn build_request(request: &PublicBookingRequest) -> Result<BookingRequest, AppError> {
    let date = parse_date(&request.preferred_date)?;
    let start_time = parse_hhmm(&request.preferred_time)
        .map_err(|_| AppError::Validation(format!("invalid time: {}", request.preferred_time)))?;

    Ok(BookingRequest {
        shop_id: request.shop_id.clone(),
        customer_name: request.customer_name.clone(),
        customer_phone: request.customer_phone.clone(),
        // Email is optional on the public widget, unlike the staff path.
        customer_email: request.customer_email.clone(),
        vehicle_registration: request.vehicle_registration.clone(),
        service_name: request.service_type.clone(),
        date,
        start_time,
        notes: request.notes.clone(),
    })
}

// POST /public.getShopInfo
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopInfoRequest {
    pub shop_id: String,
}

pub async fn get_shop_info(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ShopInfoRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let loaded = {
        let db = state.db.lock().unwrap();
        load_active_shop(&db, &request.shop_id)
            .and_then(|shop| Ok((queries::list_services(&db, &shop.id)?, shop)))
    };

    match loaded {
        Ok((services, shop)) => {
            let services: Vec<serde_json::Value> = services
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "name": s.name,
                        "durationMinutes": s.duration_minutes,
                    })
                })
                .collect();
            Ok(rpc_data(json!({ "name": shop.name, "services": services })))
        }
        Err(e) => Err(public_failure(e, AVAILABILITY_FAILED)),
    }
}
