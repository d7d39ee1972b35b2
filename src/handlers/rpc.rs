use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::models::slot::parse_hhmm;
use crate::models::BookingEventKind;
use crate::services::booking::{self, BookingRequest};
use crate::services::slots::BookingPolicy;
use crate::state::AppState;

use super::{booking_json, check_auth, dispatch_confirmation, emit_event};

// POST /rpc/booking.create
// Staff booking path. Same writer as the public widget, but same-day
// bookings are allowed, email is mandatory, and the raw error is returned
// (the audience is trusted).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffBookingRequest {
    pub ledger_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub vehicle_info: Option<String>,
    pub service_type: String,
    pub booking_date: String,
    pub time_slot: String,
    pub notes: Option<String>,
}

pub async fn booking_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StaffBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if request.customer_email.trim().is_empty() {
        return Err(AppError::Validation("customer email is required".to_string()));
    }

    let date = NaiveDate::parse_from_str(&request.booking_date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {}", request.booking_date)))?;
    let start_time = parse_hhmm(&request.time_slot)
        .map_err(|_| AppError::Validation(format!("invalid time slot: {}", request.time_slot)))?;

    let booking_request = BookingRequest {
        shop_id: request.ledger_id.clone(),
        customer_name: request.customer_name.clone(),
        customer_phone: request.customer_phone.clone(),
        customer_email: Some(request.customer_email.clone()),
        vehicle_registration: request.vehicle_info.clone(),
        service_name: request.service_type.clone(),
        date,
        start_time,
        notes: request.notes.clone(),
    };
    let today = Local::now().date_naive();

    let (created, shop) = {
        let mut db = state.db.lock().unwrap();
        booking::create_booking(&mut db, &booking_request, today, BookingPolicy::STAFF)?
    };

    emit_event(&state, &created, BookingEventKind::Created);
    dispatch_confirmation(&state, &created, &shop);

    Ok(Json(json!({ "result": { "data": { "booking": booking_json(&created) } } })))
}
