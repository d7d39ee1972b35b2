pub mod admin;
pub mod calendar;
pub mod health;
pub mod public;
pub mod rpc;

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::slot::format_hhmm;
use crate::models::{Booking, BookingEvent, BookingEventKind, Shop};
use crate::services::{booking as booking_svc, calendar as calendar_svc};
use crate::state::AppState;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub(crate) fn booking_json(booking: &Booking) -> serde_json::Value {
    serde_json::json!({
        "id": booking.id,
        "shop_id": booking.shop_id,
        "customer_name": booking.customer_name,
        "customer_phone": booking.customer_phone,
        "customer_email": booking.customer_email,
        "vehicle_registration": booking.vehicle_registration,
        "service_name": booking.service_name,
        "duration_minutes": booking.duration_minutes,
        "date": booking.date.format("%Y-%m-%d").to_string(),
        "start_time": format_hhmm(booking.start_time),
        "status": booking.status.as_str(),
        "notes": booking.notes,
        "created_at": booking.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "updated_at": booking.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

pub(crate) fn emit_event(state: &AppState, booking: &Booking, kind: BookingEventKind) {
    // No receivers is fine; the stream is a dashboard convenience.
    let _ = state.events_tx.send(BookingEvent {
        booking_id: booking.id.clone(),
        shop_id: booking.shop_id.clone(),
        kind,
        customer_name: booking.customer_name.clone(),
        service_name: booking.service_name.clone(),
        date: booking.date.format("%Y-%m-%d").to_string(),
        time: format_hhmm(booking.start_time),
    });
}

/// Post-commit confirmation SMS. Best-effort: failures are logged, never
/// surfaced to the booker, and never undo the booking.
pub(crate) fn dispatch_confirmation(state: &Arc<AppState>, booking: &Booking, shop: &Shop) {
    let calendar_url = calendar_svc::sign_booking_id(&booking.id, &state.config.admin_token)
        .ok()
        .map(|sig| {
            format!(
                "{}/calendar/{}.ics?sig={}",
                state.config.public_base_url.trim_end_matches('/'),
                booking.id,
                sig
            )
        });
    let body = booking_svc::confirmation_sms(booking, shop, calendar_url.as_deref());
    let to = booking.customer_phone.clone();
    let state = Arc::clone(state);

    tokio::spawn(async move {
        if let Err(e) = state.messaging.send_message(&to, &body).await {
            tracing::warn!(error = %e, "failed to send booking confirmation");
        }
    });
}
