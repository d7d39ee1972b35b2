use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::queries;
use crate::services::calendar::{generate_ics, verify_booking_sig};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CalendarQuery {
    pub sig: Option<String>,
}

// GET /calendar/:booking_id.ics?sig=...
// Unauthenticated, so the signed token is the whole access control. Bad
// signatures get the same 404 as unknown ids; the route must not confirm
// which ids exist.
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Response {
    // Strip .ics suffix if present
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let sig = query.sig.as_deref().unwrap_or("");
    if !verify_booking_sig(booking_id, sig, &state.config.admin_token) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let (booking, shop_name) = {
        let db = state.db.lock().unwrap();
        let booking = match queries::get_booking_by_id(&db, booking_id) {
            Ok(Some(b)) => b,
            Ok(None) => {
                return (StatusCode::NOT_FOUND, "Not found").into_response();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load booking for .ics");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
            }
        };
        let shop_name = queries::get_shop(&db, &booking.shop_id)
            .ok()
            .flatten()
            .map(|s| s.name)
            .unwrap_or_else(|| "Workshop".to_string());
        (booking, shop_name)
    };

    let ics = generate_ics(&booking, &shop_name);
    let filename = format!("booking-{booking_id}.ics");

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
