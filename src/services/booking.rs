use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::slot::format_hhmm;
use crate::models::{Booking, BookingStatus, Shop};
use crate::services::availability;
use crate::services::slots::{self, BookingPolicy};

pub struct BookingRequest {
    pub shop_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub vehicle_registration: Option<String>,
    pub service_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
}

/// The write path. Field validation, then a single IMMEDIATE transaction
/// that re-runs the availability computation against committed state and
/// inserts only if the requested slot is still below capacity. A slot list
/// the customer fetched earlier carries no authority here; two customers
/// who both saw "10:00 free" resolve inside this transaction, and the
/// loser gets `SlotNoLongerAvailable`.
pub fn create_booking(
    conn: &mut Connection,
    request: &BookingRequest,
    today: NaiveDate,
    policy: BookingPolicy,
) -> Result<(Booking, Shop), AppError> {
    validate_fields(request)?;
    slots::validate_booking_date(today, request.date, policy)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let shop = queries::get_shop(&tx, &request.shop_id)?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::ShopNotFound(request.shop_id.clone()))?;

    // Duration is snapshotted from the catalog at write time; later catalog
    // edits must not move an existing booking's window.
    let service = queries::get_service_by_name(&tx, &shop.id, &request.service_name)?
        .ok_or_else(|| {
            AppError::Validation(format!("unknown service: {}", request.service_name))
        })?;

    let open = availability::available_slots(
        &tx,
        &shop,
        request.date,
        service.duration_minutes,
        today,
        policy,
    )?;
    if !open.iter().any(|slot| slot.start == request.start_time) {
        return Err(AppError::SlotNoLongerAvailable);
    }

    let now = Utc::now().naive_utc();
    let status = if shop.auto_confirm {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        shop_id: shop.id.clone(),
        customer_name: request.customer_name.trim().to_string(),
        customer_phone: request.customer_phone.trim().to_string(),
        customer_email: normalized(&request.customer_email),
        vehicle_registration: normalized(&request.vehicle_registration),
        service_name: service.name.clone(),
        duration_minutes: service.duration_minutes,
        date: request.date,
        start_time: request.start_time,
        status,
        notes: normalized(&request.notes),
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        shop_id = %shop.id,
        date = %booking.date,
        time = %format_hhmm(booking.start_time),
        "booking created"
    );

    Ok((booking, shop))
}

fn validate_fields(request: &BookingRequest) -> Result<(), AppError> {
    if request.customer_name.trim().is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if request.customer_phone.trim().is_empty() {
        return Err(AppError::Validation("customer phone is required".to_string()));
    }
    if request.service_name.trim().is_empty() {
        return Err(AppError::Validation("service type is required".to_string()));
    }
    Ok(())
}

fn normalized(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Confirmation text for the customer, including a tamper-proof calendar
/// link when a base URL is configured.
pub fn confirmation_sms(booking: &Booking, shop: &Shop, calendar_url: Option<&str>) -> String {
    let verb = match booking.status {
        BookingStatus::Confirmed => "is confirmed",
        _ => "has been received",
    };
    let mut body = format!(
        "Your {} appointment at {} on {} at {} {}.",
        booking.service_name,
        shop.name,
        booking.date.format("%Y-%m-%d"),
        format_hhmm(booking.start_time),
        verb
    );
    if let Some(url) = calendar_url {
        body.push_str(&format!(" Add it to your calendar: {url}"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::slot::parse_hhmm;
    use crate::models::{BusinessHours, Service};

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();
        let shop = Shop {
            id: "shop-1".to_string(),
            name: "Acme Motors".to_string(),
            hours: BusinessHours::from_json(
                r#"{"days":[{"day":"mon","open":"09:00","close":"17:00"}]}"#,
            )
            .unwrap(),
            bay_count: 1,
            slot_minutes: 60,
            auto_confirm: false,
            active: true,
            created_at: now,
            updated_at: now,
        };
        queries::create_shop(&conn, &shop).unwrap();
        queries::create_service(
            &conn,
            &Service {
                id: "svc-1".to_string(),
                shop_id: "shop-1".to_string(),
                name: "Oil Change".to_string(),
                duration_minutes: 60,
                price_cents: Some(4999),
                created_at: now,
            },
        )
        .unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request_at(start: &str) -> BookingRequest {
        BookingRequest {
            shop_id: "shop-1".to_string(),
            customer_name: "Alice".to_string(),
            customer_phone: "+15551110000".to_string(),
            customer_email: None,
            vehicle_registration: Some("AB12 CDE".to_string()),
            service_name: "Oil Change".to_string(),
            date: date("2025-06-16"),
            start_time: parse_hhmm(start).unwrap(),
            notes: None,
        }
    }

    fn today() -> NaiveDate {
        date("2025-06-10")
    }

    #[test]
    fn test_create_and_snapshot_duration() {
        let mut conn = setup();
        let (booking, shop) =
            create_booking(&mut conn, &request_at("10:00"), today(), BookingPolicy::PUBLIC).unwrap();
        assert_eq!(booking.duration_minutes, 60);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(shop.name, "Acme Motors");

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.start_time, parse_hhmm("10:00").unwrap());
    }

    #[test]
    fn test_second_booking_same_slot_rejected() {
        let mut conn = setup();
        create_booking(&mut conn, &request_at("10:00"), today(), BookingPolicy::PUBLIC).unwrap();

        let result = create_booking(&mut conn, &request_at("10:00"), today(), BookingPolicy::PUBLIC);
        assert!(matches!(result, Err(AppError::SlotNoLongerAvailable)));
    }

    #[test]
    fn test_off_grid_time_rejected() {
        let mut conn = setup();
        let result = create_booking(&mut conn, &request_at("10:30"), today(), BookingPolicy::PUBLIC);
        assert!(matches!(result, Err(AppError::SlotNoLongerAvailable)));
    }

    #[test]
    fn test_missing_name_rejected() {
        let mut conn = setup();
        let mut request = request_at("10:00");
        request.customer_name = "  ".to_string();
        let result = create_booking(&mut conn, &request, today(), BookingPolicy::PUBLIC);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_unknown_service_rejected() {
        let mut conn = setup();
        let mut request = request_at("10:00");
        request.service_name = "Time Travel Tune-up".to_string();
        let result = create_booking(&mut conn, &request, today(), BookingPolicy::PUBLIC);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_unknown_shop_rejected() {
        let mut conn = setup();
        let mut request = request_at("10:00");
        request.shop_id = "nope".to_string();
        let result = create_booking(&mut conn, &request, today(), BookingPolicy::PUBLIC);
        assert!(matches!(result, Err(AppError::ShopNotFound(_))));
    }

    #[test]
    fn test_today_rejected_for_public_allowed_for_staff() {
        let mut conn = setup();
        let mut request = request_at("10:00");
        // 2025-06-16 is a Monday; make it "today"
        request.date = date("2025-06-16");
        let public = create_booking(&mut conn, &request, date("2025-06-16"), BookingPolicy::PUBLIC);
        assert!(matches!(public, Err(AppError::InvalidDateRange(_))));

        let staff = create_booking(&mut conn, &request, date("2025-06-16"), BookingPolicy::STAFF);
        assert!(staff.is_ok());
    }

    #[test]
    fn test_read_after_write_excludes_slot() {
        let mut conn = setup();
        create_booking(&mut conn, &request_at("10:00"), today(), BookingPolicy::PUBLIC).unwrap();

        let shop = queries::get_shop(&conn, "shop-1").unwrap().unwrap();
        let open = availability::available_slots(
            &conn,
            &shop,
            date("2025-06-16"),
            60,
            today(),
            BookingPolicy::PUBLIC,
        )
        .unwrap();
        assert!(!open.iter().any(|s| s.start_label() == "10:00"));
    }

    #[test]
    fn test_confirmation_sms_wording() {
        let mut conn = setup();
        let (booking, shop) =
            create_booking(&mut conn, &request_at("10:00"), today(), BookingPolicy::PUBLIC).unwrap();

        let body = confirmation_sms(&booking, &shop, Some("https://example.com/cal.ics"));
        assert!(body.contains("Oil Change"));
        assert!(body.contains("Acme Motors"));
        assert!(body.contains("10:00"));
        assert!(body.contains("has been received"));
        assert!(body.contains("https://example.com/cal.ics"));
    }
}
