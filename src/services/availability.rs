use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::slot::minutes_from_midnight;
use crate::models::{Booking, Shop, Slot};
use crate::services::slots::{self, BookingPolicy};

/// Simultaneous-service capacity for a slot. Pure configuration lookup;
/// current demand is the conflict resolver's concern. A misconfigured
/// shop never drops below one bay.
pub fn capacity_at(shop: &Shop, _date: NaiveDate, _slot: &Slot) -> i64 {
    shop.bay_count.max(1)
}

/// The availability read path: raw grid, minus slots where the number of
/// overlapping non-cancelled bookings has reached capacity. Order is
/// always ascending chronological.
pub fn available_slots(
    conn: &Connection,
    shop: &Shop,
    date: NaiveDate,
    service_duration_minutes: i64,
    today: NaiveDate,
    policy: BookingPolicy,
) -> Result<Vec<Slot>, AppError> {
    slots::validate_booking_date(today, date, policy)?;

    let raw = slots::generate_slots(shop, date, service_duration_minutes);
    if raw.is_empty() {
        return Ok(raw);
    }

    let existing = queries::bookings_for_day(conn, &shop.id, date)?;

    Ok(raw
        .into_iter()
        .filter(|slot| {
            let count = overlap_count(&existing, slot, service_duration_minutes);
            count < capacity_at(shop, date, slot)
        })
        .collect())
}

/// Half-open interval overlap: [a, b) and [c, d) overlap iff a < d && c < b.
fn overlap_count(existing: &[Booking], slot: &Slot, service_duration_minutes: i64) -> i64 {
    let start = minutes_from_midnight(slot.start);
    let end = start + service_duration_minutes.max(1);

    existing
        .iter()
        .filter(|b| {
            let (b_start, b_end) = b.occupied_minutes();
            b_start < end && start < b_end
        })
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::slot::parse_hhmm;
    use crate::models::{BookingStatus, BusinessHours};
    use chrono::Utc;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_shop(bay_count: i64) -> Shop {
        let now = Utc::now().naive_utc();
        Shop {
            id: "shop-1".to_string(),
            name: "Acme Motors".to_string(),
            hours: BusinessHours::from_json(
                r#"{"days":[{"day":"mon","open":"09:00","close":"17:00"}]}"#,
            )
            .unwrap(),
            bay_count,
            slot_minutes: 60,
            auto_confirm: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn insert_shop(conn: &Connection, shop: &Shop) {
        queries::create_shop(conn, shop).unwrap();
    }

    fn insert_booking(conn: &Connection, shop_id: &str, day: &str, start: &str, status: BookingStatus) {
        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            shop_id: shop_id.to_string(),
            customer_name: "Alice".to_string(),
            customer_phone: "+15551110000".to_string(),
            customer_email: None,
            vehicle_registration: None,
            service_name: "Oil Change".to_string(),
            duration_minutes: 60,
            date: date(day),
            start_time: parse_hhmm(start).unwrap(),
            status,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        queries::create_booking(conn, &booking).unwrap();
    }

    // today chosen so 2025-06-16 (a Monday) is inside the public window
    fn today() -> NaiveDate {
        date("2025-06-10")
    }

    #[test]
    fn test_booked_slot_excluded_at_capacity_one() {
        let conn = setup_db();
        let shop = test_shop(1);
        insert_shop(&conn, &shop);
        insert_booking(&conn, &shop.id, "2025-06-16", "10:00", BookingStatus::Confirmed);

        let open = available_slots(&conn, &shop, date("2025-06-16"), 60, today(), BookingPolicy::PUBLIC)
            .unwrap();
        let labels: Vec<String> = open.iter().map(|s| s.start_label()).collect();
        assert!(!labels.contains(&"10:00".to_string()));
        assert_eq!(
            labels,
            vec!["09:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn test_cancelled_booking_frees_slot() {
        let conn = setup_db();
        let shop = test_shop(1);
        insert_shop(&conn, &shop);
        insert_booking(&conn, &shop.id, "2025-06-16", "10:00", BookingStatus::Cancelled);

        let open = available_slots(&conn, &shop, date("2025-06-16"), 60, today(), BookingPolicy::PUBLIC)
            .unwrap();
        assert_eq!(open.len(), 8);
    }

    #[test]
    fn test_second_bay_keeps_slot_open() {
        let conn = setup_db();
        let shop = test_shop(2);
        insert_shop(&conn, &shop);
        insert_booking(&conn, &shop.id, "2025-06-16", "10:00", BookingStatus::Confirmed);

        let open = available_slots(&conn, &shop, date("2025-06-16"), 60, today(), BookingPolicy::PUBLIC)
            .unwrap();
        let labels: Vec<String> = open.iter().map(|s| s.start_label()).collect();
        assert!(labels.contains(&"10:00".to_string()));

        insert_booking(&conn, &shop.id, "2025-06-16", "10:00", BookingStatus::Confirmed);
        let open = available_slots(&conn, &shop, date("2025-06-16"), 60, today(), BookingPolicy::PUBLIC)
            .unwrap();
        let labels: Vec<String> = open.iter().map(|s| s.start_label()).collect();
        assert!(!labels.contains(&"10:00".to_string()));
    }

    #[test]
    fn test_long_booking_blocks_spanned_slots() {
        let conn = setup_db();
        let shop = test_shop(1);
        insert_shop(&conn, &shop);

        // 120-minute job at 10:00 occupies [10:00, 12:00)
        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: "long-1".to_string(),
            shop_id: shop.id.clone(),
            customer_name: "Bob".to_string(),
            customer_phone: "+15551110001".to_string(),
            customer_email: None,
            vehicle_registration: None,
            service_name: "Brake Service".to_string(),
            duration_minutes: 120,
            date: date("2025-06-16"),
            start_time: parse_hhmm("10:00").unwrap(),
            status: BookingStatus::Confirmed,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        queries::create_booking(&conn, &booking).unwrap();

        let open = available_slots(&conn, &shop, date("2025-06-16"), 60, today(), BookingPolicy::PUBLIC)
            .unwrap();
        let labels: Vec<String> = open.iter().map(|s| s.start_label()).collect();
        assert!(!labels.contains(&"10:00".to_string()));
        assert!(!labels.contains(&"11:00".to_string()));
        assert!(labels.contains(&"09:00".to_string()));
        assert!(labels.contains(&"12:00".to_string()));
    }

    #[test]
    fn test_out_of_window_date_rejected() {
        let conn = setup_db();
        let shop = test_shop(1);
        insert_shop(&conn, &shop);

        let result = available_slots(&conn, &shop, today(), 60, today(), BookingPolicy::PUBLIC);
        assert!(matches!(result, Err(AppError::InvalidDateRange(_))));
    }

    #[test]
    fn test_capacity_floor_is_one() {
        let shop = test_shop(0);
        let slot = Slot {
            date: date("2025-06-16"),
            start: parse_hhmm("09:00").unwrap(),
            end: parse_hhmm("10:00").unwrap(),
        };
        assert_eq!(capacity_at(&shop, date("2025-06-16"), &slot), 1);
    }
}
