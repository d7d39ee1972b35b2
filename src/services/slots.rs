use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

use crate::errors::AppError;
use crate::models::slot::minutes_from_midnight;
use crate::models::{Shop, Slot};

/// Lead-time rules for the bookable window. The public widget only offers
/// [tomorrow, +30 days]; staff may book same-day much further out.
#[derive(Debug, Clone, Copy)]
pub struct BookingPolicy {
    pub min_lead_days: i64,
    pub max_advance_days: i64,
}

impl BookingPolicy {
    pub const PUBLIC: Self = Self {
        min_lead_days: 1,
        max_advance_days: 30,
    };

    pub const STAFF: Self = Self {
        min_lead_days: 0,
        max_advance_days: 365,
    };
}

pub fn validate_booking_date(
    today: NaiveDate,
    date: NaiveDate,
    policy: BookingPolicy,
) -> Result<(), AppError> {
    let earliest = today + Duration::days(policy.min_lead_days);
    let latest = today + Duration::days(policy.max_advance_days);
    if date < earliest || date > latest {
        return Err(AppError::InvalidDateRange(format!(
            "{date} is outside [{earliest}, {latest}]"
        )));
    }
    Ok(())
}

/// Candidate slots for one day: step through each opening window on the
/// shop's grid, keeping starts whose full service fits before close.
/// A closed weekday yields an empty grid, not an error. Pure function of
/// its inputs; callers may cache freely.
pub fn generate_slots(shop: &Shop, date: NaiveDate, service_duration_minutes: i64) -> Vec<Slot> {
    let step = shop.slot_minutes.max(1);
    let duration = service_duration_minutes.max(1);

    let mut slots = vec![];
    for (open, close) in shop.hours.windows_for(date.weekday()) {
        let open_m = minutes_from_midnight(open);
        let close_m = minutes_from_midnight(close);

        let mut start_m = open_m;
        while start_m + duration <= close_m {
            // Both bounds stay under 24h: close_m < 1440 and the loop
            // condition caps start_m + duration at close_m.
            if let (Some(start), Some(end)) = (time_at(start_m), time_at(start_m + duration)) {
                slots.push(Slot { date, start, end });
            }
            start_m += step;
        }
    }
    slots
}

fn time_at(minutes: i64) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusinessHours;
    use chrono::Utc;

    fn shop_with(hours_json: &str, slot_minutes: i64) -> Shop {
        let now = Utc::now().naive_utc();
        Shop {
            id: "shop-1".to_string(),
            name: "Acme Motors".to_string(),
            hours: BusinessHours::from_json(hours_json).unwrap(),
            bay_count: 1,
            slot_minutes,
            auto_confirm: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_hourly_grid_nine_to_five() {
        let shop = shop_with(r#"{"days":[{"day":"mon","open":"09:00","close":"17:00"}]}"#, 60);
        // 2025-06-16 is a Monday
        let slots = generate_slots(&shop, date("2025-06-16"), 60);
        let labels: Vec<String> = slots.iter().map(|s| s.start_label()).collect();
        assert_eq!(
            labels,
            vec!["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn test_long_service_trims_tail() {
        let shop = shop_with(r#"{"days":[{"day":"mon","open":"09:00","close":"17:00"}]}"#, 60);
        // 120-minute job cannot start at 16:00
        let slots = generate_slots(&shop, date("2025-06-16"), 120);
        let labels: Vec<String> = slots.iter().map(|s| s.start_label()).collect();
        assert_eq!(labels.last().map(String::as_str), Some("15:00"));
        assert_eq!(labels.len(), 7);
    }

    #[test]
    fn test_closed_day_is_empty_not_error() {
        let shop = shop_with(r#"{"days":[{"day":"mon","open":"09:00","close":"17:00"}]}"#, 60);
        // 2025-06-15 is a Sunday
        assert!(generate_slots(&shop, date("2025-06-15"), 60).is_empty());
    }

    #[test]
    fn test_half_hour_granularity() {
        let shop = shop_with(r#"{"days":[{"day":"mon","open":"09:00","close":"11:00"}]}"#, 30);
        let slots = generate_slots(&shop, date("2025-06-16"), 30);
        let labels: Vec<String> = slots.iter().map(|s| s.start_label()).collect();
        assert_eq!(labels, vec!["09:00", "09:30", "10:00", "10:30"]);
    }

    #[test]
    fn test_split_windows_generate_both() {
        let shop = shop_with(
            r#"{"days":[{"day":"mon","open":"09:00","close":"12:00"},{"day":"mon","open":"13:00","close":"15:00"}]}"#,
            60,
        );
        let slots = generate_slots(&shop, date("2025-06-16"), 60);
        let labels: Vec<String> = slots.iter().map(|s| s.start_label()).collect();
        assert_eq!(labels, vec!["09:00", "10:00", "11:00", "13:00", "14:00"]);
    }

    #[test]
    fn test_deterministic() {
        let shop = shop_with(r#"{"days":[{"day":"mon","open":"09:00","close":"17:00"}]}"#, 60);
        let a = generate_slots(&shop, date("2025-06-16"), 60);
        let b = generate_slots(&shop, date("2025-06-16"), 60);
        assert_eq!(a, b);
    }

    #[test]
    fn test_date_window_bounds() {
        let today = date("2025-06-16");
        let policy = BookingPolicy::PUBLIC;
        assert!(validate_booking_date(today, today, policy).is_err());
        assert!(validate_booking_date(today, date("2025-06-17"), policy).is_ok());
        assert!(validate_booking_date(today, date("2025-07-16"), policy).is_ok());
        assert!(validate_booking_date(today, date("2025-07-17"), policy).is_err());
    }

    #[test]
    fn test_staff_policy_allows_same_day() {
        let today = date("2025-06-16");
        assert!(validate_booking_date(today, today, BookingPolicy::STAFF).is_ok());
        assert!(validate_booking_date(today, date("2025-06-15"), BookingPolicy::STAFF).is_err());
    }
}
