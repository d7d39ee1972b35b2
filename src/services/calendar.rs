use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::models::Booking;

type HmacSha1 = Hmac<Sha1>;

pub fn generate_ics(booking: &Booking, shop_name: &str) -> String {
    let start = booking.date.and_time(booking.start_time);
    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (start + Duration::minutes(booking.duration_minutes))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@autobook", booking.id);

    let summary = format!("{} at {}", booking.service_name, shop_name);
    let mut description = match booking.vehicle_registration.as_deref() {
        Some(reg) => format!("Vehicle: {reg}"),
        None => "Workshop appointment".to_string(),
    };
    if let Some(notes) = booking.notes.as_deref() {
        description.push_str(&format!("\\n{notes}"));
    }

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Autobook//Workshop Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

/// Signature for the public .ics download link. The download route is
/// unauthenticated; the HMAC keeps booking ids from being enumerable.
pub fn sign_booking_id(booking_id: &str, secret: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("bad signing key: {e}"))?;
    mac.update(booking_id.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

pub fn verify_booking_sig(booking_id: &str, sig: &str, secret: &str) -> bool {
    let Ok(decoded) = URL_SAFE_NO_PAD.decode(sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(booking_id.as_bytes());
    mac.verify_slice(&decoded).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::slot::parse_hhmm;
    use crate::models::BookingStatus;
    use chrono::{NaiveDate, NaiveDateTime};

    fn sample_booking() -> Booking {
        let created =
            NaiveDateTime::parse_from_str("2025-03-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Booking {
            id: "test-123".to_string(),
            shop_id: "shop-1".to_string(),
            customer_name: "Alice".to_string(),
            customer_phone: "+1234567890".to_string(),
            customer_email: None,
            vehicle_registration: Some("AB12 CDE".to_string()),
            service_name: "Oil Change".to_string(),
            duration_minutes: 60,
            date: NaiveDate::parse_from_str("2025-03-15", "%Y-%m-%d").unwrap(),
            start_time: parse_hhmm("14:00").unwrap(),
            status: BookingStatus::Confirmed,
            notes: Some("Check brakes too".to_string()),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&sample_booking(), "Acme Motors");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T150000"));
        assert!(ics.contains("SUMMARY:Oil Change at Acme Motors"));
        assert!(ics.contains("DESCRIPTION:Vehicle: AB12 CDE"));
        assert!(ics.contains("Check brakes too"));
        assert!(ics.contains("UID:test-123@autobook"));
        assert!(ics.contains("END:VCALENDAR"));
    }

    #[test]
    fn test_generate_ics_no_vehicle() {
        let mut booking = sample_booking();
        booking.vehicle_registration = None;
        booking.notes = None;
        let ics = generate_ics(&booking, "Acme Motors");
        assert!(ics.contains("DESCRIPTION:Workshop appointment"));
    }

    #[test]
    fn test_signature_round_trip() {
        let sig = sign_booking_id("test-123", "secret").unwrap();
        assert!(verify_booking_sig("test-123", &sig, "secret"));
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let sig = sign_booking_id("test-123", "secret").unwrap();
        assert!(!verify_booking_sig("test-124", &sig, "secret"));
        assert!(!verify_booking_sig("test-123", &sig, "other-secret"));
        assert!(!verify_booking_sig("test-123", "not base64 !!!", "secret"));
    }
}
