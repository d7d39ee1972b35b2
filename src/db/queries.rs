use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::models::{Booking, BookingStatus, BusinessHours, Service, Shop};

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";

// ── Shops ──

pub fn create_shop(conn: &Connection, shop: &Shop) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO shops (id, name, hours, bay_count, slot_minutes, auto_confirm, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            shop.id,
            shop.name,
            shop.hours.to_json()?,
            shop.bay_count,
            shop.slot_minutes,
            shop.auto_confirm,
            shop.active,
            shop.created_at.format(TS_FMT).to_string(),
            shop.updated_at.format(TS_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_shop(conn: &Connection, id: &str) -> anyhow::Result<Option<Shop>> {
    let result = conn.query_row(
        "SELECT id, name, hours, bay_count, slot_minutes, auto_confirm, active, created_at, updated_at
         FROM shops WHERE id = ?1",
        params![id],
        |row| Ok(parse_shop_row(row)),
    );

    match result {
        Ok(shop) => Ok(Some(shop?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_shop(conn: &Connection, shop: &Shop) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(TS_FMT).to_string();
    let count = conn.execute(
        "UPDATE shops SET name = ?1, hours = ?2, bay_count = ?3, slot_minutes = ?4,
         auto_confirm = ?5, active = ?6, updated_at = ?7 WHERE id = ?8",
        params![
            shop.name,
            shop.hours.to_json()?,
            shop.bay_count,
            shop.slot_minutes,
            shop.auto_confirm,
            shop.active,
            now,
            shop.id,
        ],
    )?;
    Ok(count > 0)
}

fn parse_shop_row(row: &Row) -> anyhow::Result<Shop> {
    let hours_json: String = row.get(2)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Shop {
        id: row.get(0)?,
        name: row.get(1)?,
        hours: BusinessHours::from_json(&hours_json)?,
        bay_count: row.get(3)?,
        slot_minutes: row.get(4)?,
        auto_confirm: row.get(5)?,
        active: row.get(6)?,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, shop_id, name, duration_minutes, price_cents, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id,
            service.shop_id,
            service.name,
            service.duration_minutes,
            service.price_cents,
            service.created_at.format(TS_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn list_services(conn: &Connection, shop_id: &str) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, shop_id, name, duration_minutes, price_cents, created_at
         FROM services WHERE shop_id = ?1 ORDER BY name ASC",
    )?;

    let rows = stmt.query_map(params![shop_id], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn get_service_by_name(
    conn: &Connection,
    shop_id: &str,
    name: &str,
) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, shop_id, name, duration_minutes, price_cents, created_at
         FROM services WHERE shop_id = ?1 AND name = ?2",
        params![shop_id, name],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_service_row(row: &Row) -> anyhow::Result<Service> {
    let created_at_str: String = row.get(5)?;
    Ok(Service {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        price_cents: row.get(4)?,
        created_at: parse_ts(&created_at_str),
    })
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, shop_id, customer_name, customer_phone, customer_email,
         vehicle_registration, service_name, duration_minutes, date, start_time, status,
         notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.shop_id,
            booking.customer_name,
            booking.customer_phone,
            booking.customer_email,
            booking.vehicle_registration,
            booking.service_name,
            booking.duration_minutes,
            booking.date.format(DATE_FMT).to_string(),
            booking.start_time.format(TIME_FMT).to_string(),
            booking.status.as_str(),
            booking.notes,
            booking.created_at.format(TS_FMT).to_string(),
            booking.updated_at.format(TS_FMT).to_string(),
        ],
    )?;
    Ok(())
}

/// Non-cancelled bookings for a shop and calendar day, ascending by start.
pub fn bookings_for_day(
    conn: &Connection,
    shop_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let date_str = date.format(DATE_FMT).to_string();

    let mut stmt = conn.prepare(
        "SELECT id, shop_id, customer_name, customer_phone, customer_email, vehicle_registration,
         service_name, duration_minutes, date, start_time, status, notes, created_at, updated_at
         FROM bookings WHERE shop_id = ?1 AND date = ?2 AND status != 'cancelled'
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(params![shop_id, date_str], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, shop_id, customer_name, customer_phone, customer_email, vehicle_registration,
         service_name, duration_minutes, date, start_time, status, notes, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(TS_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn get_all_bookings(
    conn: &Connection,
    shop_filter: Option<&str>,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = String::from(
        "SELECT id, shop_id, customer_name, customer_phone, customer_email, vehicle_registration,
         service_name, duration_minutes, date, start_time, status, notes, created_at, updated_at
         FROM bookings WHERE 1=1",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(shop_id) = shop_filter {
        params_vec.push(Box::new(shop_id.to_string()));
        sql.push_str(&format!(" AND shop_id = ?{}", params_vec.len()));
    }
    if let Some(status) = status_filter {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY date DESC, start_time DESC LIMIT ?{}",
        params_vec.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(8)?;
    let time_str: String = row.get(9)?;
    let status_str: String = row.get(10)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
        .map_err(|_| anyhow::anyhow!("bad booking date: {date_str}"))?;
    let start_time = NaiveTime::parse_from_str(&time_str, TIME_FMT)
        .map_err(|_| anyhow::anyhow!("bad booking start time: {time_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        customer_name: row.get(2)?,
        customer_phone: row.get(3)?,
        customer_email: row.get(4)?,
        vehicle_registration: row.get(5)?,
        service_name: row.get(6)?,
        duration_minutes: row.get(7)?,
        date,
        start_time,
        status: BookingStatus::from_str(&status_str),
        notes: row.get(11)?,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}
