use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::slot::parse_hhmm;

/// A workshop tenant. Never hard-deleted; `active = false` soft-disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub hours: BusinessHours,
    /// Simultaneous-service capacity (number of bays).
    pub bay_count: i64,
    /// Grid granularity for candidate slots.
    pub slot_minutes: i64,
    /// New bookings start as `confirmed` instead of `pending`.
    pub auto_confirm: bool,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub day: String,
    pub open: String,
    pub close: String,
}

/// Per-weekday opening windows, stored as a JSON column on the shop row.
/// A weekday with no entry is a closed day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub days: Vec<DayHours>,
}

impl BusinessHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: BusinessHours = serde_json::from_str(s)?;
        for day in &hours.days {
            parse_weekday(&day.day)?;
            let open = parse_hhmm(&day.open)?;
            let close = parse_hhmm(&day.close)?;
            if open >= close {
                return Err(anyhow::anyhow!(
                    "open must precede close for {}: {}-{}",
                    day.day,
                    day.open,
                    day.close
                ));
            }
        }
        Ok(hours)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Opening windows for a weekday, ascending by open time. Entries are
    /// pre-validated by `from_json`, so unparsable rows are skipped.
    pub fn windows_for(&self, weekday: Weekday) -> Vec<(NaiveTime, NaiveTime)> {
        let key = weekday_key(weekday);
        let mut windows: Vec<(NaiveTime, NaiveTime)> = self
            .days
            .iter()
            .filter(|d| d.day.to_lowercase() == key)
            .filter_map(|d| Some((parse_hhmm(&d.open).ok()?, parse_hhmm(&d.close).ok()?)))
            .collect();
        windows.sort();
        windows
    }
}

pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    match s.to_lowercase().as_str() {
        "mon" | "tue" | "wed" | "thu" | "fri" | "sat" | "sun" => Ok(()),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}
