use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A candidate appointment window. Derived from shop hours on every
/// availability query, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Slot {
    /// Wire representation of the start time, e.g. "09:00".
    pub fn start_label(&self) -> String {
        format_hhmm(self.start)
    }
}

pub fn parse_hhmm(s: &str) -> anyhow::Result<NaiveTime> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}

pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Minutes since midnight. Overlap arithmetic is done on these so a
/// duration added to a `NaiveTime` can never wrap past midnight unnoticed.
pub fn minutes_from_midnight(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}
