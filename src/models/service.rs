use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Catalog entry for a shop: "Oil Change", 60 minutes, optional fixed price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: Option<i64>,
    pub created_at: NaiveDateTime,
}
