use serde::Serialize;

/// Pushed over the staff dashboard SSE stream whenever a booking is
/// created or changes status.
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub booking_id: String,
    pub shop_id: String,
    pub kind: BookingEventKind,
    pub customer_name: String,
    pub service_name: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingEventKind {
    Created,
    Confirmed,
    Cancelled,
}
