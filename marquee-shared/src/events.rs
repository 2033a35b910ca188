use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeatsLockedEvent {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub holder_id: String,
    pub locked_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeatsReleasedEvent {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub holder_id: String,
    pub released_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeatsBookedEvent {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub booked_at: i64,
}

/// Envelope broadcast to seat-map subscribers.
#[derive(Debug, Clone)]
pub enum LockEvent {
    Locked(SeatsLockedEvent),
    Released(SeatsReleasedEvent),
    Booked(SeatsBookedEvent),
}
