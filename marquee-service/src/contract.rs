//! Request/response contract consumed by the booking workflow. Wire-format
//! agnostic; the shapes serialize cleanly should a transport be bolted on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use marquee_core::model::{SeatConflict, SeatState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockRequest {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub holder_id: String,
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockResponse {
    pub locked: Vec<String>,
    pub expires_at: Option<i64>,
    pub conflicts: Vec<SeatConflict>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnlockRequest {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub holder_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnlockResponse {
    pub released: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtendRequest {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub holder_id: String,
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtendResponse {
    pub extended: Vec<String>,
    pub lost: Vec<String>,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusRequest {
    pub showtime_id: i64,
    pub holder_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusResponse {
    pub seats: BTreeMap<String, SeatState>,
}

/// Booking-workflow notification that seats became durably booked, or were
/// freed again by a cancellation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MarkSeatsRequest {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MarkSeatsResponse {
    pub updated: Vec<String>,
}
