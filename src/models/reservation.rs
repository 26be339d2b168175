use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub parking_lot_id: String,
    pub parking_space_id: String,
    /// When the reservation was made
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
}

impl Reservation {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_timestamp,
            end: self.end_timestamp,
        }
    }
}

/// Half-open `[start, end)` interval a parking space is held for.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewReservation {
    pub user_id: String,
    pub parking_lot_id: String,
    pub parking_space_id: String,
    pub window: TimeWindow,
}
