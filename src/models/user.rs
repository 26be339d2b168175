use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::models::reservation::Reservation;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub admin: bool,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub residence_country: String,
}

/// Row of the users table, credential included. Never serialized.
#[derive(Clone, Debug)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserSummary {
    pub reservations_count: usize,
    pub parking_lots_count: usize,
}

impl UserSummary {
    pub fn from_reservations(reservations: &[Reservation]) -> Self {
        let parking_lots: HashSet<&str> = reservations
            .iter()
            .map(|reservation| reservation.parking_lot_id.as_str())
            .collect();

        Self {
            reservations_count: reservations.len(),
            parking_lots_count: parking_lots.len(),
        }
    }
}
