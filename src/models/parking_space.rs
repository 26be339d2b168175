use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParkingSpace {
    pub id: String,
    pub parking_lot_id: String,
    pub number: i32,
}
