use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParkingLot {
    pub id: String,
    pub name: String,
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A parking lot together with how far it is from the point it was searched from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NearbyParkingLot {
    #[serde(flatten)]
    pub parking_lot: ParkingLot,
    pub distance_km: f64,
}
