use crate::models::location::Location;
use crate::models::parking_lot::{NearbyParkingLot, ParkingLot};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, haversine formula.
pub fn distance_km(from: Location, to: Location) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lng = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

pub fn is_valid(location: Location) -> bool {
    (-90.0..=90.0).contains(&location.latitude) && (-180.0..=180.0).contains(&location.longitude)
}

/// Lots within `radius_km` of `origin`, closest first.
pub fn nearby(parking_lots: Vec<ParkingLot>, origin: Location, radius_km: f64) -> Vec<NearbyParkingLot> {
    let mut nearby: Vec<NearbyParkingLot> = parking_lots
        .into_iter()
        .map(|parking_lot| {
            let distance_km = distance_km(
                origin,
                Location {
                    latitude: parking_lot.latitude,
                    longitude: parking_lot.longitude,
                },
            );
            NearbyParkingLot { parking_lot, distance_km }
        })
        .filter(|lot| lot.distance_km <= radius_km)
        .collect();

    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}
