pub mod location;
pub mod parking_lot;
pub mod parking_space;
pub mod place;
pub mod reservation;
pub mod user;
