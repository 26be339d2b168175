pub mod availability;
pub mod geo;
pub mod handler_404;
pub mod password;
pub mod reservation_window;
pub mod search;
pub mod space_numbers;
