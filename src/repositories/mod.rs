pub mod places_api;
pub mod postgres_repo;
