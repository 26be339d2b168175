use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Country {
    pub name: String,
    pub short_name: String,
    pub flag_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthTokenResponse {
    pub auth_token: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CountryResponse {
    pub country_name: String,
    pub country_short_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StateResponse {
    pub state_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CityResponse {
    pub city_name: String,
}
