use anyhow::anyhow;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::place::{AuthTokenResponse, CityResponse, Country, CountryResponse, StateResponse};

/// Client for the country/state/city lookup API. Every lookup first exchanges the
/// configured API token for a short lived access token.
pub struct PlacesApiClient {
    http_client: Client,
    base_url: Url,
    api_token: String,
    user_email: String,
    flags_url: String,
}

impl PlacesApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.places_api_url)
            .map_err(|e| anyhow!("Invalid places API url {}: {}", config.places_api_url, e))?;

        Ok(Self {
            http_client: Client::new(),
            base_url,
            api_token: config.places_api_token.clone(),
            user_email: config.places_user_email.clone(),
            flags_url: with_trailing_slash(&config.flags_url),
        })
    }

    async fn get_auth_token(&self) -> AppResult<String> {
        let url = endpoint(&self.base_url, &["getaccesstoken"])?;
        let response: AuthTokenResponse = self
            .http_client
            .get(url)
            .header("api-token", &self.api_token)
            .header("user-email", &self.user_email)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(format!("Bearer {}", response.auth_token))
    }

    async fn get_authorized<T: DeserializeOwned>(&self, segments: &[&str]) -> AppResult<T> {
        let auth_token = self.get_auth_token().await?;
        let url = endpoint(&self.base_url, segments)?;
        debug!("Places API request: {}", url);

        let response = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, auth_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response)
    }

    pub async fn get_all_countries(&self) -> AppResult<Vec<Country>> {
        let countries: Vec<CountryResponse> = self.get_authorized(&["countries"]).await?;

        Ok(countries
            .into_iter()
            .map(|country| to_country(country, &self.flags_url))
            .collect())
    }

    pub async fn get_all_states_by_country(&self, country_name: &str) -> AppResult<Vec<String>> {
        let states: Vec<StateResponse> = self.get_authorized(&["states", country_name]).await?;

        Ok(states.into_iter().map(|state| state.state_name).collect())
    }

    pub async fn get_all_cities_by_state(&self, state_name: &str) -> AppResult<Vec<String>> {
        let cities: Vec<CityResponse> = self.get_authorized(&["cities", state_name]).await?;

        Ok(cities.into_iter().map(|city| city.city_name).collect())
    }
}

/// Appends path segments to the base url, percent-encoding each one.
fn endpoint(base_url: &Url, segments: &[&str]) -> AppResult<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::Unknown(anyhow!("Places API url {} cannot be a base", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

fn to_country(country: CountryResponse, flags_url: &str) -> Country {
    let flag_url = format!("{}{}.svg", flags_url, country.country_short_name.to_lowercase());

    Country {
        name: country.country_name,
        short_name: country.country_short_name,
        flag_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_joined_and_encoded() {
        let base = Url::parse("https://www.universal-tutorial.com/api/").unwrap();

        assert_eq!(
            endpoint(&base, &["countries"]).unwrap().as_str(),
            "https://www.universal-tutorial.com/api/countries"
        );
        assert_eq!(
            endpoint(&base, &["states", "United States"]).unwrap().as_str(),
            "https://www.universal-tutorial.com/api/states/United%20States"
        );
    }

    #[test]
    fn base_without_trailing_slash() {
        let base = Url::parse("http://localhost:8080/api").unwrap();

        assert_eq!(
            endpoint(&base, &["cities", "Antioquia"]).unwrap().as_str(),
            "http://localhost:8080/api/cities/Antioquia"
        );
    }

    #[test]
    fn country_gets_a_flag_url() {
        let country = to_country(
            CountryResponse {
                country_name: "Colombia".into(),
                country_short_name: "CO".into(),
            },
            &with_trailing_slash("https://flagcdn.com"),
        );

        assert_eq!(country.name, "Colombia");
        assert_eq!(country.short_name, "CO");
        assert_eq!(country.flag_url, "https://flagcdn.com/co.svg");
    }

    #[test]
    fn decodes_api_payloads() {
        let token: AuthTokenResponse = serde_json::from_str(r#"{"auth_token":"abc.def"}"#).unwrap();
        assert_eq!(token.auth_token, "abc.def");

        let countries: Vec<CountryResponse> = serde_json::from_str(
            r#"[{"country_name":"Colombia","country_short_name":"CO","country_phone_code":57}]"#,
        ).unwrap();
        assert_eq!(countries[0].country_short_name, "CO");

        let states: Vec<StateResponse> = serde_json::from_str(r#"[{"state_name":"Antioquia"}]"#).unwrap();
        assert_eq!(states[0].state_name, "Antioquia");

        let cities: Vec<CityResponse> = serde_json::from_str(r#"[{"city_name":"Medellin"}]"#).unwrap();
        assert_eq!(cities[0].city_name, "Medellin");
    }
}
