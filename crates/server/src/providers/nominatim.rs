//! Nominatim `/reverse` adapter (jsonv2).

use super::{HttpSettings, base_url, fetch_json};
use async_trait::async_trait;
use geopin::enrichment::{Address, ReverseGeocoder};
use geopin::{GeopinError, Result};
use geopin_types::Location;
use reqwest::{Client, Url};
use serde::Deserialize;

const PROVIDER: &str = "nominatim";

pub struct NominatimGeocoder {
    client: Client,
    base: Url,
}

impl NominatimGeocoder {
    pub fn new(base: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: settings.client()?,
            base: base_url(PROVIDER, base)?,
        })
    }
}

#[derive(Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

fn into_address(response: NominatimReverse) -> Result<Address> {
    if let Some(error) = response.error {
        return Err(GeopinError::provider(PROVIDER, error));
    }
    let display_name = response
        .display_name
        .ok_or_else(|| GeopinError::provider(PROVIDER, "response has no display_name"))?;
    let address = response.address.unwrap_or_default();

    Ok(Address {
        display_name,
        house_number: address.house_number,
        road: address.road,
        city: address.city.or(address.town).or(address.village),
        state: address.state,
        postcode: address.postcode,
        country: address.country,
        country_code: address.country_code.map(|c| c.to_uppercase()),
    })
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn reverse(&self, location: &Location) -> Result<Address> {
        let url = format!("{}/reverse", self.base.as_str().trim_end_matches('/'));
        let lat = location.lat.to_string();
        let lon = location.lon.to_string();
        let response: NominatimReverse = fetch_json(
            PROVIDER,
            self.client.get(&url).query(&[
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
            ]),
        )
        .await?;
        into_address(response)
    }
}
