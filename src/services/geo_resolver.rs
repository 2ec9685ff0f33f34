use std::time::Duration;

use regex::Regex;

use crate::configuration::Settings;
use crate::domain::Coordinate;
use crate::error::GeocodeError;

use super::with_retries;

const MAP_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// Stage 1: turns a free-text location query into a coordinate by scraping
/// the initialization payload out of the map search page.
pub struct GeoResolver {
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
}

impl GeoResolver {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        Ok(GeoResolver {
            client: reqwest::Client::builder().build()?,
            timeout: settings.http.page_timeout(),
            max_attempts: settings.pipeline.max_attempts,
        })
    }

    pub async fn resolve(&self, query: &str) -> Result<Coordinate, GeocodeError> {
        with_retries(self.max_attempts, || self.resolve_once(query)).await
    }

    async fn resolve_once(&self, query: &str) -> Result<Coordinate, GeocodeError> {
        let url = format!("{}{}", MAP_SEARCH_URL, query.replace(' ', "+"));
        let body = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .text()
            .await?;
        parse_initialization_state(&body)
    }
}

/// The first inner array of `window.APP_INITIALIZATION_STATE` holds the
/// viewport as `[zoom, lng, lat]`.
pub fn parse_initialization_state(body: &str) -> Result<Coordinate, GeocodeError> {
    let pattern = Regex::new(r"window\.APP_INITIALIZATION_STATE=\[\[(.*?),\[").unwrap();
    let raw = pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .ok_or(GeocodeError::PayloadMissing)?;
    let values: Vec<f64> =
        serde_json::from_str(raw.as_str()).map_err(|_| GeocodeError::PayloadMissing)?;

    match values.as_slice() {
        [_, lng, lat, ..] => Ok(Coordinate {
            lat: *lat,
            lng: *lng,
        }),
        _ => Err(GeocodeError::PayloadMissing),
    }
}
