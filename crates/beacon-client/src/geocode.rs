//! Reverse geocoding backends.

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::stats::ReverseGeocoder;

/// Reverse geocoder backed by a Nominatim-compatible HTTP service.
///
/// Region resolution prefers the state, then the county, then the country.
pub struct HttpGeocoder {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
}

#[derive(Deserialize)]
struct ReverseAddress {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    county: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl HttpGeocoder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ReverseGeocoder for HttpGeocoder {
    async fn region(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let url = format!(
            "{}/reverse?format=jsonv2&lat={lat}&lon={lng}",
            self.base_url
        );
        let response: ReverseResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let region = response
            .address
            .and_then(|a| a.state.or(a.county).or(a.country));
        debug!(lat, lng, region = ?region, "Reverse geocoded");
        Ok(region)
    }
}

/// Table-driven geocoder: a coordinate resolves to the first region whose
/// anchor point lies within its radius, in degrees. Deterministic and
/// offline; used by tests and demos.
pub struct StaticGeocoder {
    /// (lat, lng, radius, region)
    regions: Vec<(f64, f64, f64, String)>,
}

impl StaticGeocoder {
    pub fn new(regions: Vec<(f64, f64, f64, String)>) -> Self {
        Self { regions }
    }
}

impl ReverseGeocoder for StaticGeocoder {
    async fn region(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        Ok(self
            .regions
            .iter()
            .find(|(rlat, rlng, radius, _)| {
                (lat - rlat).abs() <= *radius && (lng - rlng).abs() <= *radius
            })
            .map(|(_, _, _, region)| region.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_geocoder_matches_within_radius() {
        let geocoder = StaticGeocoder::new(vec![(10.0, 20.0, 0.5, "Nearby".to_string())]);
        assert_eq!(
            geocoder.region(10.2, 19.8).await.unwrap(),
            Some("Nearby".to_string())
        );
        assert_eq!(geocoder.region(11.0, 20.0).await.unwrap(), None);
    }
}
