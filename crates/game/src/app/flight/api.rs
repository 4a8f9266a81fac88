use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::airports::{fallback_airports, Airport};
use super::geo::GeoPoint;
use super::weather::WeatherReport;

pub(crate) const API_BASE_ENV_VAR: &str = "SKYRELIC_API_BASE";
pub(crate) const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub(crate) enum FlightApiError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{url} returned no airports")]
    EmptyAirportList { url: String },
}

/// Read-only geo/weather backend. Both calls are idempotent GETs.
pub(crate) trait FlightApi {
    fn airports(&mut self) -> Result<Vec<Airport>, FlightApiError>;
    fn weather(&mut self, point: GeoPoint) -> Result<WeatherReport, FlightApiError>;
}

pub(crate) struct HttpFlightApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpFlightApi {
    pub(crate) fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FlightApiError> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request
            .call()
            .map_err(|error| convert_error(url, error))?;
        response
            .into_json::<T>()
            .map_err(|source| FlightApiError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

impl FlightApi for HttpFlightApi {
    fn airports(&mut self) -> Result<Vec<Airport>, FlightApiError> {
        let url = format!("{}/api/airports", self.base_url);
        let airports: Vec<Airport> = self.get_json(&url, &[])?;
        if airports.is_empty() {
            return Err(FlightApiError::EmptyAirportList { url });
        }
        Ok(airports)
    }

    fn weather(&mut self, point: GeoPoint) -> Result<WeatherReport, FlightApiError> {
        let url = format!("{}/api/weather", self.base_url);
        self.get_json(
            &url,
            &[
                ("lat", point.lat_deg.to_string()),
                ("lon", point.lon_deg.to_string()),
            ],
        )
    }
}

fn convert_error(url: &str, error: ureq::Error) -> FlightApiError {
    match error {
        ureq::Error::Status(status, _) => FlightApiError::Status {
            url: url.to_string(),
            status,
        },
        other => FlightApiError::Transport {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

/// Airport list from the backend, or the built-in list when it cannot be
/// reached.
pub(crate) fn load_airports(api: &mut dyn FlightApi) -> Vec<Airport> {
    match api.airports() {
        Ok(airports) => {
            debug!(count = airports.len(), "airports_loaded");
            airports
        }
        Err(error) => {
            warn!(error = %error, "airport_fetch_failed_using_fallback");
            fallback_airports()
        }
    }
}

/// Weather for one leg. Failures mean "no weather penalty" and are not
/// retried.
pub(crate) fn fetch_weather(api: &mut dyn FlightApi, point: GeoPoint) -> Option<WeatherReport> {
    match api.weather(point) {
        Ok(report) => Some(report),
        Err(error) => {
            debug!(error = %error, "weather_fetch_failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// In-memory backend that counts calls.
    #[derive(Default)]
    pub(crate) struct StubFlightApi {
        pub(crate) airports: Option<Vec<Airport>>,
        pub(crate) weather: Option<WeatherReport>,
        pub(crate) airport_calls: u32,
        pub(crate) weather_calls: u32,
    }

    impl FlightApi for StubFlightApi {
        fn airports(&mut self) -> Result<Vec<Airport>, FlightApiError> {
            self.airport_calls += 1;
            self.airports
                .clone()
                .ok_or_else(|| FlightApiError::Transport {
                    url: "stub://airports".to_string(),
                    message: "offline".to_string(),
                })
        }

        fn weather(&mut self, _point: GeoPoint) -> Result<WeatherReport, FlightApiError> {
            self.weather_calls += 1;
            self.weather.clone().ok_or_else(|| FlightApiError::Status {
                url: "stub://weather".to_string(),
                status: 500,
            })
        }
    }
}
