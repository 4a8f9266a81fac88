use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Airport {
    pub(crate) iata_code: String,
    pub(crate) name: String,
    pub(crate) latitude_deg: f64,
    pub(crate) longitude_deg: f64,
}

impl Airport {
    pub(crate) fn new(iata_code: &str, name: &str, latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            iata_code: iata_code.to_string(),
            name: name.to_string(),
            latitude_deg,
            longitude_deg,
        }
    }

    pub(crate) fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude_deg, self.longitude_deg)
    }
}

/// Served when the airport endpoint is unreachable. JFK comes first and is
/// the start airport.
pub(crate) fn fallback_airports() -> Vec<Airport> {
    vec![
        Airport::new("JFK", "John F Kennedy Intl", 40.6413, -73.7781),
        Airport::new("LAX", "Los Angeles Intl", 33.9416, -118.4085),
        Airport::new("ORD", "Chicago O'Hare", 41.9742, -87.9073),
        Airport::new("DFW", "Dallas/Fort Worth", 32.8998, -97.0403),
        Airport::new("ATL", "Hartsfield-Jackson Atlanta", 33.6407, -84.4277),
        Airport::new("DEN", "Denver Intl", 39.8561, -104.6737),
        Airport::new("SEA", "Seattle-Tacoma", 47.4502, -122.3088),
        Airport::new("MIA", "Miami Intl", 25.7959, -80.2870),
    ]
}

pub(crate) fn find_airport<'a>(airports: &'a [Airport], iata_code: &str) -> Option<&'a Airport> {
    airports
        .iter()
        .find(|airport| airport.iata_code.eq_ignore_ascii_case(iata_code))
}
