use serde::{Deserialize, Serialize};

pub(crate) const STORM_FACTOR: f64 = 1.8;
pub(crate) const PRECIPITATION_FACTOR: f64 = 1.4;
pub(crate) const CLEAR_FACTOR: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WeatherCondition {
    pub(crate) description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WeatherMain {
    pub(crate) temp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WeatherWind {
    pub(crate) speed: f64,
}

/// The subset of the weather payload the flight HUD shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WeatherReport {
    pub(crate) weather: Vec<WeatherCondition>,
    pub(crate) main: WeatherMain,
    pub(crate) wind: WeatherWind,
}

impl WeatherReport {
    pub(crate) fn description(&self) -> Option<&str> {
        self.weather
            .first()
            .map(|condition| condition.description.as_str())
    }

    pub(crate) fn factor(&self) -> f64 {
        self.description().map_or(CLEAR_FACTOR, weather_factor)
    }
}

/// Energy multiplier for a weather description.
pub(crate) fn weather_factor(description: &str) -> f64 {
    let description = description.to_lowercase();
    if description.contains("storm") {
        STORM_FACTOR
    } else if description.contains("rain") || description.contains("snow") {
        PRECIPITATION_FACTOR
    } else {
        CLEAR_FACTOR
    }
}
