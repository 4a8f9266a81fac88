mod airports;
mod api;
mod geo;
mod scene;
mod session;
mod weather;

pub(crate) use api::{HttpFlightApi, API_BASE_ENV_VAR, DEFAULT_API_BASE};
pub(crate) use scene::{FlightScene, FlightSceneConfig};
pub(crate) use session::{
    validate_callsign, Difficulty, FlightError, FlightEvent, FlightSnapshot, FlightSpeed,
    MissionStatus,
};
