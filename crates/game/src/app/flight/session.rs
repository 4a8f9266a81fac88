use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::airports::{find_airport, Airport};
use super::geo::{haversine_km, heading_degrees, lerp_point, GeoPoint};
use super::weather::{WeatherReport, CLEAR_FACTOR};

pub(crate) const FLIGHT_STEPS: u32 = 200;
pub(crate) const STEP_INTERVAL_SECONDS: f32 = 0.04;
pub(crate) const MAX_ENERGY: u32 = 100;
const KM_PER_ENERGY_UNIT: f64 = 50.0;
const KM_PER_POINT: f64 = 10.0;

pub(crate) const SELECT_AIRPORT_LOG: &str = "Select an airport.";
pub(crate) const INSUFFICIENT_ENERGY_LOG: &str = "Insufficient energy.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub(crate) fn target_points(self) -> u32 {
        match self {
            Self::Easy => 150,
            Self::Medium => 200,
            Self::Hard => 260,
        }
    }

    pub(crate) fn cost_multiplier(self) -> f64 {
        match self {
            Self::Easy => 0.8,
            Self::Medium => 1.0,
            Self::Hard => 1.5,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!(
                "unknown difficulty '{other}'; expected easy, medium or hard"
            )),
        }
    }
}

/// Animation speed-up; each 40 ms tick advances this many steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct FlightSpeed(u32);

impl FlightSpeed {
    pub(crate) const NORMAL: Self = Self(1);

    pub(crate) fn steps_per_tick(self) -> u32 {
        self.0
    }
}

impl FromStr for FlightSpeed {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim_end_matches(['x', 'X']) {
            "1" => Ok(Self(1)),
            "2" => Ok(Self(2)),
            "5" => Ok(Self(5)),
            other => Err(format!(
                "unknown flight speed '{other}'; expected 1, 2 or 5"
            )),
        }
    }
}

impl fmt::Display for FlightSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum FlightError {
    #[error("pilot callsign must not be empty")]
    MissingCallsign,
    #[error("no airports available")]
    NoAirports,
    #[error("unknown airport '{0}'")]
    UnknownAirport(String),
    #[error("already at {0}")]
    SameAirport(String),
    #[error("cannot change course while in flight")]
    AlreadyFlying,
    #[error("no destination selected")]
    NoDestination,
    #[error("insufficient energy: leg needs {required}, {available} left")]
    InsufficientEnergy { required: u32, available: u32 },
    #[error("mission already over")]
    MissionOver,
}

pub(crate) fn validate_callsign(raw: &str) -> Result<String, FlightError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FlightError::MissingCallsign);
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LegQuote {
    pub(crate) from: String,
    pub(crate) to: String,
    pub(crate) distance_km: f64,
    pub(crate) weather_description: Option<String>,
    pub(crate) weather_factor: f64,
    pub(crate) energy_cost: u32,
    pub(crate) points: u32,
}

/// Prices a leg: `round(dist / 50 * weather * difficulty)` energy and
/// `round(dist / 10 * difficulty)` points.
pub(crate) fn quote_leg(
    from: &Airport,
    to: &Airport,
    weather: Option<&WeatherReport>,
    difficulty: Difficulty,
) -> LegQuote {
    let distance_km = haversine_km(from.point(), to.point());
    let weather_factor = weather.map_or(CLEAR_FACTOR, WeatherReport::factor);
    let multiplier = difficulty.cost_multiplier();
    let energy = distance_km / KM_PER_ENERGY_UNIT * weather_factor * multiplier;
    let points = distance_km / KM_PER_POINT * multiplier;
    LegQuote {
        from: from.iata_code.clone(),
        to: to.iata_code.clone(),
        distance_km,
        weather_description: weather.and_then(|report| report.description().map(str::to_string)),
        weather_factor,
        energy_cost: energy.round() as u32,
        points: points.round() as u32,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum MissionStatus {
    InProgress,
    Complete,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FlightEvent {
    DestinationSelected(LegQuote),
    FlightStarted {
        from: String,
        to: String,
    },
    PlaneMoved {
        position: GeoPoint,
        heading_deg: f64,
        progress: f64,
    },
    Arrived {
        airport: String,
        energy: u32,
        score: u32,
    },
    Log(String),
    MissionComplete {
        score: u32,
    },
    MissionFailed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveFlight {
    quote: LegQuote,
    destination: usize,
    origin: GeoPoint,
    target: GeoPoint,
    heading_deg: f64,
    step: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FlightSnapshot {
    pub(crate) pilot: String,
    pub(crate) difficulty: Difficulty,
    pub(crate) speed: FlightSpeed,
    pub(crate) current_airport: String,
    pub(crate) energy: u32,
    pub(crate) score: u32,
    pub(crate) target_points: u32,
    pub(crate) legs: Vec<LegQuote>,
    pub(crate) mission: MissionStatus,
}

/// The flight minigame economy: energy, score and one leg at a time.
pub(crate) struct FlightSession {
    pilot: String,
    difficulty: Difficulty,
    speed: FlightSpeed,
    airports: Vec<Airport>,
    current: usize,
    selected: Option<(usize, LegQuote)>,
    flight: Option<ActiveFlight>,
    energy: u32,
    score: u32,
    legs: Vec<LegQuote>,
    mission: MissionStatus,
    events: Vec<FlightEvent>,
}

impl FlightSession {
    pub(crate) fn new(
        pilot: &str,
        difficulty: Difficulty,
        speed: FlightSpeed,
        airports: Vec<Airport>,
    ) -> Result<Self, FlightError> {
        let pilot = validate_callsign(pilot)?;
        if airports.is_empty() {
            return Err(FlightError::NoAirports);
        }
        info!(
            pilot = %pilot,
            difficulty = ?difficulty,
            speed = %speed,
            start = %airports[0].iata_code,
            target_points = difficulty.target_points(),
            "flight_session_started"
        );
        Ok(Self {
            pilot,
            difficulty,
            speed,
            airports,
            current: 0,
            selected: None,
            flight: None,
            energy: MAX_ENERGY,
            score: 0,
            legs: Vec::new(),
            mission: MissionStatus::InProgress,
            events: Vec::new(),
        })
    }

    pub(crate) fn airports(&self) -> &[Airport] {
        &self.airports
    }

    pub(crate) fn current_airport(&self) -> &Airport {
        &self.airports[self.current]
    }

    pub(crate) fn energy(&self) -> u32 {
        self.energy
    }

    pub(crate) fn score(&self) -> u32 {
        self.score
    }

    pub(crate) fn is_flying(&self) -> bool {
        self.flight.is_some()
    }

    pub(crate) fn mission(&self) -> &MissionStatus {
        &self.mission
    }

    pub(crate) fn is_over(&self) -> bool {
        self.mission != MissionStatus::InProgress
    }

    #[cfg(test)]
    pub(crate) fn selected_quote(&self) -> Option<&LegQuote> {
        self.selected.as_ref().map(|(_, quote)| quote)
    }

    /// Quotes a leg from the current airport. Weather comes from the caller so
    /// that a failed lookup simply means no penalty.
    pub(crate) fn select_destination(
        &mut self,
        iata_code: &str,
        weather: Option<&WeatherReport>,
    ) -> Result<LegQuote, FlightError> {
        if self.is_over() {
            return Err(FlightError::MissionOver);
        }
        if self.is_flying() {
            return Err(FlightError::AlreadyFlying);
        }
        let destination = self
            .airports
            .iter()
            .position(|airport| airport.iata_code.eq_ignore_ascii_case(iata_code))
            .ok_or_else(|| FlightError::UnknownAirport(iata_code.to_string()))?;
        if destination == self.current {
            let code = self.airports[destination].iata_code.clone();
            return Err(FlightError::SameAirport(code));
        }

        let quote = quote_leg(
            &self.airports[self.current],
            &self.airports[destination],
            weather,
            self.difficulty,
        );
        self.selected = Some((destination, quote.clone()));
        self.events
            .push(FlightEvent::DestinationSelected(quote.clone()));
        Ok(quote)
    }

    pub(crate) fn start_flight(&mut self) -> Result<(), FlightError> {
        if self.is_over() {
            return Err(FlightError::MissionOver);
        }
        if self.is_flying() {
            return Err(FlightError::AlreadyFlying);
        }
        let Some((destination, quote)) = self.selected.clone() else {
            self.events
                .push(FlightEvent::Log(SELECT_AIRPORT_LOG.to_string()));
            return Err(FlightError::NoDestination);
        };
        if quote.energy_cost > self.energy {
            self.events
                .push(FlightEvent::Log(INSUFFICIENT_ENERGY_LOG.to_string()));
            return Err(FlightError::InsufficientEnergy {
                required: quote.energy_cost,
                available: self.energy,
            });
        }

        let origin = self.airports[self.current].point();
        let target = self.airports[destination].point();
        info!(
            from = %quote.from,
            to = %quote.to,
            distance_km = quote.distance_km,
            energy_cost = quote.energy_cost,
            points = quote.points,
            "flight_started"
        );
        self.events.push(FlightEvent::FlightStarted {
            from: quote.from.clone(),
            to: quote.to.clone(),
        });
        self.flight = Some(ActiveFlight {
            quote,
            destination,
            origin,
            target,
            heading_deg: heading_degrees(origin, target),
            step: 0,
        });
        Ok(())
    }

    /// One 40 ms animation tick. Returns true when this tick landed the plane.
    pub(crate) fn advance_step(&mut self) -> bool {
        let Some(flight) = self.flight.as_mut() else {
            return false;
        };
        flight.step = flight.step.saturating_add(self.speed.steps_per_tick());
        let t = (f64::from(flight.step) / f64::from(FLIGHT_STEPS)).min(1.0);
        self.events.push(FlightEvent::PlaneMoved {
            position: lerp_point(flight.origin, flight.target, t),
            heading_deg: flight.heading_deg,
            progress: t,
        });
        if t < 1.0 {
            return false;
        }
        self.finish_flight();
        true
    }

    fn finish_flight(&mut self) {
        let Some(flight) = self.flight.take() else {
            return;
        };
        self.energy = self
            .energy
            .saturating_sub(flight.quote.energy_cost)
            .min(MAX_ENERGY);
        self.score = self.score.saturating_add(flight.quote.points);
        self.current = flight.destination;
        self.selected = None;
        info!(
            airport = %flight.quote.to,
            energy = self.energy,
            score = self.score,
            "flight_arrived"
        );
        self.events
            .push(FlightEvent::Log(format!("Arrived at {}", flight.quote.to)));
        self.events.push(FlightEvent::Arrived {
            airport: flight.quote.to.clone(),
            energy: self.energy,
            score: self.score,
        });
        self.legs.push(flight.quote);

        if self.score >= self.difficulty.target_points() {
            self.mission = MissionStatus::Complete;
            info!(
                score = self.score,
                legs = self.legs.len(),
                "flight_mission_complete"
            );
            self.events
                .push(FlightEvent::MissionComplete { score: self.score });
        }
    }

    /// Ends the mission without reaching the target, e.g. when no affordable
    /// leg remains.
    pub(crate) fn abandon(&mut self, reason: &str) {
        if self.is_over() {
            return;
        }
        self.flight = None;
        self.mission = MissionStatus::Failed {
            reason: reason.to_string(),
        };
        info!(reason, score = self.score, "flight_mission_failed");
        self.events.push(FlightEvent::MissionFailed {
            reason: reason.to_string(),
        });
    }

    pub(crate) fn drain_events(&mut self) -> Vec<FlightEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn snapshot(&self) -> FlightSnapshot {
        FlightSnapshot {
            pilot: self.pilot.clone(),
            difficulty: self.difficulty,
            speed: self.speed,
            current_airport: self.current_airport().iata_code.clone(),
            energy: self.energy,
            score: self.score,
            target_points: self.difficulty.target_points(),
            legs: self.legs.clone(),
            mission: self.mission.clone(),
        }
    }

    pub(crate) fn find_airport(&self, iata_code: &str) -> Option<&Airport> {
        find_airport(&self.airports, iata_code)
    }
}

#[cfg(test)]
mod tests {
    use super::super::airports::fallback_airports;
    use super::super::weather::{WeatherCondition, WeatherMain, WeatherWind};
    use super::*;

    fn weather(description: &str) -> WeatherReport {
        WeatherReport {
            weather: vec![WeatherCondition {
                description: description.to_string(),
            }],
            main: WeatherMain { temp: 20.0 },
            wind: WeatherWind { speed: 3.0 },
        }
    }

    fn session(difficulty: Difficulty, speed: FlightSpeed) -> FlightSession {
        FlightSession::new("Maverick", difficulty, speed, fallback_airports()).expect("session")
    }

    fn fly_to_arrival(session: &mut FlightSession) -> u32 {
        let mut ticks = 0;
        while !session.advance_step() {
            ticks += 1;
            assert!(ticks <= FLIGHT_STEPS, "flight never landed");
        }
        ticks + 1
    }

    #[test]
    fn callsign_is_required_and_trimmed() {
        assert_eq!(validate_callsign("   "), Err(FlightError::MissingCallsign));
        assert_eq!(validate_callsign("  Ace "), Ok("Ace".to_string()));
        let airports = fallback_airports();
        let blank = FlightSession::new("", Difficulty::Medium, FlightSpeed::NORMAL, airports);
        assert!(blank.is_err());
    }

    #[test]
    fn difficulty_and_speed_parse_from_cli_tokens() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("brutal".parse::<Difficulty>().is_err());
        let speed = "5x".parse::<FlightSpeed>();
        assert_eq!(speed.map(FlightSpeed::steps_per_tick), Ok(5));
        assert!("3".parse::<FlightSpeed>().is_err());
    }

    #[test]
    fn quote_applies_weather_and_difficulty() {
        let airports = fallback_airports();
        let (jfk, ord) = (&airports[0], &airports[2]);
        let distance = haversine_km(jfk.point(), ord.point());

        let clear = quote_leg(jfk, ord, None, Difficulty::Medium);
        assert_eq!(clear.energy_cost, (distance / 50.0).round() as u32);
        assert_eq!(clear.points, (distance / 10.0).round() as u32);
        assert_eq!(clear.weather_factor, 1.0);

        let storm = quote_leg(jfk, ord, Some(&weather("thunderstorm")), Difficulty::Hard);
        assert_eq!(
            storm.energy_cost,
            (distance / 50.0 * 1.8 * 1.5).round() as u32
        );
        assert_eq!(storm.points, (distance / 10.0 * 1.5).round() as u32);
        assert_eq!(storm.weather_description.as_deref(), Some("thunderstorm"));
    }

    #[test]
    fn start_requires_destination_and_energy() {
        let mut session = session(Difficulty::Medium, FlightSpeed::NORMAL);
        assert_eq!(session.start_flight(), Err(FlightError::NoDestination));

        session
            .select_destination("LAX", Some(&weather("snow")))
            .expect("quote");
        session.energy = 10;
        assert!(matches!(
            session.start_flight(),
            Err(FlightError::InsufficientEnergy { available: 10, .. })
        ));
        let logs: Vec<_> = session
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                FlightEvent::Log(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(logs, [SELECT_AIRPORT_LOG, INSUFFICIENT_ENERGY_LOG]);
    }

    #[test]
    fn cannot_reselect_or_restart_while_flying() {
        let mut session = session(Difficulty::Easy, FlightSpeed::NORMAL);
        session.select_destination("ORD", None).expect("quote");
        session.start_flight().expect("start");
        assert_eq!(
            session.select_destination("MIA", None),
            Err(FlightError::AlreadyFlying)
        );
        assert_eq!(session.start_flight(), Err(FlightError::AlreadyFlying));
        assert_eq!(
            session.selected_quote().map(|quote| quote.to.as_str()),
            Some("ORD")
        );
    }

    #[test]
    fn flight_takes_200_steps_divided_by_speed() {
        for (speed, expected_ticks) in [("1", 200), ("2", 100), ("5", 40)] {
            let mut session = session(Difficulty::Easy, speed.parse().expect("speed"));
            session.select_destination("ORD", None).expect("quote");
            session.start_flight().expect("start");
            assert_eq!(
                fly_to_arrival(&mut session),
                expected_ticks,
                "speed {speed}"
            );
            assert_eq!(session.current_airport().iata_code, "ORD");
        }
    }

    #[test]
    fn plane_moves_linearly_with_fixed_heading() {
        let mut session = session(Difficulty::Medium, FlightSpeed::NORMAL);
        session.select_destination("MIA", None).expect("quote");
        session.start_flight().expect("start");
        session.drain_events();
        for _ in 0..100 {
            session.advance_step();
        }
        let jfk = session.airports()[0].point();
        let mia = session.find_airport("MIA").expect("mia").point();
        let moved: Vec<_> = session
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                FlightEvent::PlaneMoved {
                    position,
                    heading_deg,
                    progress,
                } => Some((position, heading_deg, progress)),
                _ => None,
            })
            .collect();
        assert_eq!(moved.len(), 100);
        let (halfway, heading, progress) = moved[99];
        assert!((progress - 0.5).abs() < 1e-12);
        let expected = lerp_point(jfk, mia, 0.5);
        assert!((halfway.lat_deg - expected.lat_deg).abs() < 1e-9);
        assert!((halfway.lon_deg - expected.lon_deg).abs() < 1e-9);
        assert!(moved.iter().all(|(_, h, _)| *h == heading));
        assert!((heading - heading_degrees(jfk, mia)).abs() < 1e-12);
    }

    #[test]
    fn arrival_spends_energy_and_completes_at_target() {
        let mut session = session(Difficulty::Medium, FlightSpeed(5));
        let quote = session.select_destination("LAX", None).expect("quote");
        session.start_flight().expect("start");
        fly_to_arrival(&mut session);

        assert_eq!(session.energy(), MAX_ENERGY - quote.energy_cost);
        assert_eq!(session.score(), quote.points);
        assert!(quote.points >= Difficulty::Medium.target_points());
        assert_eq!(session.mission(), &MissionStatus::Complete);
        assert!(session
            .drain_events()
            .iter()
            .any(|event| matches!(event, FlightEvent::MissionComplete { .. })));
        assert_eq!(
            session.select_destination("ORD", None),
            Err(FlightError::MissionOver)
        );
    }

    #[test]
    fn abandon_fails_once() {
        let mut session = session(Difficulty::Hard, FlightSpeed::NORMAL);
        session.abandon(INSUFFICIENT_ENERGY_LOG);
        session.abandon("again");
        assert_eq!(
            session.mission(),
            &MissionStatus::Failed {
                reason: INSUFFICIENT_ENERGY_LOG.to_string()
            }
        );
        let failures = session
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, FlightEvent::MissionFailed { .. }))
            .count();
        assert_eq!(failures, 1);
    }

    #[test]
    fn same_and_unknown_airports_are_rejected() {
        let mut session = session(Difficulty::Medium, FlightSpeed::NORMAL);
        assert_eq!(
            session.select_destination("jfk", None),
            Err(FlightError::SameAirport("JFK".to_string()))
        );
        assert_eq!(
            session.select_destination("ZZZ", None),
            Err(FlightError::UnknownAirport("ZZZ".to_string()))
        );
    }
}
