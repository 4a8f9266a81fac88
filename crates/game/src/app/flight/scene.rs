use relic_engine::{DefDatabase, InputSnapshot, Scene, SceneCommand};
use tracing::{error, info, warn};

use super::api::{fetch_weather, load_airports, FlightApi};
use super::geo::haversine_km;
use super::session::{
    Difficulty, FlightError, FlightEvent, FlightSession, FlightSpeed, MissionStatus,
    INSUFFICIENT_ENERGY_LOG, STEP_INTERVAL_SECONDS,
};
use crate::app::presentation::{MissionLog, MissionRecord, Presenter};

pub(crate) const ROUTE_EXHAUSTED_REASON: &str = "Route exhausted before reaching target.";

pub(crate) struct FlightSceneConfig {
    pub(crate) pilot: String,
    pub(crate) difficulty: Difficulty,
    pub(crate) speed: FlightSpeed,
    /// Destinations in order. Empty means the autopilot picks each leg.
    pub(crate) route: Vec<String>,
    /// Issued once the success screen has been shown.
    pub(crate) on_success: SceneCommand,
}

/// Drives a flight session from the fixed-step loop: picks a leg, flies it in
/// 40 ms animation steps, repeats until the target score or a dead end.
pub(crate) struct FlightScene {
    config: FlightSceneConfig,
    api: Box<dyn FlightApi>,
    presenter: Box<dyn Presenter<FlightEvent>>,
    mission_log: MissionLog,
    session: Option<FlightSession>,
    route_cursor: usize,
    step_accumulator: f32,
    end_presented: bool,
}

impl FlightScene {
    pub(crate) fn new(
        config: FlightSceneConfig,
        api: Box<dyn FlightApi>,
        presenter: Box<dyn Presenter<FlightEvent>>,
        mission_log: MissionLog,
    ) -> Self {
        Self {
            config,
            api,
            presenter,
            mission_log,
            session: None,
            route_cursor: 0,
            step_accumulator: 0.0,
            end_presented: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Option<&FlightSession> {
        self.session.as_ref()
    }

    /// Selects and launches the next leg, or abandons the mission when no leg
    /// can be flown.
    fn begin_next_leg(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if self.config.route.is_empty() {
            autopilot_leg(session, self.api.as_mut());
            return;
        }

        while let Some(code) = self.config.route.get(self.route_cursor) {
            self.route_cursor += 1;
            let Some(point) = session.find_airport(code).map(|airport| airport.point()) else {
                warn!(airport = %code, "route_airport_unknown");
                continue;
            };
            let weather = fetch_weather(self.api.as_mut(), point);
            if let Err(select_error) = session.select_destination(code, weather.as_ref()) {
                warn!(airport = %code, error = %select_error, "route_leg_skipped");
                continue;
            }
            match session.start_flight() {
                Ok(()) => return,
                Err(FlightError::InsufficientEnergy { .. }) => {
                    session.abandon(INSUFFICIENT_ENERGY_LOG);
                    return;
                }
                Err(start_error) => {
                    warn!(airport = %code, error = %start_error, "route_leg_skipped");
                }
            }
        }
        session.abandon(ROUTE_EXHAUSTED_REASON);
    }
}

/// Tries destinations farthest first and flies the first one the remaining
/// energy covers once weather is priced in.
fn autopilot_leg(session: &mut FlightSession, api: &mut dyn FlightApi) {
    let origin = session.current_airport().point();
    let current_code = session.current_airport().iata_code.clone();
    let mut candidates: Vec<_> = session
        .airports()
        .iter()
        .filter(|airport| airport.iata_code != current_code)
        .map(|airport| {
            (
                airport.iata_code.clone(),
                airport.point(),
                haversine_km(origin, airport.point()),
            )
        })
        .collect();
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

    for (code, point, _) in candidates {
        let weather = fetch_weather(api, point);
        if session.select_destination(&code, weather.as_ref()).is_err() {
            continue;
        }
        if session.start_flight().is_ok() {
            return;
        }
    }
    session.abandon(INSUFFICIENT_ENERGY_LOG);
}

impl Scene for FlightScene {
    fn load(&mut self, _defs: &DefDatabase) {
        self.route_cursor = 0;
        self.step_accumulator = 0.0;
        self.end_presented = false;
        let airports = load_airports(self.api.as_mut());
        match FlightSession::new(
            &self.config.pilot,
            self.config.difficulty,
            self.config.speed,
            airports,
        ) {
            Ok(session) => {
                info!(
                    airports = session.airports().len(),
                    route = ?self.config.route,
                    "flight_scene_loaded"
                );
                self.session = Some(session);
            }
            Err(load_error) => {
                error!(error = %load_error, "flight_session_rejected");
                self.session = None;
            }
        }
    }

    fn update(&mut self, fixed_dt_seconds: f32, _input: &InputSnapshot) -> SceneCommand {
        let Some(session) = self.session.as_ref() else {
            return SceneCommand::Exit;
        };
        if session.is_over() {
            if !self.end_presented {
                return SceneCommand::None;
            }
            return match session.mission() {
                MissionStatus::Complete => self.config.on_success,
                _ => SceneCommand::Exit,
            };
        }
        if !session.is_flying() {
            self.step_accumulator = 0.0;
            self.begin_next_leg();
            return SceneCommand::None;
        }

        self.step_accumulator += fixed_dt_seconds.max(0.0);
        let Some(session) = self.session.as_mut() else {
            return SceneCommand::Exit;
        };
        while self.step_accumulator >= STEP_INTERVAL_SECONDS {
            self.step_accumulator -= STEP_INTERVAL_SECONDS;
            if session.advance_step() {
                self.step_accumulator = 0.0;
                break;
            }
        }
        SceneCommand::None
    }

    fn present(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut ended = false;
        for event in session.drain_events() {
            ended |= matches!(
                event,
                FlightEvent::MissionComplete { .. } | FlightEvent::MissionFailed { .. }
            );
            self.presenter.apply(&event);
        }
        if ended {
            self.end_presented = true;
            self.mission_log
                .record(MissionRecord::Flight(session.snapshot()));
        }
    }

    fn unload(&mut self) {
        self.session = None;
    }

    fn debug_title(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        Some(format!(
            "Flight | {} | Energy {}% | Score {}/{}",
            session.current_airport().iata_code,
            session.energy(),
            session.score(),
            self.config.difficulty.target_points()
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use relic_engine::SceneKey;

    use super::super::api::test_support::StubFlightApi;
    use super::super::weather::{WeatherCondition, WeatherMain, WeatherReport, WeatherWind};
    use super::*;
    use crate::app::presentation::test_support::RecordingPresenter;

    const TICK: f32 = 1.0 / 60.0;

    fn scene_with(
        pilot: &str,
        difficulty: Difficulty,
        route: &[&str],
        api: StubFlightApi,
    ) -> (FlightScene, Rc<RefCell<Vec<FlightEvent>>>, MissionLog) {
        let (presenter, events) = RecordingPresenter::new();
        let log = MissionLog::default();
        let scene = FlightScene::new(
            FlightSceneConfig {
                pilot: pilot.to_string(),
                difficulty,
                speed: "5".parse().expect("speed"),
                route: route.iter().map(|code| code.to_string()).collect(),
                on_success: SceneCommand::SwitchTo(SceneKey::B),
            },
            Box::new(api),
            Box::new(presenter),
            log.clone(),
        );
        (scene, events, log)
    }

    fn run_until_command(scene: &mut FlightScene, max_ticks: u32) -> SceneCommand {
        for _ in 0..max_ticks {
            let command = scene.update(TICK, &InputSnapshot::empty());
            scene.present();
            if command != SceneCommand::None {
                return command;
            }
        }
        panic!("scene never issued a command");
    }

    #[test]
    fn missing_callsign_exits_without_a_session() {
        let (mut scene, _, _) = scene_with("  ", Difficulty::Medium, &[], StubFlightApi::default());
        scene.load(&DefDatabase::default());
        assert!(scene.session().is_none());
        assert_eq!(
            scene.update(TICK, &InputSnapshot::empty()),
            SceneCommand::Exit
        );
    }

    #[test]
    fn autopilot_reaches_target_and_hands_off() {
        let (mut scene, events, log) =
            scene_with("Ace", Difficulty::Medium, &[], StubFlightApi::default());
        scene.load(&DefDatabase::default());

        let command = run_until_command(&mut scene, 2_000);
        assert_eq!(command, SceneCommand::SwitchTo(SceneKey::B));

        let session = scene.session().expect("session");
        assert_eq!(session.current_airport().iata_code, "LAX");
        assert_eq!(session.mission(), &MissionStatus::Complete);
        assert!(events
            .borrow()
            .iter()
            .any(|event| matches!(event, FlightEvent::MissionComplete { .. })));
        assert_eq!(log.records().len(), 1);
    }

    #[test]
    fn unknown_route_stops_are_skipped_and_exhaustion_fails() {
        let (mut scene, events, _) = scene_with(
            "Ace",
            Difficulty::Medium,
            &["ZZZ", "ORD"],
            StubFlightApi::default(),
        );
        scene.load(&DefDatabase::default());

        let command = run_until_command(&mut scene, 5_000);
        assert_eq!(command, SceneCommand::Exit);
        let arrivals: Vec<_> = events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                FlightEvent::Arrived { airport, .. } => Some(airport.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(arrivals, ["ORD"]);
        assert_eq!(
            scene.session().expect("session").mission(),
            &MissionStatus::Failed {
                reason: ROUTE_EXHAUSTED_REASON.to_string()
            }
        );
    }

    #[test]
    fn storm_pricing_can_ground_the_route() {
        let api = StubFlightApi {
            weather: Some(WeatherReport {
                weather: vec![WeatherCondition {
                    description: "thunderstorm".to_string(),
                }],
                main: WeatherMain { temp: 18.0 },
                wind: WeatherWind { speed: 12.0 },
            }),
            ..StubFlightApi::default()
        };
        let (mut scene, events, _) = scene_with("Ace", Difficulty::Hard, &["LAX"], api);
        scene.load(&DefDatabase::default());

        assert_eq!(run_until_command(&mut scene, 10), SceneCommand::Exit);
        let notice = FlightEvent::Log(INSUFFICIENT_ENERGY_LOG.to_string());
        assert!(events.borrow().contains(&notice));
    }
}
