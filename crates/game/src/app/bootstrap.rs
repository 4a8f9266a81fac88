use std::env;
use std::path::PathBuf;
use std::time::Duration;

use relic_engine::{ClockMode, InputSource, LoopConfig, Scene, SceneCommand, SceneKey};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::flight::{
    validate_callsign, Difficulty, FlightError, FlightScene, FlightSceneConfig, FlightSpeed,
    HttpFlightApi, API_BASE_ENV_VAR, DEFAULT_API_BASE,
};
use super::forest::{self, SharedActionLatch};
use super::presentation::{MissionLog, TracingPresenter};
use super::script::{IdleInput, ScriptError, ScriptedInput};

/// Headless runs stop here even if no scene ever exits.
const SIMULATED_SESSION_LIMIT: Duration = Duration::from_secs(15 * 60);
const SIMULATED_FRAME_DT: Duration = Duration::from_micros(16_667);

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("missing subcommand")]
    MissingSubcommand,
    #[error("unknown subcommand '{0}'")]
    UnknownSubcommand(String),
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),
    #[error("missing value for {0}")]
    MissingValue(&'static str),
    #[error("invalid {flag} value '{value}': {reason}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Callsign(#[from] FlightError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunOptions {
    /// Level variant, by the scene slot it normally occupies.
    pub(crate) variant: SceneKey,
    pub(crate) seed: Option<u64>,
    pub(crate) script: Option<PathBuf>,
    pub(crate) realtime: bool,
    pub(crate) max_seconds: Option<u64>,
    pub(crate) report: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            variant: SceneKey::A,
            seed: None,
            script: None,
            realtime: false,
            max_seconds: None,
            report: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlightOptions {
    pub(crate) pilot: String,
    pub(crate) difficulty: Difficulty,
    pub(crate) speed: FlightSpeed,
    pub(crate) api_base: Option<String>,
    pub(crate) route: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CliRequest {
    Help,
    Forest(RunOptions),
    Flight(FlightOptions, RunOptions),
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliRequest, CliError> {
    let command = args.first().ok_or(CliError::MissingSubcommand)?;
    let rest = &args[1..];
    match command.as_str() {
        "-h" | "--help" | "help" => Ok(CliRequest::Help),
        "forest" => {
            let mut run = RunOptions::default();
            let mut index = 0usize;
            while index < rest.len() {
                match parse_run_flag(rest, index, &mut run)? {
                    Some(next) => index = next,
                    None => return Err(CliError::UnknownArgument(rest[index].clone())),
                }
            }
            Ok(CliRequest::Forest(run))
        }
        "flight" => {
            let mut run = RunOptions::default();
            let mut pilot = None;
            let mut difficulty = Difficulty::Medium;
            let mut speed = FlightSpeed::NORMAL;
            let mut api_base = None;
            let mut route = Vec::new();
            let mut index = 0usize;
            while index < rest.len() {
                if let Some(next) = parse_run_flag(rest, index, &mut run)? {
                    index = next;
                    continue;
                }
                let flag = rest[index].as_str();
                match flag {
                    "--pilot" => pilot = Some(flag_value(rest, index, "--pilot")?.to_string()),
                    "--difficulty" => {
                        difficulty = parse_flag(rest, index, "--difficulty", str::parse)?;
                    }
                    "--speed" => speed = parse_flag(rest, index, "--speed", str::parse)?,
                    "--api-base" => {
                        api_base = Some(flag_value(rest, index, "--api-base")?.to_string());
                    }
                    "--route" => {
                        route = flag_value(rest, index, "--route")?
                            .split(',')
                            .map(str::trim)
                            .filter(|entry| !entry.is_empty())
                            .map(str::to_ascii_uppercase)
                            .collect();
                    }
                    _ => return Err(CliError::UnknownArgument(flag.to_string())),
                }
                index += 2;
            }
            let pilot = validate_callsign(pilot.as_deref().unwrap_or_default())?;
            Ok(CliRequest::Flight(
                FlightOptions {
                    pilot,
                    difficulty,
                    speed,
                    api_base,
                    route,
                },
                run,
            ))
        }
        other => Err(CliError::UnknownSubcommand(other.to_string())),
    }
}

/// Consumes one shared flag at `index`. Returns the index after it, or `None`
/// when the argument is not a shared flag.
fn parse_run_flag(
    args: &[String],
    index: usize,
    run: &mut RunOptions,
) -> Result<Option<usize>, CliError> {
    match args[index].as_str() {
        "--variant" => {
            run.variant = parse_flag(args, index, "--variant", parse_variant)?;
        }
        "--seed" => run.seed = Some(parse_flag(args, index, "--seed", str::parse::<u64>)?),
        "--script" => run.script = Some(PathBuf::from(flag_value(args, index, "--script")?)),
        "--max-seconds" => {
            run.max_seconds = Some(parse_flag(args, index, "--max-seconds", str::parse::<u64>)?);
        }
        "--report" => run.report = Some(PathBuf::from(flag_value(args, index, "--report")?)),
        "--realtime" => {
            run.realtime = true;
            return Ok(Some(index + 1));
        }
        _ => return Ok(None),
    }
    Ok(Some(index + 2))
}

fn parse_variant(raw: &str) -> Result<SceneKey, &'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "a" | "lost" => Ok(SceneKey::A),
        "b" | "guarded" => Ok(SceneKey::B),
        _ => Err("expected a or b"),
    }
}

fn flag_value<'a>(
    args: &'a [String],
    index: usize,
    flag: &'static str,
) -> Result<&'a str, CliError> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or(CliError::MissingValue(flag))
}

fn parse_flag<T, E: ToString>(
    args: &[String],
    index: usize,
    flag: &'static str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, CliError> {
    let value = flag_value(args, index, flag)?;
    parse(value).map_err(|reason| CliError::InvalidValue {
        flag,
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

pub(crate) fn usage_text() -> String {
    [
        "sky_relic - Sky Relic level simulation",
        "",
        "Usage:",
        "  sky_relic forest [--variant a|b] [--seed <u64>] [--script <file>]",
        "                   [--realtime] [--max-seconds <u64>] [--report <file>]",
        "  sky_relic flight --pilot <callsign> [--difficulty easy|medium|hard]",
        "                   [--speed 1|2|5] [--api-base <url>] [--route <IATA,...>]",
        "                   [forest options]",
        "",
        "Keys (input scripts): w/a/s/d or arrows move, r restarts, Tab switches level,",
        "Escape quits.",
        "",
        "Environment:",
        "  SKYRELIC_API_BASE  flight API base URL (default http://127.0.0.1:8000)",
        "  SKYRELIC_ROOT      project root containing assets/",
        "  RUST_LOG           tracing filter (default info)",
    ]
    .join("\n")
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene_a: Box<dyn Scene>,
    pub(crate) scene_b: Box<dyn Scene>,
    pub(crate) input: Box<dyn InputSource>,
    pub(crate) report_path: Option<PathBuf>,
    pub(crate) mission_log: MissionLog,
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_app(request: CliRequest) -> Result<AppWiring, CliError> {
    info!("=== Sky Relic Startup ===");
    let mission_log = MissionLog::default();
    let (run, scene_a, scene_b, start_scene) = match request {
        CliRequest::Help => return Err(CliError::MissingSubcommand),
        CliRequest::Forest(run) => {
            let seed = resolve_seed(run.seed);
            info!(seed, variant = ?run.variant, "forest_mode");
            let (scene_a, scene_b) = forest::build_scene_pair(seed, &mission_log);
            let start_scene = run.variant;
            (run, scene_a, scene_b, start_scene)
        }
        CliRequest::Flight(flight, run) => {
            let seed = resolve_seed(run.seed);
            let api_base = flight
                .api_base
                .clone()
                .or_else(|| env::var(API_BASE_ENV_VAR).ok())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
            info!(
                seed,
                pilot = %flight.pilot,
                difficulty = ?flight.difficulty,
                speed = %flight.speed,
                api_base = %api_base,
                "flight_mode"
            );
            let scene_a: Box<dyn Scene> = Box::new(FlightScene::new(
                FlightSceneConfig {
                    pilot: flight.pilot,
                    difficulty: flight.difficulty,
                    speed: flight.speed,
                    route: flight.route,
                    on_success: SceneCommand::SwitchTo(SceneKey::B),
                },
                Box::new(HttpFlightApi::new(&api_base)),
                Box::new(TracingPresenter::new("flight")),
                mission_log.clone(),
            ));
            let scene_b = forest::build_level_scene(
                SceneKey::B,
                run.variant,
                None,
                seed,
                &SharedActionLatch::default(),
                &mission_log,
            );
            (run, scene_a, scene_b, SceneKey::A)
        }
    };

    let input: Box<dyn InputSource> = match &run.script {
        Some(path) => Box::new(ScriptedInput::load(path)?),
        None => Box::new(IdleInput),
    };
    let config = loop_config(&run, start_scene);

    Ok(AppWiring {
        config,
        scene_a,
        scene_b,
        input,
        report_path: run.report,
        mission_log,
    })
}

fn resolve_seed(requested: Option<u64>) -> u64 {
    requested.unwrap_or_else(rand::random)
}

fn loop_config(run: &RunOptions, start_scene: SceneKey) -> LoopConfig {
    let (clock, default_limit) = if run.realtime {
        (ClockMode::Realtime, None)
    } else {
        (
            ClockMode::Simulated {
                frame_dt: SIMULATED_FRAME_DT,
            },
            Some(SIMULATED_SESSION_LIMIT),
        )
    };
    LoopConfig {
        clock,
        max_session_duration: run.max_seconds.map(Duration::from_secs).or(default_limit),
        start_scene,
        ..LoopConfig::default()
    }
}
