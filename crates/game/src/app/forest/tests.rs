use std::path::Path;
use std::time::Duration;

use relic_engine::{
    compile_defs_from_str, run_loop, ClockMode, CompletionRule, DamageModel, DefDatabase,
    InputAction, InputSnapshot, LevelArchetype, LevelDefId, LevelTuning, LoopConfig,
    MetricsHandle, Scene, SceneCommand, SceneKey, StopReason, Vec2,
};

use super::events::LevelEvent;
use super::scene_impl::{ForestScene, ForestSceneConfig, SharedActionLatch};
use super::session::{LevelSession, ALL_FRAGMENTS_NOTIFICATION};
use super::spawn::LevelLayout;
use super::types::{AiState, EndCause, FAILURE_TITLE, MAX_HEALTH, SUCCESS_TITLE};
use super::{def_name_for, GUARDED_GROVE_DEF, LOST_FOREST_DEF};
use crate::app::presentation::test_support::RecordingPresenter;
use crate::app::presentation::{MissionLog, MissionRecord};
use crate::app::script::IdleInput;

const FRAME: f32 = 1.0 / 60.0;
const SHIPPED_LEVELS: &str = include_str!("../../../../../assets/base/levels.xml");

fn archetype(tuning: LevelTuning) -> LevelArchetype {
    LevelArchetype {
        id: LevelDefId(0),
        def_name: "forest.test".to_string(),
        label: "Test Grove".to_string(),
        tuning,
    }
}

fn guarded_tuning() -> LevelTuning {
    LevelTuning {
        damage: DamageModel::Cooldown {
            amount: 10.0,
            cooldown_seconds: 0.6,
        },
        completion: CompletionRule::Immediate,
        ..LevelTuning::default()
    }
}

fn session_with(tuning: LevelTuning, layout: LevelLayout) -> LevelSession {
    LevelSession::from_layout(&archetype(tuning), 7, layout)
}

/// A layout with one far-away fragment so the level never completes by itself.
fn quiet_layout() -> LevelLayout {
    LevelLayout::with_player(Vec2::ZERO).fragment(Vec2::new(25.0, 25.0))
}

fn held(actions: &[InputAction]) -> InputSnapshot {
    let mut snapshot = InputSnapshot::empty();
    for action in actions {
        snapshot = snapshot.with_action_down(*action, true);
    }
    snapshot
}

fn mission_ended_count(events: &[LevelEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, LevelEvent::MissionEnded(_)))
        .count()
}

fn shipped_defs() -> DefDatabase {
    compile_defs_from_str(Path::new("levels.xml"), SHIPPED_LEVELS).expect("shipped defs")
}

#[test]
fn idle_player_does_not_move() {
    let mut session = session_with(LevelTuning::default(), quiet_layout());
    for _ in 0..30 {
        session.frame_update(FRAME, &InputSnapshot::empty());
    }
    assert_eq!(session.player().position(), Vec2::ZERO);
    assert_eq!(session.player().transform.rotation_radians, None);

    session.frame_update(0.0, &held(&[InputAction::MoveForward]));
    assert_eq!(session.player().position(), Vec2::ZERO);
}

#[test]
fn forward_moves_toward_negative_depth() {
    let mut session = session_with(LevelTuning::default(), quiet_layout());
    session.frame_update(0.5, &held(&[InputAction::MoveForward]));
    let position = session.player().position();
    assert!((position.y + 3.0).abs() < 1e-4);
    assert!(position.x.abs() < 1e-6);
}

#[test]
fn blocked_move_keeps_position_and_facing() {
    let layout = quiet_layout().obstacle(Vec2::new(0.0, -1.0));
    let mut session = session_with(LevelTuning::default(), layout);
    assert_eq!(session.obstacles().len(), 1);

    session.frame_update(FRAME, &held(&[InputAction::MoveForward]));
    assert_eq!(session.player().position(), Vec2::ZERO);
    assert_eq!(session.player().transform.rotation_radians, None);
}

#[test]
fn chasing_enemy_closes_distance_every_frame() {
    let layout = quiet_layout().enemy(Vec2::new(0.0, 5.0), 0.0);
    let mut session = session_with(LevelTuning::default(), layout);

    let mut distance = session.enemies()[0].actor.position().distance(Vec2::ZERO);
    for _ in 0..40 {
        session.frame_update(FRAME, &InputSnapshot::empty());
        let next = session.enemies()[0].actor.position().distance(Vec2::ZERO);
        assert_eq!(session.enemies()[0].state, AiState::Chase);
        assert!(next < distance, "{next} should be below {distance}");
        distance = next;
    }
}

#[test]
fn enemy_wanders_until_the_player_comes_within_range() {
    let layout = quiet_layout().enemy(Vec2::new(20.0, 0.0), 0.0);
    let mut session = session_with(LevelTuning::default(), layout);
    session.frame_update(FRAME, &InputSnapshot::empty());

    assert_eq!(session.enemies()[0].state, AiState::Wander);
    assert_eq!(session.snapshot().enemies_chasing, 0);

    // Wandering at heading 0 drifts along +y.
    let wanderer = session.enemies()[0].actor.position();
    assert!(wanderer.y > 0.0);
    assert!((wanderer.x - 20.0).abs() < 1e-4);

    let player = wanderer - Vec2::new(5.0, 0.0);
    session.set_player_position(player);
    let before = wanderer.distance(player);
    session.frame_update(FRAME, &InputSnapshot::empty());

    assert_eq!(session.enemies()[0].state, AiState::Chase);
    assert_eq!(session.snapshot().enemies_chasing, 1);
    let after = session.enemies()[0].actor.position().distance(player);
    assert!(after < before, "{after} should be below {before}");
}

#[test]
fn health_is_clamped_and_failure_fires_once() {
    let mut session = session_with(LevelTuning::default(), quiet_layout());
    session.apply_damage(85.0);
    assert!((session.hud().health - 15.0).abs() < 1e-4);
    assert!(!session.is_ended());

    session.apply_damage(20.0);
    assert_eq!(session.hud().health, 0.0);
    let outcome = session.outcome().expect("outcome");
    assert!(!outcome.success);
    assert_eq!(outcome.cause, EndCause::HealthDepleted);
    assert_eq!(outcome.title, FAILURE_TITLE);
    assert!((100..400).contains(&outcome.points));

    session.apply_damage(20.0);
    session.countdown_tick();
    assert_eq!(session.hud().health, 0.0);
    assert_eq!(mission_ended_count(&session.drain_events()), 1);
    assert!((0.0..=MAX_HEALTH).contains(&session.hud().health));
}

#[test]
fn continuous_damage_scales_with_contacts_and_time() {
    let layout = quiet_layout()
        .enemy(Vec2::ZERO, 0.0)
        .enemy(Vec2::new(0.5, 0.0), 0.0);
    let mut session = session_with(LevelTuning::default(), layout);
    session.frame_update(0.25, &InputSnapshot::empty());
    assert!((session.hud().health - 90.0).abs() < 1e-3);
}

#[test]
fn cooldown_damage_shares_one_window_between_enemies() {
    let layout = quiet_layout().enemy(Vec2::ZERO, 0.0).enemy(Vec2::ZERO, 0.0);
    let mut session = session_with(guarded_tuning(), layout);

    session.frame_update(0.25, &InputSnapshot::empty());
    assert!((session.hud().health - 90.0).abs() < 1e-4);
    session.frame_update(0.25, &InputSnapshot::empty());
    session.frame_update(0.25, &InputSnapshot::empty());
    assert!((session.hud().health - 90.0).abs() < 1e-4);

    session.frame_update(0.25, &InputSnapshot::empty());
    assert!((session.hud().health - 80.0).abs() < 1e-4);
}

#[test]
fn fragment_pickup_is_idempotent() {
    let layout = LevelLayout::with_player(Vec2::ZERO)
        .fragment(Vec2::new(0.5, 0.0))
        .fragment(Vec2::new(25.0, 25.0));
    let mut session = session_with(LevelTuning::default(), layout);
    for _ in 0..10 {
        session.frame_update(FRAME, &InputSnapshot::empty());
    }
    assert_eq!(session.hud().fragments_collected, 1);
    assert!(session.fragments()[0].consumed);
    assert!(!session.fragments()[1].consumed);

    let notifications: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            LevelEvent::Notification(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(notifications, ["Fragment 1/2"]);
}

fn all_fragments_collected() -> LevelSession {
    let mut layout = LevelLayout::with_player(Vec2::ZERO);
    for _ in 0..5 {
        layout = layout.fragment(Vec2::ZERO);
    }
    let mut session = session_with(LevelTuning::default(), layout);
    session.frame_update(FRAME, &InputSnapshot::empty());
    session
}

#[test]
fn last_fragment_spawns_two_chests_with_one_winner() {
    let mut session = all_fragments_collected();
    assert_eq!(session.hud().fragments_collected, 5);
    assert_eq!(session.chests().len(), 2);
    assert_eq!(
        session
            .chests()
            .iter()
            .filter(|chest| chest.is_winning)
            .count(),
        1
    );
    assert!(!session.is_ended());

    let events = session.drain_events();
    assert!(events.contains(&LevelEvent::ChestsSpawned { count: 2 }));
    let notice = LevelEvent::Notification(ALL_FRAGMENTS_NOTIFICATION.to_string());
    assert!(events.contains(&notice));
    let progress = LevelEvent::Notification("Fragment 5/5".to_string());
    assert!(events.contains(&progress));
}

#[test]
fn winning_chest_succeeds() {
    let mut session = all_fragments_collected();
    let target = session
        .chests()
        .iter()
        .find(|chest| chest.is_winning)
        .expect("winning chest")
        .position;
    session.set_player_position(target);
    session.frame_update(FRAME, &InputSnapshot::empty());

    let outcome = session.outcome().expect("outcome");
    assert!(outcome.success);
    assert_eq!(outcome.cause, EndCause::WinningChest);
    assert_eq!(outcome.title, SUCCESS_TITLE);
}

#[test]
fn decoy_chest_fails() {
    let mut session = all_fragments_collected();
    let target = session
        .chests()
        .iter()
        .find(|chest| !chest.is_winning)
        .expect("decoy chest")
        .position;
    session.set_player_position(target);
    session.frame_update(FRAME, &InputSnapshot::empty());

    let outcome = session.outcome().expect("outcome");
    assert!(!outcome.success);
    assert_eq!(outcome.cause, EndCause::DecoyChest);
}

#[test]
fn immediate_completion_wins_without_chests() {
    let layout = LevelLayout::with_player(Vec2::ZERO).fragment(Vec2::new(0.2, 0.2));
    let mut session = session_with(guarded_tuning(), layout);
    session.frame_update(FRAME, &InputSnapshot::empty());

    let outcome = session.outcome().expect("outcome");
    assert!(outcome.success);
    assert_eq!(outcome.cause, EndCause::FragmentsCollected);
    assert!(session.chests().is_empty());
}

#[test]
fn countdown_expiry_fails_once() {
    let tuning = LevelTuning {
        time_limit_seconds: 3,
        ..LevelTuning::default()
    };
    let mut session = session_with(tuning, quiet_layout());
    session.countdown_tick();
    session.countdown_tick();
    assert_eq!(session.hud().time_left_seconds, 1);
    assert!(!session.is_ended());

    session.countdown_tick();
    session.countdown_tick();
    assert_eq!(session.hud().time_left_seconds, 0);
    assert_eq!(
        session.outcome().expect("outcome").cause,
        EndCause::TimeExpired
    );
    assert_eq!(mission_ended_count(&session.drain_events()), 1);
}

#[test]
fn ended_level_ignores_input_and_timer() {
    let layout = quiet_layout().enemy(Vec2::new(0.0, 5.0), 0.0);
    let mut session = session_with(LevelTuning::default(), layout);
    session.apply_damage(MAX_HEALTH);
    assert!(session.is_ended());

    let time_left = session.hud().time_left_seconds;
    let enemy = session.enemies()[0].actor.position();
    session.frame_update(0.5, &held(&[InputAction::MoveForward]));
    session.countdown_tick();

    assert_eq!(session.player().position(), Vec2::ZERO);
    assert_eq!(session.enemies()[0].actor.position(), enemy);
    assert_eq!(session.hud().time_left_seconds, time_left);
}

#[test]
fn hud_is_published_only_on_change() {
    let mut session = session_with(LevelTuning::default(), quiet_layout());
    let hud_events = |events: Vec<LevelEvent>| {
        events
            .iter()
            .filter(|event| matches!(event, LevelEvent::HudChanged { .. }))
            .count()
    };
    assert_eq!(hud_events(session.drain_events()), 1);

    session.frame_update(FRAME, &InputSnapshot::empty());
    assert_eq!(hud_events(session.drain_events()), 0);

    session.countdown_tick();
    assert_eq!(hud_events(session.drain_events()), 1);
}

fn clock_test_defs() -> DefDatabase {
    let raw = r#"<Defs>
  <LevelDef>
    <defName>forest.lost</defName>
    <label>Clock Test</label>
    <timeLimitSeconds>3</timeLimitSeconds>
    <treeCount>0</treeCount>
    <fragmentCount>1</fragmentCount>
    <guardCount>0</guardCount>
    <enemyCount>0</enemyCount>
  </LevelDef>
</Defs>"#;
    compile_defs_from_str(Path::new("clock.xml"), raw).expect("defs")
}

fn forest_scene(
    key: SceneKey,
    switch_target: Option<SceneKey>,
    latch: &SharedActionLatch,
    log: &MissionLog,
) -> (ForestScene, std::rc::Rc<std::cell::RefCell<Vec<LevelEvent>>>) {
    let (presenter, events) = RecordingPresenter::new();
    let scene = ForestScene::new(
        ForestSceneConfig {
            def_name: def_name_for(key),
            self_key: key,
            switch_target,
            seed: 11,
            exit_when_ended: true,
        },
        latch.clone(),
        Box::new(presenter),
        log.clone(),
    );
    (scene, events)
}

fn run_clocked(frame_dt: Duration) -> (relic_engine::RunSummary, MissionLog) {
    let log = MissionLog::default();
    let latch = SharedActionLatch::default();
    let (scene_a, _) = forest_scene(SceneKey::A, None, &latch, &log);
    let (scene_b, _) = forest_scene(SceneKey::B, None, &latch, &log);
    let config = LoopConfig {
        clock: ClockMode::Simulated { frame_dt },
        max_session_duration: Some(Duration::from_secs(10)),
        ..LoopConfig::default()
    };
    let summary = run_loop(
        config,
        Box::new(scene_a),
        Box::new(scene_b),
        clock_test_defs(),
        &mut IdleInput,
        &MetricsHandle::default(),
    );
    (summary, log)
}

#[test]
fn countdown_is_frame_rate_independent() {
    for frame_dt in [Duration::from_millis(8), Duration::from_millis(33)] {
        let (summary, log) = run_clocked(frame_dt);
        assert_eq!(summary.stop_reason, StopReason::SceneExit);
        assert_eq!(summary.interval_fires, 3, "frame_dt {frame_dt:?}");
        let records = log.records();
        assert_eq!(records.len(), 1);
        let MissionRecord::Forest(snapshot) = &records[0] else {
            panic!("expected forest record");
        };
        assert_eq!(snapshot.time_left_seconds, 0);
        assert_eq!(
            snapshot.outcome.as_ref().expect("outcome").cause,
            EndCause::TimeExpired
        );
    }
}

#[test]
fn shipped_levels_load_into_their_scene_slots() {
    let defs = shipped_defs();
    assert_eq!(def_name_for(SceneKey::A), LOST_FOREST_DEF);
    assert_eq!(def_name_for(SceneKey::B), GUARDED_GROVE_DEF);

    let lost = defs.level_def_by_name(LOST_FOREST_DEF).expect("lost");
    assert_eq!(lost.label, "Lost Forest");
    assert_eq!(lost.tuning, LevelTuning::default());

    let guarded = defs.level_def_by_name(GUARDED_GROVE_DEF).expect("guarded");
    assert_eq!(guarded.tuning.completion, CompletionRule::Immediate);
    assert_eq!(
        guarded.tuning.damage,
        DamageModel::Cooldown {
            amount: 10.0,
            cooldown_seconds: 0.6
        }
    );
}

#[test]
fn random_session_is_reproducible_from_seed() {
    let defs = shipped_defs();
    let lost = defs.level_def_by_name(LOST_FOREST_DEF).expect("lost");
    let first = LevelSession::new(lost, 42);
    let second = LevelSession::new(lost, 42);
    assert_eq!(first.snapshot(), second.snapshot());
    assert_eq!(first.fragments().len(), 5);
    assert_eq!(first.enemies().len(), 8);
}

#[test]
fn restart_and_switch_fire_on_key_down_only() {
    let defs = shipped_defs();
    let log = MissionLog::default();
    let latch = SharedActionLatch::default();
    let (mut scene, events) = forest_scene(SceneKey::A, Some(SceneKey::B), &latch, &log);
    scene.load(&defs);
    assert_eq!(scene.session().expect("session").label(), "Lost Forest");
    scene.present();
    assert!(events
        .borrow()
        .iter()
        .any(|event| matches!(event, LevelEvent::ActorSpawned { .. })));

    let restart = held(&[InputAction::Restart]);
    assert_eq!(
        scene.update(FRAME, &restart),
        SceneCommand::HardResetTo(SceneKey::A)
    );
    assert_eq!(scene.update(FRAME, &restart), SceneCommand::None);

    scene.update(FRAME, &InputSnapshot::empty());
    let switch = held(&[InputAction::SwitchLevel]);
    assert_eq!(
        scene.update(FRAME, &switch),
        SceneCommand::SwitchTo(SceneKey::B)
    );

    // The other slot shares the latch, so the still-held key does not bounce back.
    let (mut other, _) = forest_scene(SceneKey::B, Some(SceneKey::A), &latch, &log);
    other.load(&defs);
    assert_eq!(other.update(FRAME, &switch), SceneCommand::None);
    assert_eq!(
        other.debug_title().expect("title").split(" | ").next(),
        Some("Guarded Grove")
    );
}

#[test]
fn missing_level_def_exits_the_scene() {
    let log = MissionLog::default();
    let (mut scene, _) = forest_scene(SceneKey::A, None, &SharedActionLatch::default(), &log);
    scene.load(&DefDatabase::default());
    assert!(scene.session().is_none());
    assert_eq!(
        scene.update(FRAME, &InputSnapshot::empty()),
        SceneCommand::Exit
    );
}

#[test]
fn ended_scene_exits_after_the_overlay_is_presented() {
    let defs = shipped_defs();
    let log = MissionLog::default();
    let (mut scene, events) = forest_scene(SceneKey::A, None, &SharedActionLatch::default(), &log);
    scene.load(&defs);
    for _ in 0..120 {
        scene.on_interval();
    }
    assert_eq!(
        scene.update(FRAME, &InputSnapshot::empty()),
        SceneCommand::None
    );
    scene.present();
    assert_eq!(mission_ended_count(&events.borrow()), 1);
    assert_eq!(log.records().len(), 1);
    assert_eq!(
        scene.update(FRAME, &InputSnapshot::empty()),
        SceneCommand::Exit
    );
}
