use serde_json::json;

use super::*;
use crate::{
    assets::model::CaptureSettings,
    foundation::{core::Fps, error::ErrorKind},
    host::{DurableStore, ModeControl},
    range::RangePolicy,
    scene::model::{CompositionHandle, TimingMarker},
    sim::{SimComposition, SimHost},
};

const STEP: Duration = Duration::from_millis(100);

fn setup(markers: Vec<TimingMarker>, range: RangePolicy) -> (SimHost, RecordingJob) {
    let mut host = SimHost::new().with_switch_latency(Duration::from_millis(300));
    let rig = host.add_node("Scenes/Main", None, "Rig");
    host.add_director("Scenes/Main", Some(rig), "Director", true);
    host.add_composition(SimComposition {
        path: CompositionHandle::new("Timelines/Shot010"),
        duration: 10.0,
        tracks: vec![],
        markers,
    });
    let job = RecordingJob::new(
        "shot010",
        CompositionHandle::new("Timelines/Shot010"),
        NodeDescriptor::from_path("Scenes/Main", "Rig/Director"),
        Fps::new(30, 1).unwrap(),
    )
    .with_recorder(CaptureSettings::new("movie", json!({ "codec": "h264" })))
    .with_recorder(CaptureSettings::new("image", serde_json::Value::Null))
    .with_range(range);
    (host, job)
}

fn pre_post() -> Vec<TimingMarker> {
    vec![
        TimingMarker::new("pre", 1.0, ""),
        TimingMarker::new("post", 4.0, ""),
    ]
}

fn step(session: &mut RecordingSession, host: &mut SimHost, now: &mut Duration) -> SessionState {
    *now += STEP;
    host.advance(*now);
    session.tick(host, *now)
}

fn run_to_end(session: &mut RecordingSession, host: &mut SimHost, now: &mut Duration) {
    let limit = *now + Duration::from_secs(120);
    while !session.state().is_terminal() {
        assert!(*now < limit, "session stuck in {}", session.state());
        step(session, host, now);
    }
}

fn run_until(
    session: &mut RecordingSession,
    host: &mut SimHost,
    now: &mut Duration,
    target: SessionState,
) {
    let limit = *now + Duration::from_secs(120);
    while session.state() != target {
        assert!(*now < limit, "never reached {target}");
        assert!(!session.state().is_terminal(), "ended in {}", session.state());
        step(session, host, now);
    }
}

fn assert_clean(session: &RecordingSession, host: &SimHost) {
    for path in session.temp_assets() {
        assert!(!host.exists(path), "leaked {path}");
    }
    assert!(host.asset_paths().is_empty());
    assert!(host.durable_keys().is_empty());
    assert!(!host.is_runtime_active());
    assert_eq!(host.auto_start_of("Scenes/Main", "Rig/Director"), Some(true));
}

#[test]
fn marker_job_completes_and_cleans_up() {
    let (mut host, job) = setup(pre_post(), RangePolicy::markers("pre", "post", true));
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;

    run_until(&mut session, &mut host, &mut now, SessionState::Recording);
    assert_eq!(host.auto_start_of("Scenes/Main", "Rig/Director"), Some(false));
    assert_eq!(session.temp_assets().len(), 3);

    run_to_end(&mut session, &mut host, &mut now);
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.captured_range(), Some(TimeRange::new(1.0, 4.0).unwrap()));
    assert_clean(&session, &host);

    let captures = host.captures();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].recorders, vec!["movie", "image"]);
    assert_eq!(captures[0].range, TimeRange::new(1.0, 4.0).unwrap());

    let report = session.report();
    assert!(report.succeeded());
    assert_eq!(report.reached, SessionState::Recording);
    assert!(report.error_kind.is_none());
}

#[test]
fn missing_marker_falls_back_with_diagnostic() {
    let (mut host, job) = setup(
        vec![TimingMarker::new("pre", 1.0, "")],
        RangePolicy::markers("pre", "post", true),
    );
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.captured_range(), Some(TimeRange::new(0.0, 10.0).unwrap()));
    let report = session.report();
    assert!(report.diagnostics.iter().any(|d| d.contains("fallback")));
}

#[test]
fn missing_marker_without_fallback_fails_before_any_asset() {
    let (mut host, job) = setup(
        vec![TimingMarker::new("pre", 1.0, "")],
        RangePolicy::markers("pre", "post", false),
    );
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.report().error_kind, Some(ErrorKind::RangeInvalid));
    assert_eq!(session.report().reached, SessionState::PreparingAssets);
    assert!(session.temp_assets().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn stuck_runtime_switch_fails_within_timeout_plus_one_tick() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    host.faults.stuck_switch = true;
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;

    run_until(&mut session, &mut host, &mut now, SessionState::AwaitingRuntimeReady);
    let requested_at = now;
    while session.state() == SessionState::AwaitingRuntimeReady {
        step(&mut session, &mut host, &mut now);
        assert!(now <= requested_at + Duration::from_secs(5) + STEP);
    }
    assert!(now >= requested_at + Duration::from_secs(5));

    run_to_end(&mut session, &mut host, &mut now);
    assert_eq!(session.state(), SessionState::Failed);
    let report = session.report();
    assert_eq!(report.error_kind, Some(ErrorKind::ModeTransitionTimeout));
    assert_eq!(report.reached, SessionState::AwaitingRuntimeReady);
    assert!(host.asset_paths().is_empty());
    assert!(host.durable_keys().is_empty());
}

#[test]
fn partial_build_is_cleaned_up() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    host.faults.fail_create_matching = Some("-rec1".to_string());
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.report().error_kind, Some(ErrorKind::AssetBuildFailed));
    assert_eq!(session.report().reached, SessionState::PreparingAssets);
    assert!(session.temp_assets().len() >= 2);
    assert_clean(&session, &host);
}

#[test]
fn missing_runtime_node_fails_binding() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let dir = host.find("Scenes/Main", "Rig/Director").unwrap();
    host.set_editor_only(dir, true);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Failed);
    let report = session.report();
    assert_eq!(report.error_kind, Some(ErrorKind::ReferenceNotFound));
    assert_eq!(report.reached, SessionState::BindingReferences);
    assert_clean(&session, &host);
}

#[test]
fn playback_error_routes_through_runtime_exit() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::Recording);

    host.faults.playback_error = true;
    run_to_end(&mut session, &mut host, &mut now);
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.report().error_kind, Some(ErrorKind::UnexpectedHostError));
    assert_eq!(session.report().reached, SessionState::Recording);
    assert_clean(&session, &host);
}

#[test]
fn hung_playback_times_out_after_duration_plus_grace() {
    let (mut host, job) = setup(pre_post(), RangePolicy::markers("pre", "post", false));
    host.faults.playback_hangs = true;
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::Recording);
    let started = now;

    while session.state() == SessionState::Recording {
        step(&mut session, &mut host, &mut now);
    }
    let waited = now - started;
    assert!(waited >= Duration::from_secs(13));
    assert!(waited <= Duration::from_secs(13) + STEP);

    run_to_end(&mut session, &mut host, &mut now);
    assert_eq!(session.report().error_kind, Some(ErrorKind::RecordingTimeout));
    assert!(host.captures().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn cancel_while_recording_exits_runtime_then_cleans() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::Recording);

    session.cancel();
    assert_eq!(step(&mut session, &mut host, &mut now), SessionState::ExitingRuntime);
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(session.report().reached, SessionState::Recording);
    assert!(session.report().error_kind.is_none());
    assert!(host.captures().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn cancel_during_runtime_switch_waits_for_it() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::AwaitingRuntimeReady);

    session.cancel();
    assert_eq!(
        step(&mut session, &mut host, &mut now),
        SessionState::AwaitingRuntimeReady
    );
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(session.report().reached, SessionState::AwaitingRuntimeReady);
    assert_clean(&session, &host);
}

#[test]
fn cancel_before_start_creates_nothing() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    session.cancel();
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(session.report().reached, SessionState::Queued);
    assert!(session.temp_assets().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn unschedulable_composition_length_fails_before_any_asset() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    host.add_composition(SimComposition {
        path: CompositionHandle::new("Timelines/Shot010"),
        duration: 1e20,
        tracks: vec![],
        markers: vec![],
    });
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.report().error_kind, Some(ErrorKind::RangeInvalid));
    assert_eq!(session.report().reached, SessionState::PreparingAssets);
    assert!(session.temp_assets().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn cancel_while_preparing_creates_nothing() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::PreparingAssets);

    session.cancel();
    assert_eq!(step(&mut session, &mut host, &mut now), SessionState::Cancelled);
    assert_eq!(session.report().reached, SessionState::PreparingAssets);
    assert!(session.temp_assets().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn cancel_after_build_deletes_assets_without_switching() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::EnteringRuntime);
    assert_eq!(session.temp_assets().len(), 3);
    assert!(session.temp_assets().iter().all(|p| host.exists(p)));
    assert_eq!(host.auto_start_of("Scenes/Main", "Rig/Director"), Some(false));

    session.cancel();
    assert_eq!(step(&mut session, &mut host, &mut now), SessionState::Cancelled);
    assert_eq!(session.report().reached, SessionState::EnteringRuntime);
    assert_clean(&session, &host);
}

#[test]
fn cancel_while_binding_exits_runtime_first() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::BindingReferences);

    session.cancel();
    assert_eq!(step(&mut session, &mut host, &mut now), SessionState::ExitingRuntime);
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(session.report().reached, SessionState::BindingReferences);
    assert!(host.captures().is_empty());
    assert_clean(&session, &host);
}

#[test]
fn cancel_after_completion_is_ignored() {
    let (mut host, job) = setup(pre_post(), RangePolicy::markers("pre", "post", false));
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::ExitingRuntime);

    session.cancel();
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Completed);
    assert!(session.report().error_kind.is_none());
    assert_eq!(host.captures().len(), 1);
    assert_clean(&session, &host);
}

#[test]
fn stuck_exit_switch_fails_and_reports_leaked_assets() {
    let (mut host, job) = setup(pre_post(), RangePolicy::markers("pre", "post", false));
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::ExitingRuntime);

    host.faults.stuck_switch = true;
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Failed);
    let report = session.report();
    assert_eq!(report.error_kind, Some(ErrorKind::ModeTransitionTimeout));
    assert_eq!(report.reached, SessionState::ExitingRuntime);
    assert!(host.is_runtime_active());
    assert_eq!(report.temp_assets_leaked, session.temp_assets());
    assert_eq!(host.asset_paths().len(), 3);
    assert!(host.durable_keys().is_empty());
}

#[test]
fn lost_record_during_cancel_is_kept_as_diagnostic() {
    let (mut host, job) = setup(pre_post(), RangePolicy::FullDuration);
    let mut session = RecordingSession::new(job, &BatchConfig::default());
    let mut now = Duration::ZERO;
    run_until(&mut session, &mut host, &mut now, SessionState::AwaitingRuntimeReady);

    for key in host.durable_keys() {
        DurableStore::delete(&mut host, &key);
    }
    session.cancel();
    run_to_end(&mut session, &mut host, &mut now);

    assert_eq!(session.state(), SessionState::Cancelled);
    let report = session.report();
    assert!(report.error_kind.is_none());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.contains("ignored after cancel"))
    );
    assert_clean(&session, &host);
}
