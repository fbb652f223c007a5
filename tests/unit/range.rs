use super::*;
use crate::sim::{SimComposition, SimHost};

fn host_with(markers: Vec<TimingMarker>, tracks: Vec<TrackInfo>) -> (SimHost, CompositionHandle) {
    let handle = CompositionHandle::new("Timelines/Shot010");
    let mut host = SimHost::new();
    host.add_composition(SimComposition {
        path: handle.clone(),
        duration: 10.0,
        tracks,
        markers,
    });
    (host, handle)
}

#[test]
fn full_duration_policy() {
    let (host, comp) = host_with(vec![], vec![]);
    let out = RangeCalculator::compute(&host, &comp, &RangePolicy::FullDuration).unwrap();
    assert_eq!(out.range, TimeRange::new(0.0, 10.0).unwrap());
    assert!(out.fallback.is_none());
}

#[test]
fn marker_window_is_exact() {
    let (host, comp) = host_with(
        vec![
            TimingMarker::new("pre", 1.0, ""),
            TimingMarker::new("post", 4.0, ""),
        ],
        vec![],
    );
    let policy = RangePolicy::markers("pre", "post", true);
    let out = RangeCalculator::compute(&host, &comp, &policy).unwrap();
    assert_eq!(out.range.start, 1.0);
    assert_eq!(out.range.end, 4.0);
    assert!(out.fallback.is_none());
}

#[test]
fn monotone_pairs_are_returned_verbatim() {
    for (s, e) in [(0.0, 0.5), (2.25, 2.5), (0.0, 10.0), (7.0, 9.999)] {
        let (host, comp) = host_with(
            vec![TimingMarker::new("a", s, ""), TimingMarker::new("b", e, "")],
            vec![],
        );
        let out =
            RangeCalculator::compute(&host, &comp, &RangePolicy::markers("a", "b", true)).unwrap();
        assert_eq!((out.range.start, out.range.end), (s, e));
    }
}

#[test]
fn out_of_order_or_equal_falls_back() {
    for (s, e) in [(4.0, 1.0), (3.0, 3.0)] {
        let (host, comp) = host_with(
            vec![TimingMarker::new("a", s, ""), TimingMarker::new("b", e, "")],
            vec![],
        );
        let out =
            RangeCalculator::compute(&host, &comp, &RangePolicy::markers("a", "b", true)).unwrap();
        assert_eq!((out.range.start, out.range.end), (0.0, 10.0));
        assert!(matches!(
            out.fallback,
            Some(MarkerProblem::OutOfOrder { .. })
        ));
    }
}

#[test]
fn missing_marker_without_fallback_is_invalid() {
    let (host, comp) = host_with(vec![TimingMarker::new("pre", 1.0, "")], vec![]);
    let err = RangeCalculator::compute(&host, &comp, &RangePolicy::markers("pre", "post", false))
        .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::RangeInvalid);
    assert!(err.to_string().contains("post"));
}

#[test]
fn missing_marker_names_are_reported() {
    let (host, comp) = host_with(vec![], vec![]);
    let out = RangeCalculator::compute(&host, &comp, &RangePolicy::markers("pre", "post", true))
        .unwrap();
    assert_eq!(
        out.fallback,
        Some(MarkerProblem::Missing {
            names: vec!["pre".to_string(), "post".to_string()]
        })
    );
}

#[test]
fn recorder_control_tracks_win_over_generic_markers() {
    let (host, comp) = host_with(
        vec![
            TimingMarker::new("pre", 0.5, "Authoring"),
            TimingMarker::new("pre", 2.0, "Recorder"),
            TimingMarker::new("post", 6.0, "Recorder"),
        ],
        vec![
            TrackInfo::new("Authoring", TrackKind::Markers),
            TrackInfo::new("Recorder", TrackKind::RecorderControl),
        ],
    );
    let out = RangeCalculator::compute(&host, &comp, &RangePolicy::markers("pre", "post", false))
        .unwrap();
    assert_eq!((out.range.start, out.range.end), (2.0, 6.0));
}

#[test]
fn earliest_match_wins_within_a_track_class() {
    let (host, comp) = host_with(
        vec![
            TimingMarker::new("pre", 3.0, ""),
            TimingMarker::new("pre", 1.0, ""),
            TimingMarker::new("post", 5.0, ""),
        ],
        vec![],
    );
    let out = RangeCalculator::compute(&host, &comp, &RangePolicy::markers("pre", "post", false))
        .unwrap();
    assert_eq!(out.range.start, 1.0);
}

#[test]
fn display_name_field_is_matched() {
    let mut labelled = TimingMarker::new("Marker", 2.0, "");
    labelled.display_name = Some("pre".to_string());
    let (host, comp) = host_with(vec![labelled, TimingMarker::new("post", 3.0, "")], vec![]);
    let out = RangeCalculator::compute(&host, &comp, &RangePolicy::markers("pre", "post", false))
        .unwrap();
    assert_eq!(out.range.start, 2.0);
}

#[test]
fn unknown_composition_is_a_host_error() {
    let host = SimHost::new();
    let err = RangeCalculator::compute(
        &host,
        &CompositionHandle::new("missing"),
        &RangePolicy::FullDuration,
    )
    .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::UnexpectedHostError);
}

#[test]
fn policy_json_shape() {
    let p: RangePolicy = serde_json::from_str(
        r#"{ "kind": "markers", "start": "pre", "end": "post" }"#,
    )
    .unwrap();
    assert_eq!(p, RangePolicy::markers("pre", "post", true));
    let p: RangePolicy = serde_json::from_str(r#"{ "kind": "full_duration" }"#).unwrap();
    assert_eq!(p, RangePolicy::FullDuration);
}
