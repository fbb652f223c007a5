use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert_eq!(Fps::new(24, 1).unwrap().to_string(), "24");
}

#[test]
fn fps_same_rate_is_rational() {
    let a = Fps::new(30, 1).unwrap();
    let b = Fps::new(60, 2).unwrap();
    let c = Fps::new(30000, 1001).unwrap();
    assert!(a.same_rate(b));
    assert!(!a.same_rate(c));
}

#[test]
fn time_range_requires_end_after_start() {
    assert!(TimeRange::new(1.0, 4.0).is_ok());
    assert!(TimeRange::new(4.0, 4.0).is_err());
    assert!(TimeRange::new(4.0, 1.0).is_err());
    assert!(TimeRange::new(-1.0, 1.0).is_err());
    assert!(TimeRange::new(0.0, f64::NAN).is_err());
    assert!(TimeRange::full(0.0).is_err());
}

#[test]
fn time_range_rejects_unschedulable_lengths() {
    let err = TimeRange::full(1e20).unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::RangeInvalid);
    assert!(TimeRange::new(0.0, f64::MAX).is_err());

    let raw = TimeRange { start: 0.0, end: 1e20 };
    assert_eq!(raw.duration(), Duration::MAX);
}

#[test]
fn duration_secs_rejects_overflow() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "duration_secs")]
        d: Duration,
    }
    let ok: Wrapper = serde_json::from_str(r#"{ "d": 1.5 }"#).unwrap();
    assert_eq!(ok.d, Duration::from_millis(1500));
    assert!(serde_json::from_str::<Wrapper>(r#"{ "d": 1e30 }"#).is_err());
}

#[test]
fn time_range_duration() {
    let r = TimeRange::new(1.5, 4.0).unwrap();
    assert_eq!(r.duration_secs(), 2.5);
    assert_eq!(r.duration(), Duration::from_millis(2500));
}

#[test]
fn session_id_short_is_eight_hex_digits() {
    let id = SessionId::new_v4();
    let short = id.short();
    assert_eq!(short.len(), 8);
    assert!(id.to_string().starts_with(&short));
}
