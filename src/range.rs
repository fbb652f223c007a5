use crate::{
    foundation::{
        core::TimeRange,
        error::{CaptureError, CaptureResult},
    },
    host::SceneGraph,
    scene::model::{CompositionHandle, TimingMarker, TrackInfo, TrackKind},
};

/// How a job's capture window is chosen.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangePolicy {
    FullDuration,
    Markers {
        start: String,
        end: String,
        #[serde(default = "default_allow_fallback")]
        allow_fallback: bool,
    },
}

fn default_allow_fallback() -> bool {
    true
}

impl RangePolicy {
    pub fn markers(start: impl Into<String>, end: impl Into<String>, allow_fallback: bool) -> Self {
        Self::Markers {
            start: start.into(),
            end: end.into(),
            allow_fallback,
        }
    }
}

/// Why the marker window could not be used.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MarkerProblem {
    Missing { names: Vec<String> },
    OutOfOrder { start: f64, end: f64 },
}

impl std::fmt::Display for MarkerProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { names } => write!(f, "marker(s) not found: {}", names.join(", ")),
            Self::OutOfOrder { start, end } => {
                write!(f, "end marker at {end}s does not follow start marker at {start}s")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RangeOutcome {
    pub range: TimeRange,
    /// Set when the full-duration fallback replaced a marker window.
    pub fallback: Option<MarkerProblem>,
}

/// Computes capture windows from composition markers.
pub struct RangeCalculator;

impl RangeCalculator {
    #[tracing::instrument(skip(scene))]
    pub fn compute<S: SceneGraph + ?Sized>(
        scene: &S,
        comp: &CompositionHandle,
        policy: &RangePolicy,
    ) -> CaptureResult<RangeOutcome> {
        let duration = scene
            .duration(comp)
            .map_err(|e| CaptureError::host(format!("duration of '{comp}': {e:#}")))?;
        let full = TimeRange::full(duration).map_err(|_| {
            CaptureError::range_invalid(format!(
                "composition '{comp}' has no usable duration ({duration}s)"
            ))
        })?;

        let (start_name, end_name, allow_fallback) = match policy {
            RangePolicy::FullDuration => {
                return Ok(RangeOutcome {
                    range: full,
                    fallback: None,
                });
            }
            RangePolicy::Markers {
                start,
                end,
                allow_fallback,
            } => (start, end, *allow_fallback),
        };

        let markers = scene
            .markers(comp)
            .map_err(|e| CaptureError::host(format!("markers of '{comp}': {e:#}")))?;
        let tracks = scene
            .tracks(comp)
            .map_err(|e| CaptureError::host(format!("tracks of '{comp}': {e:#}")))?;

        let start = find_marker(&markers, &tracks, start_name);
        let end = find_marker(&markers, &tracks, end_name);

        let problem = match (start, end) {
            (Some(s), Some(e)) => match TimeRange::new(s.time, e.time) {
                Ok(range) => {
                    return Ok(RangeOutcome {
                        range,
                        fallback: None,
                    });
                }
                Err(_) => MarkerProblem::OutOfOrder {
                    start: s.time,
                    end: e.time,
                },
            },
            (s, e) => MarkerProblem::Missing {
                names: [(s, start_name), (e, end_name)]
                    .into_iter()
                    .filter(|(m, _)| m.is_none())
                    .map(|(_, n)| n.clone())
                    .collect(),
            },
        };

        if !allow_fallback {
            return Err(CaptureError::range_invalid(format!("'{comp}': {problem}")));
        }

        tracing::warn!(composition = %comp, %problem, range = %full, "marker range fallback used");
        Ok(RangeOutcome {
            range: full,
            fallback: Some(problem),
        })
    }
}

fn track_rank(tracks: &[TrackInfo], owner: &str) -> u8 {
    match tracks.iter().find(|t| t.name == owner).map(|t| t.kind) {
        Some(TrackKind::RecorderControl) => 0,
        Some(TrackKind::Markers) => 1,
        _ => 2,
    }
}

/// Earliest marker named `name`, preferring recorder control tracks over generic ones.
fn find_marker<'a>(
    markers: &'a [TimingMarker],
    tracks: &[TrackInfo],
    name: &str,
) -> Option<&'a TimingMarker> {
    markers
        .iter()
        .filter(|m| m.time.is_finite() && m.resolved_name() == name)
        .min_by(|a, b| {
            track_rank(tracks, &a.owner_track_name)
                .cmp(&track_rank(tracks, &b.owner_track_name))
                .then(a.time.total_cmp(&b.time))
        })
}

#[cfg(test)]
#[path = "../tests/unit/range.rs"]
mod tests;
