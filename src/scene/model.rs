/// Opaque reference to a source timed composition (its asset path in the host).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CompositionHandle(pub String);

impl CompositionHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompositionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a live scene node, valid only for one scene generation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TransientId(pub u64);

/// Named point on a composition's timeline. Read-only; sourced from the host.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingMarker {
    /// The marker asset's own name.
    pub name: String,
    /// Composition-local time in seconds.
    pub time: f64,
    /// Track the marker lives on; empty for composition-level markers.
    #[serde(default)]
    pub owner_track_name: String,
    /// Dedicated display-name field, when the marker type has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Generic name/label field, when the marker type has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TimingMarker {
    pub fn new(name: impl Into<String>, time: f64, owner_track_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time,
            owner_track_name: owner_track_name.into(),
            display_name: None,
            label: None,
        }
    }

    /// Name shown to users: display-name field, then label, then the asset name.
    ///
    /// Blank fields are skipped.
    pub fn resolved_name(&self) -> &str {
        [self.display_name.as_deref(), self.label.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TrackKind {
    /// Marker track authored by this tool; scanned first.
    RecorderControl,
    /// Generic marker track.
    Markers,
    #[default]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrackInfo {
    pub name: String,
    #[serde(default)]
    pub kind: TrackKind,
}

impl TrackInfo {
    pub fn new(name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}
