use crate::{
    foundation::core::{Fps, TimeRange},
    scene::{model::CompositionHandle, reference::NodeDescriptor},
};

/// Opaque capture settings produced by the host's settings factory.
///
/// The orchestrator never inspects `options`; it only persists and reloads the object once so
/// that lazily-constructed fields exist before first use.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureSettings {
    /// Recorder type tag (`"movie"`, `"image"`, `"alembic"`, `"animation"`, ...).
    pub recorder: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl CaptureSettings {
    pub fn new(recorder: impl Into<String>, options: serde_json::Value) -> Self {
        Self {
            recorder: recorder.into(),
            options,
        }
    }
}

/// Track that drives the source composition through an exposed reference slot.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlBinding {
    pub track_name: String,
    /// Exposed slot name; the live node is bound to it after each mode switch.
    pub exposed_name: String,
    /// Durable reference to the node owning the source composition.
    pub target: NodeDescriptor,
    pub range: TimeRange,
}

/// Track that records one output with one settings object.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureBinding {
    pub track_name: String,
    pub range: TimeRange,
    /// Path of the persisted settings sub-asset.
    pub settings_path: String,
    pub settings: CaptureSettings,
}

/// The temporary composition synthesized per job.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptureComposition {
    pub name: String,
    pub source: CompositionHandle,
    pub frame_rate: Fps,
    pub control: Option<ControlBinding>,
    pub captures: Vec<CaptureBinding>,
}

impl CaptureComposition {
    pub fn empty(name: impl Into<String>, source: CompositionHandle, frame_rate: Fps) -> Self {
        Self {
            name: name.into(),
            source,
            frame_rate,
            control: None,
            captures: Vec::new(),
        }
    }
}

/// Anything the orchestrator writes to the persistent asset store.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StoredAsset {
    Composition(CaptureComposition),
    Settings(CaptureSettings),
}
