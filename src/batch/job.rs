use crate::{
    assets::model::CaptureSettings,
    foundation::{
        core::{Fps, JobId},
        error::{CaptureError, CaptureResult},
    },
    range::RangePolicy,
    scene::{model::CompositionHandle, reference::NodeDescriptor},
};

/// An immutable capture request. Owned by the queue until dequeued, then by its session.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordingJob {
    pub id: JobId,
    /// Source timed composition.
    pub composition: CompositionHandle,
    /// Node that owns and plays `composition` in the scene.
    pub director: NodeDescriptor,
    /// One opaque settings object per requested output, in output order.
    pub recorders: Vec<CaptureSettings>,
    #[serde(default = "full_duration")]
    pub range: RangePolicy,
    pub frame_rate: Fps,
}

fn full_duration() -> RangePolicy {
    RangePolicy::FullDuration
}

impl RecordingJob {
    pub fn new(
        id: impl Into<String>,
        composition: CompositionHandle,
        director: NodeDescriptor,
        frame_rate: Fps,
    ) -> Self {
        Self {
            id: JobId::new(id),
            composition,
            director,
            recorders: Vec::new(),
            range: RangePolicy::FullDuration,
            frame_rate,
        }
    }

    pub fn with_recorder(mut self, settings: CaptureSettings) -> Self {
        self.recorders.push(settings);
        self
    }

    pub fn with_range(mut self, range: RangePolicy) -> Self {
        self.range = range;
        self
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(CaptureError::validation("job id must be non-empty"));
        }
        if self.composition.as_str().trim().is_empty() {
            return Err(CaptureError::validation(format!(
                "job '{}' has no composition",
                self.id
            )));
        }
        if self.recorders.is_empty() {
            return Err(CaptureError::validation(format!(
                "job '{}' has no recorder settings",
                self.id
            )));
        }
        if self.recorders.iter().any(|r| r.recorder.trim().is_empty()) {
            return Err(CaptureError::validation(format!(
                "job '{}' has a recorder without a type tag",
                self.id
            )));
        }
        if self.director.container.is_empty()
            || (self.director.hierarchy_path.is_empty() && self.director.display_name.is_empty())
        {
            return Err(CaptureError::validation(format!(
                "job '{}' has an empty director reference",
                self.id
            )));
        }
        Fps::new(self.frame_rate.num, self.frame_rate.den)?;
        if let RangePolicy::Markers { start, end, .. } = &self.range
            && (start.trim().is_empty() || end.trim().is_empty())
        {
            return Err(CaptureError::validation(format!(
                "job '{}' names an empty marker",
                self.id
            )));
        }
        Ok(())
    }
}
