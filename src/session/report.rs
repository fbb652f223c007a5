use crate::{
    foundation::{
        core::{JobId, SessionId, TimeRange},
        error::ErrorKind,
    },
    session::state::SessionState,
};

/// Everything needed to reconstruct what happened to one job without re-running it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    /// `None` for jobs dropped by a cancel before a session was created.
    pub session_id: Option<SessionId>,
    /// Terminal state.
    pub outcome: SessionState,
    /// Last working state before unwinding began: where the failure or cancel hit, or
    /// `Recording` for a completed job.
    pub reached: SessionState,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
    pub captured_range: Option<TimeRange>,
    /// Non-fatal notes (range fallback, secondary errors seen while unwinding).
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// Temp assets that could not be deleted. Empty on every healthy exit path.
    #[serde(default)]
    pub temp_assets_leaked: Vec<String>,
}

impl JobReport {
    pub(crate) fn dropped(job_id: JobId) -> Self {
        Self {
            job_id,
            session_id: None,
            outcome: SessionState::Cancelled,
            reached: SessionState::Queued,
            error_kind: None,
            message: Some("dropped by batch cancel before start".to_string()),
            captured_range: None,
            diagnostics: Vec::new(),
            temp_assets_leaked: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == SessionState::Completed
    }
}
