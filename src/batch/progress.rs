use crate::{
    foundation::core::JobId,
    session::{report::JobReport, state::SessionState},
};

/// Snapshot of a batch's position.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Progress {
    /// Jobs that reached a terminal state, including jobs dropped by a cancel.
    pub completed: usize,
    pub total: usize,
    pub current_job_id: Option<JobId>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Receives batch events as they happen. Both methods default to no-ops.
pub trait ProgressObserver {
    /// Called when a tick leaves the active session in a different state than it found it.
    fn on_state_changed(&mut self, _job: &JobId, _from: SessionState, _to: SessionState) {}

    /// Called once per job, with its terminal report.
    fn on_job_finished(&mut self, _report: &JobReport) {}
}

/// Aggregate outcome of a batch, in job order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchReport {
    pub fn from_jobs(jobs: Vec<JobReport>) -> Self {
        let (succeeded, failed, cancelled) = tally(&jobs);
        Self {
            jobs,
            succeeded,
            failed,
            cancelled,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

pub(crate) fn tally(jobs: &[JobReport]) -> (usize, usize, usize) {
    jobs.iter().fold((0, 0, 0), |(ok, failed, cancelled), r| match r.outcome {
        SessionState::Completed => (ok + 1, failed, cancelled),
        SessionState::Cancelled => (ok, failed, cancelled + 1),
        _ => (ok, failed + 1, cancelled),
    })
}
