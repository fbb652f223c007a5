use std::{collections::VecDeque, time::Duration};

use crate::{
    batch::{
        job::RecordingJob,
        progress::{BatchReport, Progress, ProgressObserver, tally},
    },
    config::BatchConfig,
    foundation::{
        core::JobId,
        error::{CaptureError, CaptureResult},
    },
    host::{AssetStore, Host},
    session::{recording_session::RecordingSession, report::JobReport},
};

/// Runs jobs strictly one at a time. A failed job never stops the queue.
pub struct BatchQueue {
    config: BatchConfig,
    pending: VecDeque<RecordingJob>,
    active: Option<RecordingSession>,
    reports: Vec<JobReport>,
    total: usize,
    started: bool,
    cancelled: bool,
    observers: Vec<Box<dyn ProgressObserver>>,
    /// Temp assets a finished session could not delete, with the index of its report.
    orphans: Vec<(usize, String)>,
    /// When the queue started waiting for Design Mode before the next job.
    held_since: Option<Duration>,
}

impl BatchQueue {
    pub fn new(config: BatchConfig) -> CaptureResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pending: VecDeque::new(),
            active: None,
            reports: Vec::new(),
            total: 0,
            started: false,
            cancelled: false,
            observers: Vec::new(),
            orphans: Vec::new(),
            held_since: None,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    /// Validate and append a job. Rejected jobs leave the queue untouched.
    pub fn enqueue(&mut self, job: RecordingJob) -> CaptureResult<()> {
        if self.cancelled {
            return Err(CaptureError::validation(format!(
                "batch was cancelled; job '{}' not queued",
                job.id
            )));
        }
        job.validate()?;
        if !job.frame_rate.same_rate(self.config.frame_rate) {
            return Err(CaptureError::validation(format!(
                "job '{}' runs at {} fps but the batch runs at {} fps",
                job.id, job.frame_rate, self.config.frame_rate
            )));
        }
        if self.knows(&job.id) {
            return Err(CaptureError::validation(format!(
                "duplicate job id '{}'",
                job.id
            )));
        }
        tracing::debug!(job = %job.id, position = self.pending.len(), "job queued");
        self.pending.push_back(job);
        self.total += 1;
        Ok(())
    }

    pub fn start(&mut self) {
        if !self.started {
            tracing::info!(jobs = self.total, "batch started");
            self.started = true;
        }
    }

    /// Cancel the active session and drop every job that has not started.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Some(session) = &mut self.active {
            session.cancel();
        }
        let dropped: Vec<_> = self.pending.drain(..).collect();
        tracing::info!(
            active = ?self.active.as_ref().map(|s| s.job().id.clone()),
            dropped = dropped.len(),
            "batch cancel requested"
        );
        for job in dropped {
            self.finish(JobReport::dropped(job.id));
        }
    }

    /// Advance the active session by one step, starting the next job when none is active.
    ///
    /// Temp assets left behind by an earlier session are deleted first, as soon as Design Mode is
    /// back. While they are waiting, the next job is held for up to the exit-runtime timeout.
    pub fn tick<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) {
        if !self.started {
            return;
        }
        if self.active.is_none() {
            self.sweep_orphans(host);
            if self.pending.is_empty() {
                return;
            }
            if !self.orphans.is_empty() && host.is_runtime_active() {
                let since = *self.held_since.get_or_insert(now);
                let until = since
                    .checked_add(self.config.exit_runtime_timeout)
                    .unwrap_or(Duration::MAX);
                if now < until {
                    return;
                }
                tracing::warn!(
                    orphans = self.orphans.len(),
                    "Design Mode still not back; starting next job anyway"
                );
            }
            self.held_since = None;
            let Some(job) = self.pending.pop_front() else {
                return;
            };
            let session = RecordingSession::new(job, &self.config);
            tracing::info!(
                job = %session.job().id,
                session = %session.id(),
                index = self.reports.len() + 1,
                total = self.total,
                "job started"
            );
            self.active = Some(session);
        }
        let Some(session) = &mut self.active else {
            return;
        };

        let from = session.state();
        let to = session.tick(host, now);
        if from != to {
            let job = session.job().id.clone();
            for o in &mut self.observers {
                o.on_state_changed(&job, from, to);
            }
        }
        if to.is_terminal() {
            let report = session.report();
            self.active = None;
            if let Some(kind) = report.error_kind
                && !report.succeeded()
            {
                tracing::warn!(
                    job = %report.job_id,
                    %kind,
                    reached = %report.reached,
                    "job failed; continuing"
                );
            }
            let index = self.reports.len();
            self.orphans.extend(
                report
                    .temp_assets_leaked
                    .iter()
                    .map(|path| (index, path.clone())),
            );
            self.finish(report);
            if self.is_finished() {
                let (ok, failed, cancelled) = tally(&self.reports);
                tracing::info!(ok, failed, cancelled, "batch finished");
            }
        }
    }

    pub fn progress(&self) -> Progress {
        let (succeeded, failed, cancelled) = tally(&self.reports);
        Progress {
            completed: self.reports.len(),
            total: self.total,
            current_job_id: self.active.as_ref().map(|s| s.job().id.clone()),
            succeeded,
            failed,
            cancelled,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started && !self.is_finished()
    }

    /// No active session and nothing pending, after `start` or `cancel`.
    pub fn is_finished(&self) -> bool {
        (self.started || self.cancelled) && self.active.is_none() && self.pending.is_empty()
    }

    pub fn active(&self) -> Option<&RecordingSession> {
        self.active.as_ref()
    }

    /// Temp assets still waiting for Design Mode to come back.
    pub fn orphaned_assets(&self) -> Vec<&str> {
        self.orphans.iter().map(|(_, p)| p.as_str()).collect()
    }

    /// Terminal reports so far, in completion order.
    pub fn reports(&self) -> &[JobReport] {
        &self.reports
    }

    pub fn report(&self) -> BatchReport {
        BatchReport::from_jobs(self.reports.clone())
    }

    fn knows(&self, id: &JobId) -> bool {
        self.pending.iter().any(|j| &j.id == id)
            || self.active.as_ref().is_some_and(|s| &s.job().id == id)
            || self.reports.iter().any(|r| &r.job_id == id)
    }

    fn sweep_orphans<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.orphans.is_empty() || host.is_runtime_active() {
            return;
        }
        let mut kept = Vec::new();
        for (index, path) in std::mem::take(&mut self.orphans) {
            let deleted = !host.exists(&path) || AssetStore::delete(&mut *host, &path).is_ok();
            if !deleted {
                kept.push((index, path));
                continue;
            }
            tracing::info!(%path, "leftover temp asset deleted");
            if let Some(report) = self.reports.get_mut(index) {
                report.temp_assets_leaked.retain(|p| p != &path);
                report
                    .diagnostics
                    .push(format!("temp asset '{path}' deleted after Design Mode returned"));
            }
        }
        self.orphans = kept;
    }

    fn finish(&mut self, report: JobReport) {
        for o in &mut self.observers {
            o.on_job_finished(&report);
        }
        self.reports.push(report);
    }
}
