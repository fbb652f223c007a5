use std::time::Duration;

use crate::{
    assets::builder::{CaptureAssetBuilder, TempNaming},
    batch::job::RecordingJob,
    config::BatchConfig,
    foundation::{
        core::{SessionId, TimeRange},
        error::{CaptureError, CaptureResult},
    },
    host::{AssetStore, Host, PlaybackState},
    mode::{
        record::CrossBoundaryRecord,
        transition::{ModeTransitionController, TransitionHandle, TransitionPoll},
    },
    range::RangeCalculator,
    scene::reference::{NodeDescriptor, ReferenceResolver},
    session::{
        report::JobReport,
        state::{ExitCause, SessionState},
    },
};

#[derive(Clone, Debug)]
struct SessionTimeouts {
    enter_runtime: Duration,
    exit_runtime: Duration,
    recording_grace: Duration,
}

/// Per-job state machine, advanced one step per scheduler tick.
///
/// Every exit path (success, failure, cancel) unwinds through `CleaningUp`, which deletes each
/// path in `temp_assets` and restores the director's auto-start flag. Failures and cancels
/// observed while Runtime Mode is active go through `ExitingRuntime` first.
pub struct RecordingSession {
    id: SessionId,
    job: RecordingJob,
    state: SessionState,
    reached: SessionState,
    exit: Option<ExitCause>,
    cancel_requested: bool,

    naming: TempNaming,
    timeouts: SessionTimeouts,
    controller: ModeTransitionController,

    temp_composition: Option<String>,
    temp_assets: Vec<String>,
    control_slot: Option<String>,
    captured_range: Option<TimeRange>,
    director: Option<NodeDescriptor>,
    saved_auto_start: Option<bool>,

    transition: Option<TransitionHandle>,
    recording_deadline: Option<Duration>,
    started_at: Option<Duration>,

    last_error: Option<CaptureError>,
    diagnostics: Vec<String>,
    leaked: Vec<String>,
}

impl RecordingSession {
    pub fn new(job: RecordingJob, config: &BatchConfig) -> Self {
        let id = SessionId::new_v4();
        Self {
            naming: TempNaming::new(&config.temp_asset_dir, job.id.as_str(), id),
            id,
            job,
            state: SessionState::Queued,
            reached: SessionState::Queued,
            exit: None,
            cancel_requested: false,
            timeouts: SessionTimeouts {
                enter_runtime: config.enter_runtime_timeout,
                exit_runtime: config.exit_runtime_timeout,
                recording_grace: config.recording_grace,
            },
            controller: ModeTransitionController::new(config.durable_key_prefix.clone()),
            temp_composition: None,
            temp_assets: Vec::new(),
            control_slot: None,
            captured_range: None,
            director: None,
            saved_auto_start: None,
            transition: None,
            recording_deadline: None,
            started_at: None,
            last_error: None,
            diagnostics: Vec::new(),
            leaked: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn job(&self) -> &RecordingJob {
        &self.job
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn captured_range(&self) -> Option<TimeRange> {
        self.captured_range
    }

    /// Temp asset paths recorded so far, in creation order.
    pub fn temp_assets(&self) -> &[String] {
        &self.temp_assets
    }

    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn started_at(&self) -> Option<Duration> {
        self.started_at
    }

    /// Cooperative cancel; takes effect on the next tick, or once an in-flight mode switch
    /// resolves.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.cancel_requested = true;
        }
    }

    /// Advance by at most one state transition.
    pub fn tick<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) -> SessionState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.cancel_requested && self.exit.is_none() {
            self.apply_cancel(host);
        }

        match self.state {
            SessionState::Queued => {
                self.started_at = Some(now);
                self.set_state(SessionState::PreparingAssets);
            }
            SessionState::PreparingAssets => match self.prepare(host) {
                Ok(()) => self.set_state(SessionState::EnteringRuntime),
                Err(e) => {
                    self.fail(e);
                    self.set_state(SessionState::CleaningUp);
                }
            },
            SessionState::EnteringRuntime => self.enter_runtime(host, now),
            SessionState::AwaitingRuntimeReady => self.await_runtime(host, now),
            SessionState::BindingReferences => match self.bind_and_play(host, now) {
                Ok(()) => self.set_state(SessionState::Recording),
                Err(e) => {
                    self.fail(e);
                    self.set_state(SessionState::ExitingRuntime);
                }
            },
            SessionState::Recording => self.poll_recording(host, now),
            SessionState::ExitingRuntime => self.exit_runtime(host, now),
            SessionState::CleaningUp => self.cleanup(host),
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled => {}
        }
        self.state
    }

    /// Terminal report. Meaningful once [`RecordingSession::state`] is terminal.
    pub fn report(&self) -> JobReport {
        JobReport {
            job_id: self.job.id.clone(),
            session_id: Some(self.id),
            outcome: self.state,
            reached: self.reached,
            error_kind: self.last_error.as_ref().map(CaptureError::kind),
            message: self.last_error.as_ref().map(ToString::to_string),
            captured_range: self.captured_range,
            diagnostics: self.diagnostics.clone(),
            temp_assets_leaked: self.leaked.clone(),
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if next == self.state {
            return;
        }
        tracing::info!(
            job = %self.job.id,
            session = %self.id,
            from = %self.state,
            to = %next,
            "session state changed"
        );
        if self.exit.is_none() && next.is_work() {
            self.reached = next;
        }
        self.state = next;
    }

    /// First terminal cause wins; later errors become diagnostics.
    fn fail(&mut self, err: CaptureError) {
        tracing::warn!(
            job = %self.job.id,
            session = %self.id,
            state = %self.state,
            kind = %err.kind(),
            error = %err,
            "session error"
        );
        if self.exit.is_none() {
            self.exit = Some(ExitCause::Failed);
            self.reached = self.state;
        }
        if self.last_error.is_none() {
            self.last_error = Some(err);
        } else {
            self.diagnostics.push(format!("{} while {}", err, self.state));
        }
    }

    fn apply_cancel<H: Host + ?Sized>(&mut self, host: &mut H) {
        let next = match self.state {
            // A switch underway cannot be interrupted; the cancel lands when it resolves.
            SessionState::AwaitingRuntimeReady => return,
            s if s.is_terminal() => return,
            SessionState::Recording => {
                host.stop_playback();
                SessionState::ExitingRuntime
            }
            s if s.in_runtime() => SessionState::ExitingRuntime,
            SessionState::ExitingRuntime | SessionState::CleaningUp => self.state,
            _ => SessionState::CleaningUp,
        };
        tracing::info!(
            job = %self.job.id,
            session = %self.id,
            state = %self.state,
            "session cancelled"
        );
        self.exit = Some(ExitCause::Cancelled);
        self.reached = self.state;
        self.set_state(next);
    }

    fn prepare<H: Host + ?Sized>(&mut self, host: &mut H) -> CaptureResult<()> {
        let outcome = RangeCalculator::compute(&*host, &self.job.composition, &self.job.range)?;
        if let Some(problem) = &outcome.fallback {
            self.diagnostics.push(format!(
                "marker range fallback used ({problem}), captured {}",
                outcome.range
            ));
        }
        self.captured_range = Some(outcome.range);

        let resolved = ReferenceResolver::resolve(&*host, &self.job.director)?;
        let director = ReferenceResolver::capture(&*host, resolved.node)?;

        let built = CaptureAssetBuilder::build(
            host,
            &self.job,
            outcome.range,
            &director,
            &self.naming,
            &mut self.temp_assets,
        )?;
        self.temp_composition = Some(built.composition_path);
        self.control_slot = Some(built.exposed_name);
        self.director = Some(director);

        // The capture composition drives the director; it must not start on its own.
        if let Some(flag) = host.auto_start(resolved.node) {
            self.saved_auto_start = Some(flag);
            if flag {
                host.set_auto_start(resolved.node, false)
                    .map_err(|e| CaptureError::host(format!("disable auto-start: {e:#}")))?;
            }
        }
        Ok(())
    }

    fn enter_runtime<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) {
        let (Some(path), Some(slot), Some(range)) = (
            self.temp_composition.clone(),
            self.control_slot.clone(),
            self.captured_range,
        ) else {
            self.fail(CaptureError::host("session entered runtime without built assets"));
            self.set_state(SessionState::CleaningUp);
            return;
        };
        let record = CrossBoundaryRecord {
            session_id: self.id,
            job_id: self.job.id.clone(),
            temp_asset_path: path,
            exposed_name: slot,
            duration: range.duration_secs(),
        };
        self.transition = Some(self.controller.request_switch(
            host,
            true,
            Some(&record),
            now,
            self.timeouts.enter_runtime,
        ));
        self.set_state(SessionState::AwaitingRuntimeReady);
    }

    fn await_runtime<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) {
        let Some(handle) = self.transition else {
            self.fail(CaptureError::host("no pending runtime switch"));
            self.set_state(SessionState::CleaningUp);
            return;
        };
        match handle.poll(&*host, now) {
            TransitionPoll::Pending => {}
            TransitionPoll::TimedOut => {
                self.transition = None;
                self.controller.discard_record(host, self.id);
                if self.cancel_requested && self.exit.is_none() {
                    self.exit = Some(ExitCause::Cancelled);
                    self.reached = self.state;
                }
                self.fail(CaptureError::transition_timeout(format!(
                    "Runtime Mode not active after {:?}",
                    handle.timeout
                )));
                self.set_state(SessionState::CleaningUp);
            }
            TransitionPoll::Ready => {
                self.transition = None;
                let restored = self.restore_record(host);
                if self.cancel_requested && self.exit.is_none() {
                    tracing::info!(job = %self.job.id, session = %self.id, "session cancelled");
                    self.exit = Some(ExitCause::Cancelled);
                    self.reached = self.state;
                    if let Err(e) = restored {
                        tracing::warn!(
                            job = %self.job.id,
                            error = %e,
                            "record check skipped by cancel"
                        );
                        self.diagnostics.push(format!("{e} (ignored after cancel)"));
                    }
                } else if let Err(e) = restored {
                    self.fail(e);
                }
                if self.exit.is_some() {
                    self.set_state(SessionState::ExitingRuntime);
                } else {
                    self.set_state(SessionState::BindingReferences);
                }
            }
        }
    }

    /// Read the cross-boundary record and check it against what this session wrote.
    fn restore_record<H: Host + ?Sized>(&mut self, host: &mut H) -> CaptureResult<()> {
        let record = self
            .controller
            .take_record(host, self.id)?
            .ok_or_else(|| CaptureError::host("cross-boundary record lost during mode switch"))?;
        if record.job_id != self.job.id
            || Some(&record.temp_asset_path) != self.temp_composition.as_ref()
        {
            return Err(CaptureError::host(format!(
                "cross-boundary record belongs to job '{}' ({})",
                record.job_id, record.temp_asset_path
            )));
        }
        self.control_slot = Some(record.exposed_name);
        if let Some(range) = self.captured_range
            && (range.duration_secs() - record.duration).abs() > 1e-6
        {
            self.diagnostics.push(format!(
                "carried duration {}s differs from computed {}s",
                record.duration,
                range.duration_secs()
            ));
        }
        Ok(())
    }

    fn bind_and_play<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        now: Duration,
    ) -> CaptureResult<()> {
        let (Some(path), Some(slot), Some(director), Some(range)) = (
            self.temp_composition.as_deref(),
            self.control_slot.as_deref(),
            self.director.as_ref(),
            self.captured_range,
        ) else {
            return Err(CaptureError::host("binding requested before assets were built"));
        };

        let resolved = ReferenceResolver::resolve(&*host, director)?;
        host.bind_exposed(path, slot, resolved.node)
            .map_err(|e| CaptureError::host(format!("bind control slot '{slot}': {e:#}")))?;
        let deadline = now
            .checked_add(range.duration())
            .and_then(|t| t.checked_add(self.timeouts.recording_grace))
            .ok_or_else(|| {
                CaptureError::range_invalid(format!("capture window {range} is too long"))
            })?;
        host.start_playback(path)
            .map_err(|e| CaptureError::host(format!("start playback of '{path}': {e:#}")))?;

        self.recording_deadline = Some(deadline);
        Ok(())
    }

    fn poll_recording<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) {
        match host.poll_playback() {
            Ok(PlaybackState::Finished) => {
                self.exit = Some(ExitCause::Completed);
                self.set_state(SessionState::ExitingRuntime);
            }
            Ok(PlaybackState::Playing) => {
                let Some(deadline) = self.recording_deadline else {
                    return;
                };
                if now >= deadline {
                    host.stop_playback();
                    self.fail(CaptureError::recording_timeout(format!(
                        "playback still running {:?} after its capture window",
                        self.timeouts.recording_grace
                    )));
                    self.set_state(SessionState::ExitingRuntime);
                }
            }
            Err(e) => {
                host.stop_playback();
                self.fail(CaptureError::host(format!("{e:#}")));
                self.set_state(SessionState::ExitingRuntime);
            }
        }
    }

    fn exit_runtime<H: Host + ?Sized>(&mut self, host: &mut H, now: Duration) {
        let Some(handle) = self.transition else {
            self.transition = Some(self.controller.request_switch(
                host,
                false,
                None,
                now,
                self.timeouts.exit_runtime,
            ));
            return;
        };
        match handle.poll(&*host, now) {
            TransitionPoll::Pending => {}
            TransitionPoll::Ready => {
                self.transition = None;
                self.set_state(SessionState::CleaningUp);
            }
            TransitionPoll::TimedOut => {
                self.transition = None;
                self.fail_if_completed(CaptureError::transition_timeout(format!(
                    "Design Mode not restored after {:?}",
                    handle.timeout
                )));
                self.set_state(SessionState::CleaningUp);
            }
        }
    }

    fn cleanup<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.controller.discard_record(host, self.id);
        if host.is_runtime_active() {
            self.diagnostics
                .push("cleanup ran while Runtime Mode was still active".to_string());
        }

        for path in &self.temp_assets {
            if !host.exists(path) {
                continue;
            }
            if let Err(e) = AssetStore::delete(&mut *host, path) {
                tracing::warn!(
                    job = %self.job.id,
                    %path,
                    error = %format!("{e:#}"),
                    "temp asset not deleted"
                );
                self.leaked.push(path.clone());
            }
        }
        if !self.leaked.is_empty() {
            let msg = format!("temp assets left behind: {}", self.leaked.join(", "));
            self.fail_if_completed(CaptureError::host(msg));
        }

        if let Some(flag) = self.saved_auto_start.take()
            && let Err(e) = self.restore_auto_start(host, flag)
        {
            self.fail_if_completed(e);
        }

        let terminal = self.exit.unwrap_or(ExitCause::Failed).terminal();
        self.set_state(terminal);
        let report = self.report();
        match terminal {
            SessionState::Completed => tracing::info!(
                job = %self.job.id,
                session = %self.id,
                range = ?self.captured_range,
                "job completed"
            ),
            _ => tracing::warn!(
                job = %self.job.id,
                session = %self.id,
                outcome = %terminal,
                reached = %report.reached,
                kind = ?report.error_kind,
                "job did not complete"
            ),
        }
    }

    fn restore_auto_start<H: Host + ?Sized>(&self, host: &mut H, flag: bool) -> CaptureResult<()> {
        let director = self
            .director
            .as_ref()
            .ok_or_else(|| CaptureError::host("auto-start saved without a director"))?;
        let resolved = ReferenceResolver::resolve(&*host, director)?;
        host.set_auto_start(resolved.node, flag)
            .map_err(|e| CaptureError::host(format!("restore auto-start: {e:#}")))
    }

    /// Cleanup problems turn a success into a failure but never replace an earlier cause.
    fn fail_if_completed(&mut self, err: CaptureError) {
        if self.exit == Some(ExitCause::Completed) {
            self.exit = None;
        }
        self.fail(err);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/recording_session.rs"]
mod tests;
