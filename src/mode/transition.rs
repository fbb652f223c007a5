use std::time::Duration;

use crate::{
    foundation::{core::SessionId, error::CaptureResult},
    host::{DurableStore, ModeControl},
    mode::record::CrossBoundaryRecord,
};

/// Default deadline for either direction of a mode switch.
pub const DEFAULT_SWITCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPoll {
    Pending,
    Ready,
    TimedOut,
}

/// An in-flight mode switch. Resolved by polling once per scheduler tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionHandle {
    pub to_runtime: bool,
    pub requested_at: Duration,
    pub timeout: Duration,
}

impl TransitionHandle {
    pub fn deadline(&self) -> Duration {
        self.requested_at
            .checked_add(self.timeout)
            .unwrap_or(Duration::MAX)
    }

    /// Ready as soon as the host flag matches the requested mode; timed out once `now` reaches
    /// the deadline. A switch already underway cannot be interrupted.
    pub fn poll<M: ModeControl + ?Sized>(&self, host: &M, now: Duration) -> TransitionPoll {
        if host.is_runtime_active() == self.to_runtime {
            return TransitionPoll::Ready;
        }
        if now >= self.deadline() {
            tracing::debug!(
                to_runtime = self.to_runtime,
                waited_ms = now.saturating_sub(self.requested_at).as_millis() as u64,
                "mode switch deadline reached"
            );
            return TransitionPoll::TimedOut;
        }
        TransitionPoll::Pending
    }
}

/// Requests Design/Runtime switches and owns the cross-boundary record protocol.
#[derive(Clone, Debug)]
pub struct ModeTransitionController {
    key_prefix: String,
}

impl ModeTransitionController {
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Request a switch. When entering Runtime Mode, `record` is persisted first because
    /// ordinary process state does not survive the switch.
    pub fn request_switch<H: ModeControl + DurableStore + ?Sized>(
        &self,
        host: &mut H,
        to_runtime: bool,
        record: Option<&CrossBoundaryRecord>,
        now: Duration,
        timeout: Duration,
    ) -> TransitionHandle {
        if to_runtime && let Some(record) = record {
            record.write(host, &self.key_prefix);
        }
        tracing::debug!(
            to_runtime,
            timeout_ms = timeout.as_millis() as u64,
            "requesting mode switch"
        );
        host.request_switch(to_runtime);
        TransitionHandle {
            to_runtime,
            requested_at: now,
            timeout,
        }
    }

    /// Read and delete `session`'s record after the switch completed.
    pub fn take_record<D: DurableStore + ?Sized>(
        &self,
        host: &mut D,
        session: SessionId,
    ) -> CaptureResult<Option<CrossBoundaryRecord>> {
        CrossBoundaryRecord::take(host, &self.key_prefix, session)
    }

    /// Drop `session`'s record without reading it (timeout and cancel paths).
    pub fn discard_record<D: DurableStore + ?Sized>(&self, host: &mut D, session: SessionId) {
        CrossBoundaryRecord::discard(host, &self.key_prefix, session);
    }
}

impl Default for ModeTransitionController {
    fn default() -> Self {
        Self::new("recbatch")
    }
}
