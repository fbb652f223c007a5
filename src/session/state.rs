/// Lifecycle of one recording session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    Queued,
    PreparingAssets,
    EnteringRuntime,
    AwaitingRuntimeReady,
    BindingReferences,
    Recording,
    ExitingRuntime,
    CleaningUp,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// States in which Runtime Mode is (or may be) active.
    pub fn in_runtime(self) -> bool {
        matches!(
            self,
            Self::AwaitingRuntimeReady | Self::BindingReferences | Self::Recording
        )
    }

    /// States that do job work, as opposed to unwinding it.
    pub(crate) fn is_work(self) -> bool {
        !self.is_terminal() && !matches!(self, Self::ExitingRuntime | Self::CleaningUp)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// How a session will end once it has unwound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExitCause {
    Completed,
    Failed,
    Cancelled,
}

impl ExitCause {
    pub(crate) fn terminal(self) -> SessionState {
        match self {
            Self::Completed => SessionState::Completed,
            Self::Failed => SessionState::Failed,
            Self::Cancelled => SessionState::Cancelled,
        }
    }
}
