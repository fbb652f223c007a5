pub type CaptureResult<T> = Result<T, CaptureError>;

/// Stable tag for an error, used in job reports and progress notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    AssetBuildFailed,
    ModeTransitionTimeout,
    RangeInvalid,
    ReferenceNotFound,
    UnexpectedHostError,
    RecordingTimeout,
    Validation,
    Serde,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("asset build failed: {0}")]
    AssetBuildFailed(String),

    #[error("mode transition timed out: {0}")]
    ModeTransitionTimeout(String),

    #[error("invalid capture range: {0}")]
    RangeInvalid(String),

    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("unexpected host error: {0}")]
    UnexpectedHostError(String),

    #[error("recording timed out: {0}")]
    RecordingTimeout(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    pub fn asset_build(msg: impl Into<String>) -> Self {
        Self::AssetBuildFailed(msg.into())
    }

    pub fn transition_timeout(msg: impl Into<String>) -> Self {
        Self::ModeTransitionTimeout(msg.into())
    }

    pub fn range_invalid(msg: impl Into<String>) -> Self {
        Self::RangeInvalid(msg.into())
    }

    pub fn reference_not_found(msg: impl Into<String>) -> Self {
        Self::ReferenceNotFound(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::UnexpectedHostError(msg.into())
    }

    pub fn recording_timeout(msg: impl Into<String>) -> Self {
        Self::RecordingTimeout(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AssetBuildFailed(_) => ErrorKind::AssetBuildFailed,
            Self::ModeTransitionTimeout(_) => ErrorKind::ModeTransitionTimeout,
            Self::RangeInvalid(_) => ErrorKind::RangeInvalid,
            Self::ReferenceNotFound(_) => ErrorKind::ReferenceNotFound,
            Self::UnexpectedHostError(_) => ErrorKind::UnexpectedHostError,
            Self::RecordingTimeout(_) => ErrorKind::RecordingTimeout,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Serde(_) => ErrorKind::Serde,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}
