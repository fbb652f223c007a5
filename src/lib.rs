//! Batch recording orchestrator.
//!
//! Queues capture jobs and drives each through a tick-advanced session: build a temporary capture
//! composition in Design Mode, switch to Runtime Mode, rebind the references the switch
//! invalidated, play the capture to completion, switch back, and delete everything it created.
//!
//! The host application is reached only through the traits in [`host`]; [`sim::SimHost`] is an
//! in-memory implementation used by tests and the `recbatch simulate` command.
#![forbid(unsafe_code)]

mod foundation;

pub mod assets;
pub mod batch;
pub mod config;
pub mod host;
pub mod mode;
pub mod range;
pub mod scene;
pub mod session;
pub mod sim;

pub use crate::foundation::core::{Fps, JobId, SessionId, TimeRange};
pub use crate::foundation::error::{CaptureError, CaptureResult, ErrorKind};

pub use crate::assets::builder::{BuiltCapture, CaptureAssetBuilder, TempNaming};
pub use crate::assets::model::{CaptureComposition, CaptureSettings, StoredAsset};
pub use crate::batch::job::RecordingJob;
pub use crate::batch::progress::{BatchReport, Progress, ProgressObserver};
pub use crate::batch::queue::BatchQueue;
pub use crate::config::{BatchConfig, BatchManifest};
pub use crate::host::{
    AssetStore, DurableStore, Host, ModeControl, Playback, PlaybackState, SceneGraph,
};
pub use crate::mode::record::CrossBoundaryRecord;
pub use crate::mode::transition::{ModeTransitionController, TransitionHandle, TransitionPoll};
pub use crate::range::{MarkerProblem, RangeCalculator, RangeOutcome, RangePolicy};
pub use crate::scene::model::{CompositionHandle, TimingMarker, TrackInfo, TrackKind, TransientId};
pub use crate::scene::reference::{NodeDescriptor, ReferenceResolver, ResolveStrategy, Resolved};
pub use crate::session::recording_session::RecordingSession;
pub use crate::session::report::JobReport;
pub use crate::session::state::SessionState;
