use std::{path::Path, time::Duration};

use anyhow::Context as _;

use crate::{
    batch::job::RecordingJob,
    foundation::{
        core::{Fps, duration_secs},
        error::{CaptureError, CaptureResult},
    },
    mode::transition::DEFAULT_SWITCH_TIMEOUT,
};

/// Grace added to the capture length before a recording is declared hung.
pub const DEFAULT_RECORDING_GRACE: Duration = Duration::from_secs(10);

/// Batch-wide settings. Every field has a default, so `{}` is a valid config.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Every job in the batch must use this rate.
    pub frame_rate: Fps,
    #[serde(with = "duration_secs")]
    pub enter_runtime_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub exit_runtime_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub recording_grace: Duration,
    pub temp_asset_dir: String,
    /// Namespace for cross-boundary keys in the durable store.
    pub durable_key_prefix: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            frame_rate: Fps::default(),
            enter_runtime_timeout: DEFAULT_SWITCH_TIMEOUT,
            exit_runtime_timeout: DEFAULT_SWITCH_TIMEOUT,
            recording_grace: DEFAULT_RECORDING_GRACE,
            temp_asset_dir: "Assets/__RecorderBatchTemp".to_string(),
            durable_key_prefix: "recbatch".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> CaptureResult<()> {
        Fps::new(self.frame_rate.num, self.frame_rate.den)?;
        if self.enter_runtime_timeout.is_zero() || self.exit_runtime_timeout.is_zero() {
            return Err(CaptureError::validation("mode switch timeouts must be > 0"));
        }
        if self.temp_asset_dir.trim().is_empty() {
            return Err(CaptureError::validation("temp_asset_dir must be non-empty"));
        }
        if self.durable_key_prefix.trim().is_empty() {
            return Err(CaptureError::validation(
                "durable_key_prefix must be non-empty",
            ));
        }
        Ok(())
    }
}

/// A batch on disk: config plus the jobs to run, in order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchManifest {
    #[serde(default)]
    pub config: BatchConfig,
    pub jobs: Vec<RecordingJob>,
}

impl BatchManifest {
    pub fn from_json_str(s: &str) -> CaptureResult<Self> {
        let manifest: Self = serde_json::from_str(s)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> CaptureResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Validate, then split into the batch config and its jobs in manifest order.
    pub fn into_jobs(self) -> CaptureResult<(BatchConfig, Vec<RecordingJob>)> {
        self.validate()?;
        Ok((self.config, self.jobs))
    }

    pub fn validate(&self) -> CaptureResult<()> {
        self.config.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        for job in &self.jobs {
            job.validate()?;
            if !seen.insert(job.id.as_str()) {
                return Err(CaptureError::validation(format!(
                    "duplicate job id '{}'",
                    job.id
                )));
            }
            if !job.frame_rate.same_rate(self.config.frame_rate) {
                return Err(CaptureError::validation(format!(
                    "job '{}' runs at {} fps but the batch runs at {} fps",
                    job.id, job.frame_rate, self.config.frame_rate
                )));
            }
        }
        Ok(())
    }
}
