use crate::{
    assets::model::{
        CaptureBinding, CaptureComposition, CaptureSettings, ControlBinding, StoredAsset,
    },
    batch::job::RecordingJob,
    foundation::{
        core::{SessionId, TimeRange},
        error::{CaptureError, CaptureResult},
    },
    host::{AssetStore, ModeControl},
    scene::reference::NodeDescriptor,
};

/// Where a session's temporary assets live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempNaming {
    dir: String,
    stem: String,
}

impl TempNaming {
    pub fn new(dir: &str, job_id: &str, session: SessionId) -> Self {
        let job: String = job_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self {
            dir: dir.trim_end_matches('/').to_string(),
            stem: format!("{job}-{}", session.short()),
        }
    }

    pub fn composition_path(&self) -> String {
        format!("{}/{}.playable", self.dir, self.stem)
    }

    pub fn settings_path(&self, index: usize) -> String {
        format!("{}/{}-rec{index}.asset", self.dir, self.stem)
    }
}

/// Result of a successful build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltCapture {
    pub composition_path: String,
    pub exposed_name: String,
    pub composition: CaptureComposition,
}

/// Synthesizes the temporary capture composition for one job. Design Mode only.
pub struct CaptureAssetBuilder;

impl CaptureAssetBuilder {
    /// Build and persist the capture composition.
    ///
    /// Every asset path is pushed to `created` before the host is asked to create it, so the
    /// caller can clean up after a partial build.
    #[tracing::instrument(skip_all, fields(job = %job.id, range = %range))]
    pub fn build<H: AssetStore + ModeControl + ?Sized>(
        host: &mut H,
        job: &RecordingJob,
        range: TimeRange,
        target: &NodeDescriptor,
        naming: &TempNaming,
        created: &mut Vec<String>,
    ) -> CaptureResult<BuiltCapture> {
        if host.is_runtime_active() {
            return Err(CaptureError::asset_build(
                "capture assets can only be authored in Design Mode",
            ));
        }
        if job.recorders.is_empty() {
            return Err(CaptureError::asset_build("job has no recorder settings"));
        }

        let composition_path = naming.composition_path();
        let name = format!("Capture {}", job.id);
        let mut comp = CaptureComposition::empty(name, job.composition.clone(), job.frame_rate);

        created.push(composition_path.clone());
        host.create_asset(&composition_path, StoredAsset::Composition(comp.clone()))
            .map_err(|e| build_err(&composition_path, e))?;

        let exposed_name = uuid::Uuid::new_v4().simple().to_string();
        comp.control = Some(ControlBinding {
            track_name: "Control".to_string(),
            exposed_name: exposed_name.clone(),
            target: target.clone(),
            range,
        });

        let mut settings_paths = Vec::with_capacity(job.recorders.len());
        for (i, settings) in job.recorders.iter().enumerate() {
            let path = naming.settings_path(i);
            created.push(path.clone());
            host.create_asset(&path, StoredAsset::Settings(settings.clone()))
                .map_err(|e| build_err(&path, e))?;
            settings_paths.push(path);
        }

        // Settings objects only have their lazily-built fields after one trip through the store.
        host.save().map_err(|e| build_err(&composition_path, e))?;
        for (i, path) in settings_paths.into_iter().enumerate() {
            let settings = reload_settings(host, &path)?;
            comp.captures.push(CaptureBinding {
                track_name: format!("Recorder {} ({})", i + 1, settings.recorder),
                range,
                settings_path: path,
                settings,
            });
        }

        host.create_asset(&composition_path, StoredAsset::Composition(comp.clone()))
            .map_err(|e| build_err(&composition_path, e))?;
        host.save().map_err(|e| build_err(&composition_path, e))?;
        match host.load(&composition_path) {
            Ok(StoredAsset::Composition(_)) => {}
            Ok(StoredAsset::Settings(_)) => {
                return Err(CaptureError::asset_build(format!(
                    "'{composition_path}' reloaded as settings"
                )));
            }
            Err(e) => return Err(build_err(&composition_path, e)),
        }

        tracing::debug!(
            path = %composition_path,
            recorders = comp.captures.len(),
            "capture composition persisted"
        );
        Ok(BuiltCapture {
            composition_path,
            exposed_name,
            composition: comp,
        })
    }
}

fn reload_settings<H: AssetStore + ?Sized>(host: &H, path: &str) -> CaptureResult<CaptureSettings> {
    match host.load(path) {
        Ok(StoredAsset::Settings(s)) => Ok(s),
        Ok(StoredAsset::Composition(_)) => Err(CaptureError::asset_build(format!(
            "'{path}' reloaded as a composition"
        ))),
        Err(e) => Err(build_err(path, e)),
    }
}

fn build_err(path: &str, e: anyhow::Error) -> CaptureError {
    CaptureError::asset_build(format!("'{path}': {e:#}"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/builder.rs"]
mod tests;
