//! Collaborator interfaces the orchestrator consumes from the host application.
//!
//! Host calls report failures through `anyhow`; the orchestrator maps them onto its own error
//! taxonomy depending on where in a session they surface.

use crate::{
    assets::model::StoredAsset,
    scene::model::{CompositionHandle, TimingMarker, TrackInfo, TransientId},
};

/// Read access to compositions and the live node tree, plus the few node mutations a session
/// needs.
pub trait SceneGraph {
    fn enumerate_compositions(&self) -> Vec<CompositionHandle>;
    /// Composition length in seconds.
    fn duration(&self, comp: &CompositionHandle) -> anyhow::Result<f64>;
    /// Every marker of the composition, across all tracks and the composition itself.
    fn markers(&self, comp: &CompositionHandle) -> anyhow::Result<Vec<TimingMarker>>;
    fn tracks(&self, comp: &CompositionHandle) -> anyhow::Result<Vec<TrackInfo>>;

    /// Identity generation. Changes whenever a mode switch invalidates transient ids.
    fn generation(&self) -> u64;
    fn container_of(&self, node: TransientId) -> Option<String>;
    fn root_nodes(&self, container: &str) -> Vec<TransientId>;
    fn children(&self, node: TransientId) -> Vec<TransientId>;
    fn parent(&self, node: TransientId) -> Option<TransientId>;
    fn node_name(&self, node: TransientId) -> Option<String>;

    /// Current "auto-start" flag of a composition owner, `None` if the node has none.
    fn auto_start(&self, node: TransientId) -> Option<bool>;
    fn set_auto_start(&mut self, node: TransientId, enabled: bool) -> anyhow::Result<()>;
    /// Bind `node` to the exposed slot `slot` of the composition stored at `composition_path`.
    fn bind_exposed(
        &mut self,
        composition_path: &str,
        slot: &str,
        node: TransientId,
    ) -> anyhow::Result<()>;
}

/// Persistent asset store. Only valid to mutate while in Design Mode.
pub trait AssetStore {
    /// Create (or replace) the asset at `path`. Not durable until [`AssetStore::save`].
    fn create_asset(&mut self, path: &str, asset: StoredAsset) -> anyhow::Result<()>;
    fn save(&mut self) -> anyhow::Result<()>;
    fn delete(&mut self, path: &str) -> anyhow::Result<()>;
    fn load(&self, path: &str) -> anyhow::Result<StoredAsset>;
    fn exists(&self, path: &str) -> bool;
}

/// The host's Design/Runtime switch. There is no completion callback.
pub trait ModeControl {
    fn is_runtime_active(&self) -> bool;
    fn request_switch(&mut self, to_runtime: bool);
}

/// String key-value store that survives a mode switch.
pub trait DurableStore {
    fn set(&mut self, key: &str, value: &str);
    fn get(&self, key: &str) -> Option<String>;
    fn delete(&mut self, key: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Finished,
}

/// Runtime-side playback of a persisted capture composition.
pub trait Playback {
    fn start_playback(&mut self, composition_path: &str) -> anyhow::Result<()>;
    fn poll_playback(&mut self) -> anyhow::Result<PlaybackState>;
    fn stop_playback(&mut self);
}

/// Everything a recording session touches.
pub trait Host: SceneGraph + AssetStore + ModeControl + DurableStore + Playback {}

impl<T> Host for T where T: SceneGraph + AssetStore + ModeControl + DurableStore + Playback {}
