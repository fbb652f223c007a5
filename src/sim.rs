//! In-memory host for tests, dry runs and the `simulate` CLI command.
//!
//! Behaves like the real host where it matters to the orchestrator: mode switches complete some
//! time after they are requested, every switch renumbers transient ids, drops exposed bindings
//! and discards unsaved assets, and editor-only nodes are absent while Runtime Mode is active.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{Context as _, anyhow, bail};

use crate::{
    assets::model::{CaptureComposition, StoredAsset},
    batch::queue::BatchQueue,
    foundation::core::{TimeRange, duration_secs},
    host::{AssetStore, DurableStore, ModeControl, Playback, PlaybackState, SceneGraph},
    scene::model::{CompositionHandle, TimingMarker, TrackInfo, TransientId},
};

const ID_STRIDE: u64 = 1_000_000;

#[derive(Clone, Debug)]
struct SimNode {
    name: String,
    container: String,
    parent: Option<usize>,
    children: Vec<usize>,
    auto_start: Option<bool>,
    editor_only: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SimComposition {
    pub path: CompositionHandle,
    pub duration: f64,
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
    #[serde(default)]
    pub markers: Vec<TimingMarker>,
}

/// Injected failures.
#[derive(Clone, Debug, Default)]
pub struct SimFaults {
    /// Mode switch requests never complete.
    pub stuck_switch: bool,
    /// `create_asset` fails for paths containing this substring.
    pub fail_create_matching: Option<String>,
    /// `poll_playback` returns an error.
    pub playback_error: bool,
    /// Playback never reports completion.
    pub playback_hangs: bool,
}

/// One finished capture, recorded when playback completes.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SimCapture {
    pub composition_path: String,
    pub source: CompositionHandle,
    pub recorders: Vec<String>,
    pub range: TimeRange,
}

#[derive(Clone, Copy, Debug)]
struct PendingSwitch {
    to_runtime: bool,
    ready_at: Duration,
}

#[derive(Clone, Debug)]
struct ActivePlayback {
    path: String,
    finish_at: Duration,
    capture: SimCapture,
}

pub struct SimHost {
    nodes: Vec<SimNode>,
    compositions: BTreeMap<CompositionHandle, SimComposition>,
    generation: u64,
    exposed: BTreeMap<(String, String), TransientId>,

    staged: BTreeMap<String, StoredAsset>,
    saved: BTreeMap<String, StoredAsset>,

    runtime_active: bool,
    pending: Option<PendingSwitch>,
    switch_latency: Duration,
    now: Duration,

    durable: BTreeMap<String, String>,

    playing: Option<ActivePlayback>,
    playback_rate: f64,
    captures: Vec<SimCapture>,

    pub faults: SimFaults,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            compositions: BTreeMap::new(),
            generation: 0,
            exposed: BTreeMap::new(),
            staged: BTreeMap::new(),
            saved: BTreeMap::new(),
            runtime_active: false,
            pending: None,
            switch_latency: Duration::from_millis(200),
            now: Duration::ZERO,
            durable: BTreeMap::new(),
            playing: None,
            playback_rate: 1.0,
            captures: Vec::new(),
            faults: SimFaults::default(),
        }
    }

    pub fn with_switch_latency(mut self, latency: Duration) -> Self {
        self.switch_latency = latency;
        self
    }

    /// Playback speed multiplier; `2.0` finishes captures in half the composition time.
    pub fn with_playback_rate(mut self, rate: f64) -> Self {
        self.playback_rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        };
        self
    }

    /// Add a node under `parent` (or at the container root) and return its current id.
    pub fn add_node(
        &mut self,
        container: &str,
        parent: Option<TransientId>,
        name: &str,
    ) -> TransientId {
        let parent_idx = parent.and_then(|p| self.index_of(p));
        let idx = self.nodes.len();
        self.nodes.push(SimNode {
            name: name.to_string(),
            container: container.to_string(),
            parent: parent_idx,
            children: Vec::new(),
            auto_start: None,
            editor_only: false,
        });
        if let Some(p) = parent_idx {
            self.nodes[p].children.push(idx);
        }
        self.id_for(idx)
    }

    /// Add a node that owns a composition and carries an auto-start flag.
    pub fn add_director(
        &mut self,
        container: &str,
        parent: Option<TransientId>,
        name: &str,
        auto_start: bool,
    ) -> TransientId {
        let id = self.add_node(container, parent, name);
        if let Some(idx) = self.index_of(id) {
            self.nodes[idx].auto_start = Some(auto_start);
        }
        id
    }

    /// Mark a node as design-only: it disappears while Runtime Mode is active.
    pub fn set_editor_only(&mut self, node: TransientId, editor_only: bool) {
        if let Some(idx) = self.index_of(node) {
            self.nodes[idx].editor_only = editor_only;
        }
    }

    pub fn add_composition(&mut self, comp: SimComposition) {
        self.compositions.insert(comp.path.clone(), comp);
    }

    /// Advance the simulated clock, completing a pending mode switch when due.
    pub fn advance(&mut self, now: Duration) {
        self.now = now;
        let Some(pending) = self.pending else {
            return;
        };
        if self.faults.stuck_switch || now < pending.ready_at {
            return;
        }
        self.pending = None;
        if self.runtime_active == pending.to_runtime {
            return;
        }
        self.runtime_active = pending.to_runtime;
        self.generation += 1;
        self.exposed.clear();
        self.staged.clear();
        if !pending.to_runtime {
            self.playing = None;
        }
        tracing::debug!(
            runtime = self.runtime_active,
            generation = self.generation,
            "sim host switched mode"
        );
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Find a node by hierarchy path in the current generation.
    pub fn find(&self, container: &str, hierarchy_path: &str) -> Option<TransientId> {
        let mut candidates = self.root_nodes(container);
        let mut found = None;
        for segment in hierarchy_path.split('/').filter(|s| !s.is_empty()) {
            found = candidates
                .iter()
                .copied()
                .find(|&n| self.node_name(n).as_deref() == Some(segment));
            candidates = self.children(found?);
        }
        found
    }

    pub fn auto_start_of(&self, container: &str, hierarchy_path: &str) -> Option<bool> {
        self.find(container, hierarchy_path)
            .and_then(|n| self.auto_start(n))
    }

    /// Paths of every asset that is saved or staged.
    pub fn asset_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self.saved.keys().chain(self.staged.keys()).cloned().collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn durable_keys(&self) -> Vec<String> {
        self.durable.keys().cloned().collect()
    }

    pub fn captures(&self) -> &[SimCapture] {
        &self.captures
    }

    pub fn from_scene(scene: SimScene) -> anyhow::Result<Self> {
        let mut host = Self::new().with_switch_latency(scene.switch_latency);
        if let Some(rate) = scene.playback_rate {
            host = host.with_playback_rate(rate);
        }
        for container in &scene.containers {
            for node in &container.nodes {
                host.add_scene_node(&container.path, None, node);
            }
        }
        for comp in scene.compositions {
            if !comp.duration.is_finite() || comp.duration <= 0.0 {
                bail!("composition '{}' must have a positive duration", comp.path);
            }
            host.add_composition(comp);
        }
        Ok(host)
    }

    pub fn load_scene_json(path: &std::path::Path) -> anyhow::Result<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open scene '{}'", path.display()))?;
        let scene: SimScene = serde_json::from_reader(std::io::BufReader::new(f))
            .with_context(|| "parse scene JSON")?;
        Self::from_scene(scene)
    }

    /// Start `queue` and drive it to completion on a fixed tick, advancing this host's clock
    /// before every queue tick. Returns the simulated time at which the batch finished.
    pub fn run_batch(
        &mut self,
        queue: &mut BatchQueue,
        tick: Duration,
        limit: Duration,
    ) -> anyhow::Result<Duration> {
        if tick.is_zero() {
            bail!("simulation tick must be > 0");
        }
        queue.start();
        let started = self.now;
        let mut now = self.now;
        while !queue.is_finished() {
            if now - started > limit {
                bail!("batch still running after {limit:?} of simulated time");
            }
            now += tick;
            self.advance(now);
            queue.tick(self, now);
        }
        Ok(now)
    }

    fn add_scene_node(&mut self, container: &str, parent: Option<TransientId>, node: &SimNodeSpec) {
        let id = match node.auto_start {
            Some(flag) => self.add_director(container, parent, &node.name, flag),
            None => self.add_node(container, parent, &node.name),
        };
        self.set_editor_only(id, node.editor_only);
        for child in &node.children {
            self.add_scene_node(container, Some(id), child);
        }
    }

    fn id_for(&self, idx: usize) -> TransientId {
        TransientId(self.generation * ID_STRIDE + idx as u64 + 1)
    }

    fn index_of(&self, id: TransientId) -> Option<usize> {
        let base = self.generation * ID_STRIDE;
        if id.0 <= base {
            return None;
        }
        let idx = usize::try_from(id.0 - base - 1).ok()?;
        let node = self.nodes.get(idx)?;
        if self.runtime_active && node.editor_only {
            return None;
        }
        Some(idx)
    }

    fn visible(&self, idx: usize) -> bool {
        !(self.runtime_active && self.nodes[idx].editor_only)
    }

    fn capture_for(&self, path: &str, comp: &CaptureComposition) -> anyhow::Result<SimCapture> {
        let control = comp
            .control
            .as_ref()
            .ok_or_else(|| anyhow!("capture composition '{path}' has no control track"))?;
        if !self
            .exposed
            .contains_key(&(path.to_string(), control.exposed_name.clone()))
        {
            bail!(
                "exposed slot '{}' of '{path}' is not bound",
                control.exposed_name
            );
        }
        Ok(SimCapture {
            composition_path: path.to_string(),
            source: comp.source.clone(),
            recorders: comp
                .captures
                .iter()
                .map(|c| c.settings.recorder.clone())
                .collect(),
            range: control.range,
        })
    }
}

impl SceneGraph for SimHost {
    fn enumerate_compositions(&self) -> Vec<CompositionHandle> {
        self.compositions.keys().cloned().collect()
    }

    fn duration(&self, comp: &CompositionHandle) -> anyhow::Result<f64> {
        self.compositions
            .get(comp)
            .map(|c| c.duration)
            .ok_or_else(|| anyhow!("unknown composition '{comp}'"))
    }

    fn markers(&self, comp: &CompositionHandle) -> anyhow::Result<Vec<TimingMarker>> {
        self.compositions
            .get(comp)
            .map(|c| c.markers.clone())
            .ok_or_else(|| anyhow!("unknown composition '{comp}'"))
    }

    fn tracks(&self, comp: &CompositionHandle) -> anyhow::Result<Vec<TrackInfo>> {
        self.compositions
            .get(comp)
            .map(|c| c.tracks.clone())
            .ok_or_else(|| anyhow!("unknown composition '{comp}'"))
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn container_of(&self, node: TransientId) -> Option<String> {
        self.index_of(node).map(|i| self.nodes[i].container.clone())
    }

    fn root_nodes(&self, container: &str) -> Vec<TransientId> {
        (0..self.nodes.len())
            .filter(|&i| {
                let n = &self.nodes[i];
                n.parent.is_none() && n.container == container && self.visible(i)
            })
            .map(|i| self.id_for(i))
            .collect()
    }

    fn children(&self, node: TransientId) -> Vec<TransientId> {
        let Some(idx) = self.index_of(node) else {
            return Vec::new();
        };
        self.nodes[idx]
            .children
            .iter()
            .copied()
            .filter(|&c| self.visible(c))
            .map(|c| self.id_for(c))
            .collect()
    }

    fn parent(&self, node: TransientId) -> Option<TransientId> {
        let idx = self.index_of(node)?;
        self.nodes[idx].parent.map(|p| self.id_for(p))
    }

    fn node_name(&self, node: TransientId) -> Option<String> {
        self.index_of(node).map(|i| self.nodes[i].name.clone())
    }

    fn auto_start(&self, node: TransientId) -> Option<bool> {
        self.index_of(node).and_then(|i| self.nodes[i].auto_start)
    }

    fn set_auto_start(&mut self, node: TransientId, enabled: bool) -> anyhow::Result<()> {
        let idx = self
            .index_of(node)
            .ok_or_else(|| anyhow!("stale node id {}", node.0))?;
        let node = &mut self.nodes[idx];
        let Some(slot) = node.auto_start.as_mut() else {
            bail!("node '{}' has no auto-start flag", node.name);
        };
        *slot = enabled;
        Ok(())
    }

    fn bind_exposed(
        &mut self,
        composition_path: &str,
        slot: &str,
        node: TransientId,
    ) -> anyhow::Result<()> {
        if self.index_of(node).is_none() {
            bail!("cannot bind stale node id {}", node.0);
        }
        if !self.saved.contains_key(composition_path) {
            bail!("no saved composition at '{composition_path}'");
        }
        self.exposed
            .insert((composition_path.to_string(), slot.to_string()), node);
        Ok(())
    }
}

impl AssetStore for SimHost {
    fn create_asset(&mut self, path: &str, asset: StoredAsset) -> anyhow::Result<()> {
        if self.runtime_active {
            bail!("asset authoring is unavailable in Runtime Mode");
        }
        if let Some(pat) = &self.faults.fail_create_matching
            && path.contains(pat.as_str())
        {
            bail!("injected create failure for '{path}'");
        }
        self.staged.insert(path.to_string(), asset);
        Ok(())
    }

    fn save(&mut self) -> anyhow::Result<()> {
        if self.runtime_active {
            bail!("asset authoring is unavailable in Runtime Mode");
        }
        let staged = std::mem::take(&mut self.staged);
        self.saved.extend(staged);
        Ok(())
    }

    fn delete(&mut self, path: &str) -> anyhow::Result<()> {
        if self.runtime_active {
            bail!("asset authoring is unavailable in Runtime Mode");
        }
        let a = self.staged.remove(path);
        let b = self.saved.remove(path);
        if a.is_none() && b.is_none() {
            bail!("no asset at '{path}'");
        }
        Ok(())
    }

    fn load(&self, path: &str) -> anyhow::Result<StoredAsset> {
        self.saved
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no saved asset at '{path}'"))
    }

    fn exists(&self, path: &str) -> bool {
        self.saved.contains_key(path) || self.staged.contains_key(path)
    }
}

impl ModeControl for SimHost {
    fn is_runtime_active(&self) -> bool {
        self.runtime_active
    }

    fn request_switch(&mut self, to_runtime: bool) {
        self.pending = Some(PendingSwitch {
            to_runtime,
            ready_at: self.now + self.switch_latency,
        });
    }
}

impl DurableStore for SimHost {
    fn set(&mut self, key: &str, value: &str) {
        self.durable.insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.durable.get(key).cloned()
    }

    fn delete(&mut self, key: &str) {
        self.durable.remove(key);
    }
}

impl Playback for SimHost {
    fn start_playback(&mut self, composition_path: &str) -> anyhow::Result<()> {
        if !self.runtime_active {
            bail!("playback requires Runtime Mode");
        }
        let StoredAsset::Composition(comp) = self.load(composition_path)? else {
            bail!("'{composition_path}' is not a composition");
        };
        let capture = self.capture_for(composition_path, &comp)?;
        let play_secs = capture.range.duration_secs() / self.playback_rate;
        let finish_at = Duration::try_from_secs_f64(play_secs)
            .ok()
            .and_then(|d| self.now.checked_add(d))
            .ok_or_else(|| anyhow!("capture of {play_secs}s cannot be scheduled"))?;
        self.playing = Some(ActivePlayback {
            path: composition_path.to_string(),
            finish_at,
            capture,
        });
        Ok(())
    }

    fn poll_playback(&mut self) -> anyhow::Result<PlaybackState> {
        if self.faults.playback_error {
            bail!("injected playback failure");
        }
        let Some(active) = &self.playing else {
            bail!("nothing is playing");
        };
        if self.faults.playback_hangs || self.now < active.finish_at {
            return Ok(PlaybackState::Playing);
        }
        let done = self.playing.take().map(|a| (a.path, a.capture));
        if let Some((path, capture)) = done {
            tracing::debug!(%path, "sim playback finished");
            self.captures.push(capture);
        }
        Ok(PlaybackState::Finished)
    }

    fn stop_playback(&mut self) {
        self.playing = None;
    }
}

/// Serializable scene description for [`SimHost::from_scene`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SimScene {
    #[serde(default)]
    pub containers: Vec<SimContainer>,
    #[serde(default)]
    pub compositions: Vec<SimComposition>,
    #[serde(default = "default_latency", with = "duration_secs")]
    pub switch_latency: Duration,
    #[serde(default)]
    pub playback_rate: Option<f64>,
}

fn default_latency() -> Duration {
    Duration::from_millis(200)
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SimContainer {
    pub path: String,
    #[serde(default)]
    pub nodes: Vec<SimNodeSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SimNodeSpec {
    pub name: String,
    #[serde(default)]
    pub auto_start: Option<bool>,
    #[serde(default)]
    pub editor_only: bool,
    #[serde(default)]
    pub children: Vec<SimNodeSpec>,
}
