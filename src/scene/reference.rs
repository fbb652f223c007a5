use crate::{
    foundation::error::{CaptureError, CaptureResult},
    host::SceneGraph,
    scene::model::TransientId,
};

/// Separator between segments of [`NodeDescriptor::hierarchy_path`].
pub const PATH_SEPARATOR: char = '/';

/// Durable reference to a scene node that survives mode switches.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeDescriptor {
    pub display_name: String,
    /// Root-relative path of the container (scene) holding the node.
    pub container: String,
    /// Ancestor chain including the node itself, `/`-separated.
    pub hierarchy_path: String,
    /// Live id at capture time; meaningless once the generation changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transient_id: Option<TransientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

impl NodeDescriptor {
    /// Descriptor without a live id, as authored in configuration.
    pub fn from_path(container: impl Into<String>, hierarchy_path: impl Into<String>) -> Self {
        let hierarchy_path = hierarchy_path.into();
        let display_name = hierarchy_path
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            display_name,
            container: container.into(),
            hierarchy_path,
            transient_id: None,
            generation: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveStrategy {
    TransientId,
    HierarchyPath,
    DisplayName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub node: TransientId,
    pub strategy: ResolveStrategy,
}

/// Re-finds live nodes from [`NodeDescriptor`]s. Pure lookups, no side effects.
pub struct ReferenceResolver;

impl ReferenceResolver {
    /// Describe a live node so it can be found again after a mode switch.
    pub fn capture<S: SceneGraph + ?Sized>(
        scene: &S,
        node: TransientId,
    ) -> CaptureResult<NodeDescriptor> {
        let container = scene.container_of(node).ok_or_else(|| {
            CaptureError::reference_not_found(format!("node {node:?} is not in any container"))
        })?;
        let display_name = scene.node_name(node).ok_or_else(|| {
            CaptureError::reference_not_found(format!("node {node:?} has no name"))
        })?;

        let mut chain = vec![display_name.clone()];
        let mut cur = node;
        while let Some(parent) = scene.parent(cur) {
            chain.push(scene.node_name(parent).unwrap_or_default());
            cur = parent;
        }
        chain.reverse();

        Ok(NodeDescriptor {
            display_name,
            container,
            hierarchy_path: chain.join(&PATH_SEPARATOR.to_string()),
            transient_id: Some(node),
            generation: Some(scene.generation()),
        })
    }

    /// Resolve `desc` against the current scene. First strategy that hits wins:
    /// transient id (same generation and container only), hierarchy walk, then first node in the
    /// container carrying the display name.
    ///
    /// The display-name fallback can pick the wrong node when names collide.
    pub fn resolve<S: SceneGraph + ?Sized>(
        scene: &S,
        desc: &NodeDescriptor,
    ) -> CaptureResult<Resolved> {
        if let Some(node) = Self::by_transient_id(scene, desc) {
            return Ok(hit(desc, node, ResolveStrategy::TransientId));
        }
        if let Some(node) = Self::by_hierarchy_path(scene, desc) {
            return Ok(hit(desc, node, ResolveStrategy::HierarchyPath));
        }
        if let Some(node) = Self::by_display_name(scene, desc) {
            return Ok(hit(desc, node, ResolveStrategy::DisplayName));
        }
        Err(CaptureError::reference_not_found(format!(
            "'{}' ({}) in '{}'",
            desc.display_name, desc.hierarchy_path, desc.container
        )))
    }

    fn by_transient_id<S: SceneGraph + ?Sized>(
        scene: &S,
        desc: &NodeDescriptor,
    ) -> Option<TransientId> {
        let id = desc.transient_id?;
        if desc.generation? != scene.generation() {
            return None;
        }
        (scene.container_of(id).as_deref() == Some(desc.container.as_str())).then_some(id)
    }

    fn by_hierarchy_path<S: SceneGraph + ?Sized>(
        scene: &S,
        desc: &NodeDescriptor,
    ) -> Option<TransientId> {
        let segments: Vec<&str> = desc
            .hierarchy_path
            .split(PATH_SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return None;
        }
        walk(scene, &scene.root_nodes(&desc.container), &segments)
    }

    fn by_display_name<S: SceneGraph + ?Sized>(
        scene: &S,
        desc: &NodeDescriptor,
    ) -> Option<TransientId> {
        if desc.display_name.is_empty() {
            return None;
        }
        let mut stack: Vec<TransientId> = scene.root_nodes(&desc.container);
        stack.reverse();
        while let Some(node) = stack.pop() {
            if scene.node_name(node).as_deref() == Some(desc.display_name.as_str()) {
                return Some(node);
            }
            let mut kids = scene.children(node);
            kids.reverse();
            stack.extend(kids);
        }
        None
    }
}

fn hit(desc: &NodeDescriptor, node: TransientId, strategy: ResolveStrategy) -> Resolved {
    tracing::debug!(
        name = %desc.display_name,
        container = %desc.container,
        ?strategy,
        node = node.0,
        "resolved node reference"
    );
    Resolved { node, strategy }
}

// Depth-first so a wrong same-named sibling does not hide the right branch.
fn walk<S: SceneGraph + ?Sized>(
    scene: &S,
    candidates: &[TransientId],
    segments: &[&str],
) -> Option<TransientId> {
    let (head, rest) = segments.split_first()?;
    for &node in candidates {
        if scene.node_name(node).as_deref() != Some(*head) {
            continue;
        }
        if rest.is_empty() {
            return Some(node);
        }
        if let Some(found) = walk(scene, &scene.children(node), rest) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
#[path = "../../tests/unit/scene/reference.rs"]
mod tests;
