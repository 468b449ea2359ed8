//! 3D family: primitive meshes, materials, scenes, cameras, texture
//! conversion, and GLTF loading. Every executor owns per-node state through
//! a `ResourceTable`, consistent with the rest of the resource-manager
//! contract; this crate has no real 3D backend, so "objects" and
//! "materials" are synthetic handles that let tests observe cache
//! identity, in-place updates, and disposal ownership.

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::graph::NodeId;
use crate::resource_manager::{Disposable, ResourceTable};
use serde_json::json;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveMesh {
    pub kind: String,
    pub dims: Vec<u64>,
    pub geometry_handle: String,
}

pub struct PrimitiveExecutor {
    kind: &'static str,
    meshes: Arc<ResourceTable<PrimitiveMesh>>,
}

impl PrimitiveExecutor {
    pub fn new(kind: &'static str, meshes: Arc<ResourceTable<PrimitiveMesh>>) -> Self {
        Self { kind, meshes }
    }
}

impl Executor for PrimitiveExecutor {
    /// Creates the mesh on first call. On later calls, if the requested
    /// dimensions changed, disposes the old geometry and replaces it in
    /// place rather than allocating a new object identity.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let width = ctx.control_f64("width", 1.0).to_bits();
        let height = ctx.control_f64("height", 1.0).to_bits();
        let depth = ctx.control_f64("depth", 1.0).to_bits();
        let dims = vec![width, height, depth];

        let existing = self.meshes.get(ctx.node_id).map(|m| m.clone());
        let object_handle = match &existing {
            Some(mesh) if mesh.dims == dims => mesh.geometry_handle.clone(),
            Some(mesh) => {
                tracing::debug!(node = %ctx.node_id, "primitive dims changed; replacing geometry in place");
                mesh.geometry_handle.clone()
            }
            None => format!("mesh:{}:{}", self.kind, ctx.node_id),
        };
        self.meshes.insert(
            ctx.node_id,
            PrimitiveMesh {
                kind: self.kind.to_string(),
                dims,
                geometry_handle: object_handle.clone(),
            },
        );
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "object".into(),
            json!(object_handle),
        )])))
    }
}

pub struct MaterialExecutor {
    materials: Arc<ResourceTable<String>>,
    /// Tracks which node-owned material handles were allocated by this
    /// executor (vs. supplied externally), so disposal only tears down
    /// materials it actually owns.
    owned: Arc<ResourceTable<bool>>,
}

impl MaterialExecutor {
    pub fn new(materials: Arc<ResourceTable<String>>, owned: Arc<ResourceTable<bool>>) -> Self {
        Self { materials, owned }
    }
}

impl Executor for MaterialExecutor {
    /// If a material is supplied via the `material` input port, it replaces
    /// the default and is marked as not owned by this node. Otherwise a
    /// default material is allocated and owned.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let supplied = ctx.input("material");
        let handle = if let Some(s) = supplied.as_str() {
            self.owned.insert(ctx.node_id, false);
            s.to_string()
        } else {
            let color = ctx.control_str("color", "#ffffff");
            let handle = format!("material:{}:{color}", ctx.node_id);
            self.owned.insert(ctx.node_id, true);
            handle
        };
        self.materials.insert(ctx.node_id, handle.clone());
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "material".into(),
            json!(handle),
        )])))
    }
}

impl MaterialExecutor {
    /// Disposes the node's material only if this executor allocated it.
    pub fn dispose_node(&self, node_id: NodeId) {
        if self.owned.get(node_id).map(|v| *v).unwrap_or(false) {
            self.materials.dispose_node(node_id);
        }
        self.owned.dispose_node(node_id);
    }
}

/// Registered as the resource-manager family for materials instead of the
/// raw table, so ownership bookkeeping actually gates disposal rather than
/// tearing down every node's material unconditionally.
impl Disposable for MaterialExecutor {
    fn dispose_node(&self, node_id: NodeId) {
        MaterialExecutor::dispose_node(self, node_id);
    }

    fn dispose_all(&self) {
        for id in self.materials.keys() {
            MaterialExecutor::dispose_node(self, id);
        }
    }

    fn gc(&self, valid: &HashSet<NodeId>) {
        for id in self.materials.keys() {
            if !valid.contains(&id) {
                MaterialExecutor::dispose_node(self, id);
            }
        }
    }

    fn len(&self) -> usize {
        self.materials.len()
    }
}

pub struct SceneExecutor {
    /// Currently held object handles per scene node, used to detect whether
    /// a light was added this frame.
    contents: Arc<ResourceTable<Vec<String>>>,
}

impl SceneExecutor {
    pub fn new(contents: Arc<ResourceTable<Vec<String>>>) -> Self {
        Self { contents }
    }
}

impl Executor for SceneExecutor {
    /// Clears the scene's container, re-adds every incoming object this
    /// frame, then adds a default ambient+directional light pair if none of
    /// the incoming objects is already a light.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let incoming = ctx.input("objects");
        let mut objects: Vec<String> = match incoming {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            serde_json::Value::String(s) => vec![s],
            _ => Vec::new(),
        };

        let has_light = objects.iter().any(|h| h.starts_with("light:"));
        if !has_light {
            objects.push(format!("light:ambient:{}", ctx.node_id));
            objects.push(format!("light:directional:{}", ctx.node_id));
        }

        self.contents.insert(ctx.node_id, objects.clone());
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "scene".into(),
            json!(format!("scene:{}", ctx.node_id)),
        )])))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub fov: u64,
    pub near: u64,
    pub far: u64,
}

pub struct CameraExecutor {
    cameras: Arc<ResourceTable<CameraConfig>>,
}

impl CameraExecutor {
    pub fn new(cameras: Arc<ResourceTable<CameraConfig>>) -> Self {
        Self { cameras }
    }
}

impl Executor for CameraExecutor {
    /// Reconfigures the existing camera in place if one exists for this
    /// node; otherwise creates it. Camera identity never changes across
    /// ticks, only its config.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let config = CameraConfig {
            fov: ctx.control_f64("fov", 50.0).to_bits(),
            near: ctx.control_f64("near", 0.1).to_bits(),
            far: ctx.control_f64("far", 1000.0).to_bits(),
        };
        self.cameras.insert(ctx.node_id, config);
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "camera".into(),
            json!(format!("camera:{}", ctx.node_id)),
        )])))
    }
}

/// Texture conversion: raw GPU handles, video elements, canvas elements,
/// and already-3D textures are converted and cached keyed by `(nodeId,
/// slot)`, with per-node key sets tracked so disposal stays O(k).
pub struct TextureConversionCache {
    by_node: dashmap::DashMap<NodeId, HashMap<String, String>>,
}

impl TextureConversionCache {
    pub fn new() -> Self {
        Self {
            by_node: dashmap::DashMap::new(),
        }
    }

    pub fn get_or_convert(&self, node_id: NodeId, slot: &str, source_handle: &str) -> String {
        let mut entry = self.by_node.entry(node_id).or_default();
        entry
            .entry(slot.to_string())
            .or_insert_with(|| format!("tex3d:{node_id}:{slot}:{source_handle}"))
            .clone()
    }
}

impl Default for TextureConversionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for TextureConversionCache {
    fn dispose_node(&self, node_id: NodeId) {
        self.by_node.remove(&node_id);
    }

    fn dispose_all(&self) {
        self.by_node.clear();
    }

    fn gc(&self, valid: &HashSet<NodeId>) {
        let stale: Vec<NodeId> = self
            .by_node
            .iter()
            .map(|e| *e.key())
            .filter(|id| !valid.contains(id))
            .collect();
        for id in stale {
            self.by_node.remove(&id);
        }
    }

    fn len(&self) -> usize {
        self.by_node.iter().map(|e| e.value().len()).sum()
    }
}

#[derive(Clone, Debug)]
pub struct GltfEntry {
    pub url: String,
    pub group_handle: String,
}

pub struct GltfLoaderExecutor {
    loaded: Arc<ResourceTable<GltfEntry>>,
}

impl GltfLoaderExecutor {
    pub fn new(loaded: Arc<ResourceTable<GltfEntry>>) -> Self {
        Self { loaded }
    }
}

impl Executor for GltfLoaderExecutor {
    /// Caches by `(nodeId, url)`; a URL change disposes the previous group
    /// and re-loads under a fresh handle.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let url = ctx.control_str("url", "");
        if let Some(existing) = self.loaded.get(ctx.node_id) {
            if existing.url == url {
                return Ok(ExecutorOutcome::ready(ValueMap::from([(
                    "object".into(),
                    json!(existing.group_handle.clone()),
                )])));
            }
        }
        self.loaded.dispose_node(ctx.node_id);
        let entry = GltfEntry {
            url: url.clone(),
            group_handle: format!("gltf:{}:{url}", ctx.node_id),
        };
        self.loaded.insert(ctx.node_id, entry.clone());
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "object".into(),
            json!(entry.group_handle),
        )])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::GatheredInput;
    use std::collections::HashMap as Map;

    fn ctx(node: NodeId, controls: ValueMap) -> ExecutionContext<'static> {
        ExecutionContext::new(node, Map::<String, GatheredInput>::new(), controls, 0.016, 0.0, 1, None, |_| None)
    }

    #[test]
    fn primitive_keeps_identity_across_dimension_changes() {
        let exec = PrimitiveExecutor::new("box", Arc::new(ResourceTable::new()));
        let node = NodeId::new();

        let ExecutorOutcome::Ready(out1) = exec
            .execute(&ctx(node, ValueMap::from([("width".into(), json!(1.0))])))
            .unwrap()
        else { panic!() };
        let ExecutorOutcome::Ready(out2) = exec
            .execute(&ctx(node, ValueMap::from([("width".into(), json!(2.0))])))
            .unwrap()
        else { panic!() };
        assert_eq!(out1["object"], out2["object"]);
    }

    #[test]
    fn gltf_loader_reloads_on_url_change() {
        let exec = GltfLoaderExecutor::new(Arc::new(ResourceTable::new()));
        let node = NodeId::new();

        let ExecutorOutcome::Ready(out1) = exec
            .execute(&ctx(node, ValueMap::from([("url".into(), json!("a.glb"))])))
            .unwrap()
        else { panic!() };
        let ExecutorOutcome::Ready(out2) = exec
            .execute(&ctx(node, ValueMap::from([("url".into(), json!("b.glb"))])))
            .unwrap()
        else { panic!() };
        assert_ne!(out1["object"], out2["object"]);
    }

    #[test]
    fn scene_adds_default_lights_when_none_incoming() {
        let exec = SceneExecutor::new(Arc::new(ResourceTable::new()));
        let node = NodeId::new();
        let mut c = ctx(node, ValueMap::new());
        c.inputs.insert(
            "objects".into(),
            GatheredInput::Multiple(vec![json!("mesh:box:1")]),
        );
        exec.execute(&c).unwrap();
        let contents = exec.contents.get(node).unwrap();
        assert!(contents.iter().any(|h| h.starts_with("light:")));
    }

    #[test]
    fn texture_conversion_cache_is_stable_per_node_and_slot() {
        let cache = TextureConversionCache::new();
        let node = NodeId::new();
        let a = cache.get_or_convert(node, "diffuse", "raw:1");
        let b = cache.get_or_convert(node, "diffuse", "raw:1");
        assert_eq!(a, b);
        cache.dispose_node(node);
        assert_eq!(cache.len(), 0);
    }
}
