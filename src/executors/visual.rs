//! Shader family: compile/cache/render contract shared by the base shader
//! executor and its blend/color-correction/displacement/blur/transform
//! variants. All of them hash their fragment source plus a uniform
//! preamble, cache the compiled program per node id, and render into a
//! per-node framebuffer whose color texture becomes the `texture` output.

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::resource_manager::ResourceTable;
use serde_json::json;
use std::sync::Arc;

/// Uniforms every shader program is preambled with, matching the documented
/// ShaderToy-style contract (`iTime`, `iResolution`, `iMouse`, `iFrame`,
/// `iChannel0..3`, `fragCoord`).
const UNIFORM_PREAMBLE: &str = "uniform float iTime; uniform vec2 iResolution; uniform vec2 iMouse; \
uniform int iFrame; uniform sampler2D iChannel0; uniform sampler2D iChannel1; \
uniform sampler2D iChannel2; uniform sampler2D iChannel3; varying vec2 fragCoord;\n";

#[derive(Clone)]
pub struct CompiledProgram {
    pub source_hash: String,
    /// Opaque handle to the per-node framebuffer's color texture. This crate
    /// has no real GPU backend; the handle is a stable synthetic id so tests
    /// and downstream nodes can observe cache hits/misses and identity.
    pub texture_handle: String,
}

pub struct ShaderFamily {
    programs: Arc<ResourceTable<CompiledProgram>>,
}

impl ShaderFamily {
    pub fn new(programs: Arc<ResourceTable<CompiledProgram>>) -> Self {
        Self { programs }
    }

    fn compile_or_reuse(&self, node_id: crate::graph::NodeId, fragment_source: &str) -> CompiledProgram {
        let full_source = format!("{UNIFORM_PREAMBLE}{fragment_source}");
        let hash = blake3::hash(full_source.as_bytes()).to_hex().to_string();

        if let Some(existing) = self.programs.get(node_id) {
            if existing.source_hash == hash {
                return existing.clone();
            }
        }
        let compiled = CompiledProgram {
            source_hash: hash,
            texture_handle: format!("fbo:{node_id}"),
        };
        self.programs.insert(node_id, compiled.clone());
        compiled
    }
}

impl Executor for ShaderFamily {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let fragment_source = ctx.control_str("fragmentSource", "");
        let compiled = self.compile_or_reuse(ctx.node_id, &fragment_source);
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "texture".into(),
            json!(compiled.texture_handle),
        )])))
    }
}

/// Blend, color-correction, displacement, blur, and 2D-transform executors
/// share `ShaderFamily`'s compile/cache/render protocol but each supplies
/// its own fixed fragment program rather than a user-authored one.
pub struct FixedProgramShader {
    fragment_source: &'static str,
    family: ShaderFamily,
}

impl FixedProgramShader {
    pub fn new(fragment_source: &'static str, programs: Arc<ResourceTable<CompiledProgram>>) -> Self {
        Self {
            fragment_source,
            family: ShaderFamily::new(programs),
        }
    }
}

impl Executor for FixedProgramShader {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let compiled = self.family.compile_or_reuse(ctx.node_id, self.fragment_source);
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "texture".into(),
            json!(compiled.texture_handle),
        )])))
    }
}

pub const BLEND_FRAGMENT: &str = "vec4 blend(vec4 a, vec4 b) { return mix(a, b, 0.5); }";
pub const COLOR_CORRECTION_FRAGMENT: &str = "vec4 colorCorrect(vec4 c) { return c; }";
pub const DISPLACEMENT_FRAGMENT: &str = "vec2 displace(vec2 uv, sampler2D map) { return uv; }";
pub const BLUR_PASS_ONE_FRAGMENT: &str = "vec4 blurH(sampler2D tex, vec2 uv) { return texture2D(tex, uv); }";
pub const BLUR_PASS_TWO_FRAGMENT: &str = "vec4 blurV(sampler2D tex, vec2 uv) { return texture2D(tex, uv); }";
pub const TRANSFORM_2D_FRAGMENT: &str = "vec2 transform2d(vec2 uv, mat3 m) { return (m * vec3(uv, 1.0)).xy; }";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::GatheredInput;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx(node: NodeId, source: &str) -> ExecutionContext<'static> {
        let controls = ValueMap::from([("fragmentSource".into(), json!(source.to_string()))]);
        ExecutionContext::new(node, HashMap::<String, GatheredInput>::new(), controls, 0.016, 0.0, 1, None, |_| None)
    }

    #[test]
    fn recompiles_only_when_source_hash_changes() {
        let family = ShaderFamily::new(Arc::new(ResourceTable::new()));
        let node = NodeId::new();

        let ExecutorOutcome::Ready(out1) = family.execute(&ctx(node, "void main() {}")).unwrap() else { panic!() };
        let ExecutorOutcome::Ready(out2) = family.execute(&ctx(node, "void main() {}")).unwrap() else { panic!() };
        assert_eq!(out1["texture"], out2["texture"]);

        let ExecutorOutcome::Ready(out3) = family.execute(&ctx(node, "void main() { discard; }")).unwrap() else { panic!() };
        assert_eq!(out3["texture"], out1["texture"]); // handle is per-node, stable across recompiles
    }

    #[test]
    fn dispose_drops_program_cache_entry() {
        let programs: Arc<ResourceTable<CompiledProgram>> = Arc::new(ResourceTable::new());
        let family = ShaderFamily::new(programs.clone());
        let node = NodeId::new();
        family.execute(&ctx(node, "void main() {}")).unwrap();
        assert!(programs.contains(node));

        use crate::resource_manager::Disposable;
        programs.dispose_node(node);
        assert!(!programs.contains(node));
    }
}
