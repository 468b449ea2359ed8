//! Built-in executor families and the `register_builtins` wiring that
//! installs them into an [`ExecutorRegistry`], registering each family's
//! resource tables with the [`ResourceManager`] so node removal and
//! `stop()` dispose them uniformly.

pub mod ai;
pub mod clasp;
pub mod connectivity;
pub mod constant;
pub mod debug;
pub mod math;
pub mod subflow;
pub mod three_d;
pub mod timing;
pub mod trigger;
pub mod visual;

use crate::connection::ConnectionManager;
use crate::executor::ExecutorRegistry;
use crate::graph::NodeId;
use crate::resource_manager::ResourceManager;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Registers every built-in node type this crate ships. `subflow_scope` is
/// the shared input/output context the scheduler threads through subflow
/// instances; `connection_manager` backs every connectivity/CLASP node.
pub fn register_builtins(
    registry: &mut ExecutorRegistry,
    resources: &ResourceManager,
    subflow_scope: Arc<DashMap<(NodeId, String), Value>>,
    connection_manager: Arc<ConnectionManager>,
) {
    use crate::executor::FnExecutor;
    use crate::resource_manager::ResourceTable;

    registry.register("constant", Arc::new(FnExecutor(constant::constant)));
    registry.register("slider", Arc::new(FnExecutor(constant::slider)));
    registry.register("knob", Arc::new(FnExecutor(constant::knob)));
    registry.register("xy-pad", Arc::new(FnExecutor(constant::xy_pad)));
    registry.register("time", Arc::new(FnExecutor(constant::time)));
    registry.register("lfo", Arc::new(FnExecutor(constant::lfo)));

    registry.register("add", Arc::new(FnExecutor(math::add)));
    registry.register("subtract", Arc::new(FnExecutor(math::subtract)));
    registry.register("multiply", Arc::new(FnExecutor(math::multiply)));
    registry.register("divide", Arc::new(FnExecutor(math::divide)));
    registry.register("modulo", Arc::new(FnExecutor(math::modulo)));
    registry.register("sin", Arc::new(FnExecutor(math::sin)));
    registry.register("cos", Arc::new(FnExecutor(math::cos)));
    registry.register("tan", Arc::new(FnExecutor(math::tan)));
    registry.register("and", Arc::new(FnExecutor(math::and)));
    registry.register("or", Arc::new(FnExecutor(math::or)));
    registry.register("not", Arc::new(FnExecutor(math::not)));
    registry.register("vector-add", Arc::new(FnExecutor(math::vector_add)));
    registry.register("lerp", Arc::new(FnExecutor(math::lerp)));
    registry.register("step", Arc::new(FnExecutor(math::step)));
    registry.register("smoothstep", Arc::new(FnExecutor(math::smoothstep)));
    registry.register("remap", Arc::new(FnExecutor(math::remap)));
    registry.register("quantize", Arc::new(FnExecutor(math::quantize)));
    registry.register("wrap", Arc::new(FnExecutor(math::wrap)));

    let trigger_prev = Arc::new(ResourceTable::<bool>::new());
    resources.register_family("trigger.prev_pressed", trigger_prev.clone());
    registry.register("trigger", Arc::new(trigger::TriggerExecutor::new(trigger_prev)));

    let timing_state = Arc::new(ResourceTable::<timing::TimingState>::new());
    resources.register_family("timing.state", timing_state.clone());
    registry.register("start", Arc::new(timing::StartExecutor::new(timing_state.clone())));
    registry.register("interval", Arc::new(timing::IntervalExecutor::new(timing_state.clone())));
    registry.register("delay", Arc::new(timing::DelayExecutor::new(timing_state.clone())));
    registry.register("timer", Arc::new(timing::TimerExecutor::new(timing_state.clone())));
    registry.register("metronome", Arc::new(FnExecutor(timing::metronome)));
    registry.register(
        "step-sequencer",
        Arc::new(timing::StepSequencerExecutor::new(timing_state)),
    );

    let monitor_last = Arc::new(ResourceTable::<Value>::new());
    resources.register_family("debug.monitor", monitor_last.clone());
    registry.register("monitor", Arc::new(debug::MonitorExecutor::new(monitor_last)));

    let oscilloscope_tag = Arc::new(ResourceTable::<String>::new());
    resources.register_family("debug.oscilloscope", oscilloscope_tag.clone());
    registry.register(
        "oscilloscope",
        Arc::new(debug::OscilloscopeExecutor::new(oscilloscope_tag)),
    );

    let equalizer_tag = Arc::new(ResourceTable::<String>::new());
    resources.register_family("debug.equalizer", equalizer_tag.clone());
    registry.register("equalizer", Arc::new(debug::EqualizerExecutor::new(equalizer_tag)));

    registry.register("graph", Arc::new(FnExecutor(debug::graph)));

    let console_last = Arc::new(ResourceTable::<Value>::new());
    resources.register_family("debug.console", console_last.clone());
    registry.register("console", Arc::new(debug::ConsoleExecutor::new(console_last)));

    registry.register(
        "subflow-input",
        Arc::new(subflow::SubflowInputExecutor::new(subflow_scope.clone())),
    );
    registry.register(
        "subflow-output",
        Arc::new(subflow::SubflowOutputExecutor::new(subflow_scope)),
    );

    let shader_programs = Arc::new(ResourceTable::<visual::CompiledProgram>::new());
    resources.register_family("visual.shader_programs", shader_programs.clone());
    registry.register("shader", Arc::new(visual::ShaderFamily::new(shader_programs.clone())));
    registry.register(
        "blend",
        Arc::new(visual::FixedProgramShader::new(visual::BLEND_FRAGMENT, shader_programs.clone())),
    );
    registry.register(
        "color-correction",
        Arc::new(visual::FixedProgramShader::new(
            visual::COLOR_CORRECTION_FRAGMENT,
            shader_programs.clone(),
        )),
    );
    registry.register(
        "displacement",
        Arc::new(visual::FixedProgramShader::new(
            visual::DISPLACEMENT_FRAGMENT,
            shader_programs.clone(),
        )),
    );
    registry.register(
        "blur-pass-1",
        Arc::new(visual::FixedProgramShader::new(
            visual::BLUR_PASS_ONE_FRAGMENT,
            shader_programs.clone(),
        )),
    );
    registry.register(
        "blur-pass-2",
        Arc::new(visual::FixedProgramShader::new(
            visual::BLUR_PASS_TWO_FRAGMENT,
            shader_programs.clone(),
        )),
    );
    registry.register(
        "transform-2d",
        Arc::new(visual::FixedProgramShader::new(visual::TRANSFORM_2D_FRAGMENT, shader_programs)),
    );

    let meshes = Arc::new(ResourceTable::<three_d::PrimitiveMesh>::new());
    resources.register_family("three_d.meshes", meshes.clone());
    registry.register("box", Arc::new(three_d::PrimitiveExecutor::new("box", meshes.clone())));
    registry.register("sphere", Arc::new(three_d::PrimitiveExecutor::new("sphere", meshes.clone())));
    registry.register("plane", Arc::new(three_d::PrimitiveExecutor::new("plane", meshes)));

    let materials = Arc::new(ResourceTable::<String>::new());
    let materials_owned = Arc::new(ResourceTable::<bool>::new());
    let material_executor = Arc::new(three_d::MaterialExecutor::new(materials, materials_owned));
    resources.register_family("three_d.materials", material_executor.clone());
    registry.register("material", material_executor);

    let scene_contents = Arc::new(ResourceTable::<Vec<String>>::new());
    resources.register_family("three_d.scene", scene_contents.clone());
    registry.register("scene", Arc::new(three_d::SceneExecutor::new(scene_contents)));

    let cameras = Arc::new(ResourceTable::<three_d::CameraConfig>::new());
    resources.register_family("three_d.cameras", cameras.clone());
    registry.register("camera", Arc::new(three_d::CameraExecutor::new(cameras)));

    let texture_cache = Arc::new(three_d::TextureConversionCache::new());
    resources.register_family("three_d.texture_cache", texture_cache);

    let gltf_loaded = Arc::new(ResourceTable::<three_d::GltfEntry>::new());
    resources.register_family("three_d.gltf", gltf_loaded.clone());
    registry.register("gltf-loader", Arc::new(three_d::GltfLoaderExecutor::new(gltf_loaded)));

    registry.register(
        "http-request",
        Arc::new(connectivity::SendExecutor::new(connection_manager.clone())),
    );
    registry.register(
        "websocket",
        Arc::new(connectivity::SendExecutor::new(connection_manager.clone())),
    );
    let ws_installed = Arc::new(ResourceTable::<(String, String)>::new());
    let ws_last_received = Arc::new(ResourceTable::<Value>::new());
    resources.register_family("connectivity.websocket.installed", ws_installed.clone());
    resources.register_family("connectivity.websocket.last_received", ws_last_received.clone());
    registry.register(
        "websocket-subscribe",
        Arc::new(connectivity::SubscribeExecutor::new(
            connection_manager.clone(),
            ws_installed,
            ws_last_received,
        )),
    );
    registry.register(
        "mqtt",
        Arc::new(connectivity::SendExecutor::new(connection_manager.clone())),
    );
    let mqtt_installed = Arc::new(ResourceTable::<(String, String)>::new());
    let mqtt_last_received = Arc::new(ResourceTable::<Value>::new());
    resources.register_family("connectivity.mqtt.installed", mqtt_installed.clone());
    resources.register_family("connectivity.mqtt.last_received", mqtt_last_received.clone());
    registry.register(
        "mqtt-subscribe",
        Arc::new(connectivity::SubscribeExecutor::new(
            connection_manager.clone(),
            mqtt_installed,
            mqtt_last_received,
        )),
    );

    let clasp_cache: clasp::ClaspCache = Arc::new(DashMap::new());
    registry.register(
        "clasp-connection",
        Arc::new(clasp::ClaspConnectionExecutor::new(connection_manager.clone())),
    );
    let clasp_installed = Arc::new(ResourceTable::<(String, String)>::new());
    resources.register_family("clasp.installed", clasp_installed.clone());
    registry.register(
        "clasp-subscribe",
        Arc::new(clasp::ClaspSubscribeExecutor::new(connection_manager.clone(), clasp_installed)),
    );
    registry.register(
        "clasp-set",
        Arc::new(clasp::ClaspSetExecutor::new(connection_manager.clone(), clasp_cache.clone())),
    );
    registry.register(
        "clasp-emit",
        Arc::new(clasp::ClaspEmitExecutor::new(connection_manager.clone())),
    );
    registry.register("clasp-get", Arc::new(clasp::ClaspGetExecutor::new(clasp_cache.clone())));
    registry.register(
        "clasp-stream",
        Arc::new(clasp::ClaspStreamExecutor::new(connection_manager.clone())),
    );
    registry.register(
        "clasp-bundle",
        Arc::new(clasp::ClaspBundleExecutor::new(connection_manager, clasp_cache)),
    );

    let ai_manager = Arc::new(ai::AiModelManager::new());
    registry.register(
        "ai-classify",
        Arc::new(ai::InferenceExecutor::new(ai_manager.clone(), "classify", false)),
    );
    registry.register(
        "ai-generate",
        Arc::new(ai::InferenceExecutor::new(ai_manager, "generate", false)),
    );
}
