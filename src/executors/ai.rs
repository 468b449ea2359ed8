//! Inference family: model handles keyed by `(task, modelId)`, loaded
//! asynchronously in the background while the node reports `loading: true`
//! rather than blocking the tick. Exposes load/unload/auto-load and a
//! per-model cache toggle, mirroring the manager-style API the connection
//! and resource subsystems already follow.

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type ModelKey = (String, String);

struct ModelState {
    loaded: AtomicBool,
    loading: AtomicBool,
    cache_enabled: AtomicBool,
    result_cache: DashMap<String, Value>,
}

impl ModelState {
    fn new(cache_enabled: bool) -> Self {
        Self {
            loaded: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            cache_enabled: AtomicBool::new(cache_enabled),
            result_cache: DashMap::new(),
        }
    }
}

#[derive(Default)]
pub struct AiModelManager {
    models: DashMap<ModelKey, Arc<ModelState>>,
}

impl AiModelManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, task: &str, model_id: &str) -> Arc<ModelState> {
        self.models
            .entry((task.to_string(), model_id.to_string()))
            .or_insert_with(|| Arc::new(ModelState::new(true)))
            .clone()
    }

    pub fn is_loaded(&self, task: &str, model_id: &str) -> bool {
        self.state(task, model_id).loaded.load(Ordering::SeqCst)
    }

    /// Begins an async load if one isn't already in flight or complete.
    /// The provided `loader` simulates whatever backend-specific warmup an
    /// inference runtime needs.
    pub fn load<F, Fut>(&self, task: &str, model_id: &str, loader: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let state = self.state(task, model_id);
        if state.loaded.load(Ordering::SeqCst) || state.loading.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(async move {
            loader().await;
            state.loaded.store(true, Ordering::SeqCst);
            state.loading.store(false, Ordering::SeqCst);
        });
    }

    pub fn unload(&self, task: &str, model_id: &str) {
        if let Some((_, state)) = self.models.remove(&(task.to_string(), model_id.to_string())) {
            state.result_cache.clear();
        }
    }

    pub fn set_cache_enabled(&self, task: &str, model_id: &str, enabled: bool) {
        self.state(task, model_id)
            .cache_enabled
            .store(enabled, Ordering::SeqCst);
        if !enabled {
            self.state(task, model_id).result_cache.clear();
        }
    }
}

pub struct InferenceExecutor {
    manager: Arc<AiModelManager>,
    task: &'static str,
    auto_load: bool,
}

impl InferenceExecutor {
    pub fn new(manager: Arc<AiModelManager>, task: &'static str, auto_load: bool) -> Self {
        Self {
            manager,
            task,
            auto_load,
        }
    }
}

impl Executor for InferenceExecutor {
    /// Triggers a load when needed (immediately if `auto_load`, otherwise
    /// only once the `load` control is set) and reports `loading: true`
    /// until the background task completes. Once loaded, computes
    /// synchronously and caches by input hash when caching is enabled.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let model_id = ctx.control_str("modelId", "default");
        let input = ctx.input("input");
        let should_load = self.auto_load || ctx.control_bool("load", false);

        if !self.manager.is_loaded(self.task, &model_id) {
            if should_load {
                let task = self.task.to_string();
                let model_id_owned = model_id.clone();
                self.manager.load(self.task, &model_id, move || async move {
                    tracing::info!(task = %task, model = %model_id_owned, "loading inference model");
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                });
            }
            return Ok(ExecutorOutcome::ready(ValueMap::from([(
                "loading".into(),
                json!(true),
            )])));
        }

        let state = self.manager.state(self.task, &model_id);
        let cache_key = blake3::hash(input.to_string().as_bytes()).to_hex().to_string();
        if state.cache_enabled.load(Ordering::SeqCst) {
            if let Some(cached) = state.result_cache.get(&cache_key) {
                return Ok(ExecutorOutcome::ready(ValueMap::from([
                    ("loading".into(), json!(false)),
                    ("result".into(), cached.clone()),
                ])));
            }
        }

        let result = run_stub_inference(self.task, &input);
        if state.cache_enabled.load(Ordering::SeqCst) {
            state.result_cache.insert(cache_key, result.clone());
        }
        Ok(ExecutorOutcome::ready(ValueMap::from([
            ("loading".into(), json!(false)),
            ("result".into(), result),
        ])))
    }
}

/// No real inference backend ships in this crate; a deterministic stub
/// lets the node wiring and caching behavior be exercised and tested.
fn run_stub_inference(task: &str, input: &Value) -> Value {
    json!({ "task": task, "echo": input })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::GatheredInput;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx(node: NodeId, controls: ValueMap, input: Option<Value>) -> ExecutionContext<'static> {
        let inputs = match input {
            Some(v) => HashMap::from([("input".into(), GatheredInput::Single(v))]),
            None => HashMap::new(),
        };
        ExecutionContext::new(node, inputs, controls, 0.016, 0.0, 1, None, |_| None)
    }

    #[test]
    fn reports_loading_until_model_ready() {
        let manager = Arc::new(AiModelManager::new());
        let exec = InferenceExecutor::new(manager.clone(), "classify", true);
        let node = NodeId::new();
        let c = ValueMap::from([("modelId".into(), json!("m1"))]);

        let ExecutorOutcome::Ready(out) = exec.execute(&ctx(node, c, Some(json!("x")))).unwrap() else {
            panic!()
        };
        assert_eq!(out["loading"], json!(true));
        assert!(!manager.is_loaded("classify", "m1"));
    }

    #[test]
    fn cache_toggle_clears_results() {
        let manager = Arc::new(AiModelManager::new());
        manager.set_cache_enabled("classify", "m1", false);
        assert!(!manager.state("classify", "m1").cache_enabled.load(Ordering::SeqCst));
    }
}
