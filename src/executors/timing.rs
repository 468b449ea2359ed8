//! Timing family: stateful per-node records keyed by node id. Each executor
//! does rising-edge clock detection on its own `clock`/`start`/`stop`/`reset`
//! inputs where relevant.

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::resource_manager::ResourceTable;
use serde_json::json;
use std::sync::Arc;

/// Per-node timing record. Not every field is used by every node type, but
/// sharing one record keeps the family's resource table singular.
#[derive(Debug, Clone, Default)]
pub struct TimingState {
    pub prev_clock: bool,
    pub last_fire_time: f64,
    pub running: bool,
    pub elapsed: f64,
    pub step_index: u64,
}

fn rising_edge(prev: bool, now: bool) -> bool {
    now && !prev
}

pub struct StartExecutor {
    state: Arc<ResourceTable<TimingState>>,
}

impl StartExecutor {
    pub fn new(state: Arc<ResourceTable<TimingState>>) -> Self {
        Self { state }
    }
}

impl Executor for StartExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let clock = ctx.input("start").as_bool().unwrap_or(false);
        let mut rec = self.state.get(ctx.node_id).map(|r| r.clone()).unwrap_or_default();
        let fired = rising_edge(rec.prev_clock, clock);
        rec.prev_clock = clock;
        if fired {
            rec.last_fire_time = ctx.total_time;
        }
        self.state.insert(ctx.node_id, rec);

        let mut outputs = ValueMap::new();
        if fired {
            outputs.insert("triggered".into(), json!(true));
        }
        Ok(ExecutorOutcome::ready(outputs))
    }
}

/// Fires every `interval` seconds of `totalTime`, independent of clock input.
pub struct IntervalExecutor {
    state: Arc<ResourceTable<TimingState>>,
}

impl IntervalExecutor {
    pub fn new(state: Arc<ResourceTable<TimingState>>) -> Self {
        Self { state }
    }
}

impl Executor for IntervalExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let interval = ctx.control_f64("interval", 1.0).max(1e-6);
        let mut rec = self.state.get(ctx.node_id).map(|r| r.clone()).unwrap_or_default();
        let fired = ctx.total_time - rec.last_fire_time >= interval;
        if fired {
            rec.last_fire_time = ctx.total_time;
        }
        self.state.insert(ctx.node_id, rec);

        let mut outputs = ValueMap::new();
        if fired {
            outputs.insert("triggered".into(), json!(true));
        }
        Ok(ExecutorOutcome::ready(outputs))
    }
}

/// Re-emits a rising edge on `trigger` after `delayMs` milliseconds.
pub struct DelayExecutor {
    state: Arc<ResourceTable<TimingState>>,
}

impl DelayExecutor {
    pub fn new(state: Arc<ResourceTable<TimingState>>) -> Self {
        Self { state }
    }
}

impl Executor for DelayExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let trigger = ctx.input("trigger").as_bool().unwrap_or(false);
        let delay_s = ctx.control_f64("delayMs", 0.0) / 1000.0;
        let mut rec = self.state.get(ctx.node_id).map(|r| r.clone()).unwrap_or_default();

        if rising_edge(rec.prev_clock, trigger) {
            rec.last_fire_time = ctx.total_time + delay_s;
        }
        rec.prev_clock = trigger;

        let fired = rec.last_fire_time > 0.0
            && ctx.total_time >= rec.last_fire_time
            && ctx.total_time - ctx.delta_time < rec.last_fire_time;
        self.state.insert(ctx.node_id, rec);

        let mut outputs = ValueMap::new();
        if fired {
            outputs.insert("triggered".into(), json!(true));
        }
        Ok(ExecutorOutcome::ready(outputs))
    }
}

/// Start/stop/reset inputs (rising-edge) drive a running elapsed-time counter.
pub struct TimerExecutor {
    state: Arc<ResourceTable<TimingState>>,
}

impl TimerExecutor {
    pub fn new(state: Arc<ResourceTable<TimingState>>) -> Self {
        Self { state }
    }
}

impl Executor for TimerExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let start = ctx.input("start").as_bool().unwrap_or(false);
        let stop = ctx.input("stop").as_bool().unwrap_or(false);
        let reset = ctx.input("reset").as_bool().unwrap_or(false);
        let mut rec = self.state.get(ctx.node_id).map(|r| r.clone()).unwrap_or_default();

        if reset {
            rec.elapsed = 0.0;
        }
        if start {
            rec.running = true;
        }
        if stop {
            rec.running = false;
        }
        if rec.running {
            rec.elapsed += ctx.delta_time;
        }
        self.state.insert(ctx.node_id, rec.clone());

        Ok(ExecutorOutcome::ready(ValueMap::from([
            ("elapsed".into(), json!(rec.elapsed)),
            ("running".into(), json!(rec.running)),
        ])))
    }
}

/// Derives `beat`, `bar`, `beatNum`, `barNum`, `phase` from `bpm` and
/// `subdivision`; swing delays odd sub-beats by `(swing/100)*0.5` of a
/// sub-beat, swing clamped to `0..100`.
pub fn metronome(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let bpm = ctx.control_f64("bpm", 120.0).max(1e-6);
    let subdivision = ctx.control_f64("subdivision", 4.0).max(1.0);
    let swing = ctx.control_f64("swing", 0.0).clamp(0.0, 100.0);
    let beats_per_sec = bpm / 60.0;
    let sub_beats_per_sec = beats_per_sec * subdivision;
    let mut sub_beat_time = ctx.total_time * sub_beats_per_sec;

    let swing_frac = (swing / 100.0) * 0.5;
    let sub_index = sub_beat_time.floor() as i64;
    if sub_index % 2 == 1 {
        sub_beat_time -= swing_frac;
    }

    let phase = sub_beat_time.rem_euclid(1.0);
    let beat_num = (ctx.total_time * beats_per_sec).floor() as u64;
    let bar_num = beat_num / (subdivision as u64).max(1);
    let beat = beat_num % (subdivision as u64).max(1);

    Ok(ExecutorOutcome::ready(ValueMap::from([
        ("beat".into(), json!(beat)),
        ("bar".into(), json!(bar_num)),
        ("beatNum".into(), json!(beat_num)),
        ("barNum".into(), json!(bar_num)),
        ("phase".into(), json!(phase)),
    ])))
}

/// Advances a step index on every rising edge of `clock`, cycling modulo `steps`.
pub struct StepSequencerExecutor {
    state: Arc<ResourceTable<TimingState>>,
}

impl StepSequencerExecutor {
    pub fn new(state: Arc<ResourceTable<TimingState>>) -> Self {
        Self { state }
    }
}

impl Executor for StepSequencerExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let clock = ctx.input("clock").as_bool().unwrap_or(false);
        let steps = ctx.control_f64("steps", 8.0).max(1.0) as u64;
        let mut rec = self.state.get(ctx.node_id).map(|r| r.clone()).unwrap_or_default();

        if rising_edge(rec.prev_clock, clock) {
            rec.step_index = (rec.step_index + 1) % steps;
        }
        rec.prev_clock = clock;
        self.state.insert(ctx.node_id, rec.clone());

        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "step".into(),
            json!(rec.step_index),
        )])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    #[test]
    fn step_sequencer_advances_on_rising_edge_only() {
        let table = Arc::new(ResourceTable::new());
        let exec = StepSequencerExecutor::new(table);
        let node = NodeId::new();

        let c1 = ExecutionContext::new(
            node,
            HashMap::from([(
                "clock".into(),
                crate::executor::GatheredInput::Single(json!(true)),
            )]),
            ValueMap::new(),
            0.016,
            0.0,
            1,
            None,
            |_| None,
        );
        let ExecutorOutcome::Ready(out) = exec.execute(&c1).unwrap() else {
            panic!()
        };
        assert_eq!(out["step"], json!(1));

        // Holding high should not advance further.
        let ExecutorOutcome::Ready(out2) = exec.execute(&c1).unwrap() else {
            panic!()
        };
        assert_eq!(out2["step"], json!(1));
    }

    #[test]
    fn metronome_derives_beat_from_bpm() {
        let ctx = ExecutionContext::new(
            NodeId::new(),
            HashMap::new(),
            ValueMap::from([("bpm".into(), json!(120.0)), ("subdivision".into(), json!(4.0))]),
            0.016,
            1.0,
            1,
            None,
            |_| None,
        );
        let ExecutorOutcome::Ready(out) = metronome(&ctx).unwrap() else {
            panic!()
        };
        assert_eq!(out["beatNum"], json!(2));
    }
}
