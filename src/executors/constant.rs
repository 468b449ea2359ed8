//! Constant/input family: values derived purely from controls, plus time.

use crate::executor::{ExecutionContext, ExecutorOutcome, ValueMap};
use serde_json::json;
use std::f64::consts::PI;

pub fn constant(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let value = ctx.control("value").cloned().unwrap_or(json!(0.0));
    Ok(ExecutorOutcome::ready(ValueMap::from([("value".into(), value)])))
}

pub fn slider(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "value".into(),
        json!(ctx.control_f64("value", 0.0)),
    )])))
}

pub fn knob(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "value".into(),
        json!(ctx.control_f64("value", 0.0)),
    )])))
}

pub fn xy_pad(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    Ok(ExecutorOutcome::ready(ValueMap::from([
        ("x".into(), json!(ctx.control_f64("x", 0.0))),
        ("y".into(), json!(ctx.control_f64("y", 0.0))),
    ])))
}

pub fn time(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    Ok(ExecutorOutcome::ready(ValueMap::from([
        ("totalTime".into(), json!(ctx.total_time)),
        ("deltaTime".into(), json!(ctx.delta_time)),
        ("frameCount".into(), json!(ctx.frame_count)),
    ])))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    fn from_str(s: &str) -> Self {
        match s {
            "square" => Waveform::Square,
            "triangle" => Waveform::Triangle,
            "sawtooth" => Waveform::Sawtooth,
            _ => Waveform::Sine,
        }
    }

    /// Evaluates the waveform at `phase` (0..1), range -1..1.
    fn sample(self, phase: f64) -> f64 {
        let p = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (2.0 * PI * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 4.0 * (p - (p + 0.75).floor() + 0.25).abs() - 1.0,
            Waveform::Sawtooth => 2.0 * (p - p.round()),
        }
    }
}

/// Phase is `totalTime * frequency`; output is amplitude-scaled and
/// DC-offset: `offset + amplitude * waveform(phase)`.
pub fn lfo(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let freq = ctx.control_f64("frequency", 1.0);
    let amp = ctx.control_f64("amplitude", 1.0);
    let offset = ctx.control_f64("offset", 0.0);
    let waveform = Waveform::from_str(&ctx.control_str("waveform", "sine"));

    let phase = ctx.total_time * freq;
    let value = offset + amp * waveform.sample(phase);

    Ok(ExecutorOutcome::ready(ValueMap::from([
        ("value".into(), json!(value)),
        ("phase".into(), json!(phase.rem_euclid(1.0))),
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx(total_time: f64, controls: ValueMap) -> ExecutionContext<'static> {
        ExecutionContext::new(
            NodeId::new(),
            HashMap::new(),
            controls,
            0.016,
            total_time,
            1,
            None,
            |_| None,
        )
    }

    #[test]
    fn lfo_sine_matches_scenario_1() {
        let controls = ValueMap::from([
            ("frequency".into(), json!(1.0)),
            ("amplitude".into(), json!(1.0)),
            ("offset".into(), json!(0.0)),
            ("waveform".into(), json!("sine")),
        ]);
        let outcome = lfo(&ctx(0.25, controls)).unwrap();
        match outcome {
            ExecutorOutcome::Ready(out) => {
                let value = out["value"].as_f64().unwrap();
                assert!((value - 1.0).abs() < 1e-9, "value was {value}");
            }
            _ => panic!("expected Ready"),
        }
    }
}
