//! Math/logic/trig/vector/modulo/lerp/step/smoothstep/remap/quantize/wrap:
//! pure functions of inputs and controls. Division by zero returns 0;
//! unknown operations default to the first operand.

use crate::executor::{ExecutionContext, ExecutorOutcome, ValueMap};
use serde_json::json;

fn a_b(ctx: &ExecutionContext<'_>) -> (f64, f64) {
    (ctx.input_f64("a", 0.0), ctx.input_f64("b", 0.0))
}

fn result(v: f64) -> anyhow::Result<ExecutorOutcome> {
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "result".into(),
        json!(v),
    )])))
}

pub fn add(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let (a, b) = a_b(ctx);
    result(a + b)
}

pub fn subtract(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let (a, b) = a_b(ctx);
    result(a - b)
}

pub fn multiply(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let (a, b) = a_b(ctx);
    result(a * b)
}

pub fn divide(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let (a, b) = a_b(ctx);
    result(if b == 0.0 { 0.0 } else { a / b })
}

pub fn modulo(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let (a, b) = a_b(ctx);
    result(if b == 0.0 { 0.0 } else { a.rem_euclid(b) })
}

pub fn sin(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    result(ctx.input_f64("value", 0.0).sin())
}

pub fn cos(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    result(ctx.input_f64("value", 0.0).cos())
}

pub fn tan(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    result(ctx.input_f64("value", 0.0).tan())
}

pub fn and(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let v = ctx.input("a").as_bool().unwrap_or(false) && ctx.input("b").as_bool().unwrap_or(false);
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "result".into(),
        json!(v),
    )])))
}

pub fn or(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let v = ctx.input("a").as_bool().unwrap_or(false) || ctx.input("b").as_bool().unwrap_or(false);
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "result".into(),
        json!(v),
    )])))
}

pub fn not(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let v = !ctx.input("value").as_bool().unwrap_or(false);
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "result".into(),
        json!(v),
    )])))
}

pub fn vector_add(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let a = ctx.input("a");
    let b = ctx.input("b");
    let ax = a.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let ay = a.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let az = a.get("z").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let bx = b.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let by = b.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let bz = b.get("z").and_then(|v| v.as_f64()).unwrap_or(0.0);
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "result".into(),
        json!({"x": ax + bx, "y": ay + by, "z": az + bz}),
    )])))
}

/// Linear interpolation: `a + (b - a) * t`, `t` taken from control `t`.
pub fn lerp(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let (a, b) = a_b(ctx);
    let t = ctx.control_f64("t", 0.5);
    result(a + (b - a) * t)
}

/// `0` below `edge`, `1` at/above it.
pub fn step(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let edge = ctx.control_f64("edge", 0.0);
    let x = ctx.input_f64("value", 0.0);
    result(if x < edge { 0.0 } else { 1.0 })
}

pub fn smoothstep(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let edge0 = ctx.control_f64("edge0", 0.0);
    let edge1 = ctx.control_f64("edge1", 1.0);
    let x = ctx.input_f64("value", 0.0);
    let t = if edge1 == edge0 {
        0.0
    } else {
        ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0)
    };
    result(t * t * (3.0 - 2.0 * t))
}

/// Remaps `value` from `[inMin, inMax]` to `[outMin, outMax]`.
pub fn remap(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let value = ctx.input_f64("value", 0.0);
    let in_min = ctx.control_f64("inMin", 0.0);
    let in_max = ctx.control_f64("inMax", 1.0);
    let out_min = ctx.control_f64("outMin", 0.0);
    let out_max = ctx.control_f64("outMax", 1.0);
    let span = in_max - in_min;
    let t = if span == 0.0 { 0.0 } else { (value - in_min) / span };
    result(out_min + t * (out_max - out_min))
}

pub fn quantize(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let value = ctx.input_f64("value", 0.0);
    let step_size = ctx.control_f64("step", 1.0);
    result(if step_size == 0.0 {
        value
    } else {
        (value / step_size).round() * step_size
    })
}

/// Wraps `value` into `[min, max)`.
pub fn wrap(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    let value = ctx.input_f64("value", 0.0);
    let min = ctx.control_f64("min", 0.0);
    let max = ctx.control_f64("max", 1.0);
    let span = max - min;
    result(if span == 0.0 {
        min
    } else {
        min + (value - min).rem_euclid(span)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::GatheredInput;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx_with(a: f64, b: f64) -> ExecutionContext<'static> {
        ExecutionContext::new(
            NodeId::new(),
            HashMap::from([
                ("a".into(), GatheredInput::Single(json!(a))),
                ("b".into(), GatheredInput::Single(json!(b))),
            ]),
            ValueMap::new(),
            0.016,
            0.0,
            1,
            None,
            |_| None,
        )
    }

    #[test]
    fn divide_by_zero_is_zero() {
        let ExecutorOutcome::Ready(out) = divide(&ctx_with(5.0, 0.0)).unwrap() else {
            panic!()
        };
        assert_eq!(out["result"], json!(0.0));
    }

    #[test]
    fn math_chain_matches_scenario_2() {
        let ExecutorOutcome::Ready(add_out) = add(&ctx_with(3.0, 4.0)).unwrap() else {
            panic!()
        };
        assert_eq!(add_out["result"], json!(7.0));

        let ctx_mul = ExecutionContext::new(
            NodeId::new(),
            HashMap::from([
                ("a".into(), GatheredInput::Single(add_out["result"].clone())),
                ("b".into(), GatheredInput::Single(json!(5.0))),
            ]),
            ValueMap::new(),
            0.016,
            0.0,
            1,
            None,
            |_| None,
        );
        let ExecutorOutcome::Ready(mul_out) = multiply(&ctx_mul).unwrap() else {
            panic!()
        };
        assert_eq!(mul_out["result"], json!(35.0));
    }
}
