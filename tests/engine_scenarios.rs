//! End-to-end scenarios driven through the full `Engine`/`Scheduler` stack:
//! no node type needs to be registered in the catalog for execution, since
//! the scheduler falls back to discovering a node's ports from its incoming
//! edges when the catalog has no static definition for its type.

use dataflow_engine::app::Engine;
use dataflow_engine::config::EngineConfig;
use dataflow_engine::events::EngineEvent;
use dataflow_engine::graph::{Edge, Flow, Node};
use dataflow_engine::nodes::Platform;
use serde_json::json;
use std::f64::consts::PI;

fn engine() -> Engine {
    Engine::new(EngineConfig::default(), Platform::Web)
}

#[tokio::test]
async fn scenario_1_lfo_into_monitor() {
    let mut engine = engine();
    let mut flow = Flow::new("lfo-monitor");

    let mut lfo = Node::new("lfo");
    lfo.data.insert("frequency".into(), json!(1.0));
    lfo.data.insert("amplitude".into(), json!(1.0));
    lfo.data.insert("offset".into(), json!(0.0));
    lfo.data.insert("waveform".into(), json!("sine"));
    let lfo_id = lfo.id;

    let monitor = Node::new("monitor");
    let monitor_id = monitor.id;

    flow.add_node(lfo);
    flow.add_node(monitor);
    flow.add_edge(Edge::new(lfo_id, "value", monitor_id, "value")).unwrap();

    let flow_id = engine.insert_flow(flow);
    engine.start_flow(flow_id);

    // Advance the clock to totalTime=0.25 in two ticks (0.15 + 0.10), since
    // `tick_once` integrates deltaTime rather than accepting an absolute time.
    engine.tick_once(0.15).await.unwrap();
    let report = engine.tick_once(0.10).await.unwrap();

    assert!((report.total_time - 0.25).abs() < 1e-9);
    assert!(!report.cycle_detected);
    let display = engine
        .output(monitor_id, "display")
        .and_then(|v| v.as_f64())
        .expect("monitor produced a display value");
    let expected = (2.0 * PI * 1.0 * 0.25).sin();
    assert!((display - expected).abs() < 1e-10, "display was {display}, expected {expected}");
}

#[tokio::test]
async fn scenario_2_math_chain() {
    let mut engine = engine();
    let mut flow = Flow::new("math-chain");

    let mut a = Node::new("constant");
    a.data.insert("value".into(), json!(3.0));
    let a_id = a.id;

    let mut b = Node::new("constant");
    b.data.insert("value".into(), json!(4.0));
    let b_id = b.id;

    let mut five = Node::new("constant");
    five.data.insert("value".into(), json!(5.0));
    let five_id = five.id;

    let c = Node::new("add");
    let c_id = c.id;

    let d = Node::new("multiply");
    let d_id = d.id;

    flow.add_node(a);
    flow.add_node(b);
    flow.add_node(five);
    flow.add_node(c);
    flow.add_node(d);

    flow.add_edge(Edge::new(a_id, "value", c_id, "a")).unwrap();
    flow.add_edge(Edge::new(b_id, "value", c_id, "b")).unwrap();
    flow.add_edge(Edge::new(c_id, "result", d_id, "a")).unwrap();
    flow.add_edge(Edge::new(five_id, "value", d_id, "b")).unwrap();

    let flow_id = engine.insert_flow(flow);
    engine.start_flow(flow_id);

    let report = engine.tick_once(0.016).await.unwrap();
    assert!(!report.cycle_detected);
    assert!(report.errors.is_empty());

    let result = engine.output(d_id, "result").expect("D produced a result");
    assert_eq!(result, json!(35.0));
}

#[tokio::test]
async fn scenario_3_cycle_rejection() {
    let mut engine = engine();
    let mut flow = Flow::new("cycle");

    let a = Node::new("add");
    let a_id = a.id;
    let b = Node::new("add");
    let b_id = b.id;

    flow.add_node(a);
    flow.add_node(b);
    flow.add_edge(Edge::new(a_id, "result", b_id, "a")).unwrap();
    flow.add_edge(Edge::new(b_id, "result", a_id, "a")).unwrap();

    let flow_id = engine.insert_flow(flow);
    engine.start_flow(flow_id);

    let mut subscriber = engine.subscribe_events();
    let report = engine.tick_once(0.016).await.unwrap();

    assert!(report.cycle_detected);
    assert!(engine.output(a_id, "result").is_none());
    assert!(engine.output(b_id, "result").is_none());

    let mut saw_cycle_validation = false;
    while let Ok(event) = subscriber.try_recv() {
        if let EngineEvent::GraphValidation { message, .. } = event {
            if message.contains("cycle") {
                saw_cycle_validation = true;
            }
        }
    }
    assert!(saw_cycle_validation, "expected a GraphValidation cycle event");
}

#[tokio::test]
async fn scenario_4_subflow_doubles_its_input() {
    let mut engine = engine();

    let mut inner = Flow::new("doubler");
    inner.is_subflow = true;
    inner.subflow_inputs = vec!["x".into()];
    inner.subflow_outputs = vec!["y".into()];

    let mut sub_in = Node::new("subflow-input");
    sub_in.data.insert("portId".into(), json!("x"));
    let sub_in_id = sub_in.id;

    let mut two = Node::new("constant");
    two.data.insert("value".into(), json!(2.0));
    let two_id = two.id;

    let mult = Node::new("multiply");
    let mult_id = mult.id;

    let mut sub_out = Node::new("subflow-output");
    sub_out.data.insert("portId".into(), json!("y"));
    let sub_out_id = sub_out.id;

    inner.add_node(sub_in);
    inner.add_node(two);
    inner.add_node(mult);
    inner.add_node(sub_out);
    inner
        .add_edge(Edge::new(sub_in_id, "value", mult_id, "a"))
        .unwrap();
    inner.add_edge(Edge::new(two_id, "value", mult_id, "b")).unwrap();
    inner
        .add_edge(Edge::new(mult_id, "result", sub_out_id, "value"))
        .unwrap();

    let inner_id = inner.id;

    let mut main = Flow::new("main");
    let mut five = Node::new("constant");
    five.data.insert("value".into(), json!(5.0));
    let five_id = five.id;

    let mut subflow_node = Node::new("subflow");
    subflow_node.data.insert("subflowId".into(), json!(inner_id.0.to_string()));
    let subflow_node_id = subflow_node.id;

    let monitor = Node::new("monitor");
    let monitor_id = monitor.id;

    main.add_node(five);
    main.add_node(subflow_node);
    main.add_node(monitor);
    main.add_edge(Edge::new(five_id, "value", subflow_node_id, "x")).unwrap();
    main.add_edge(Edge::new(subflow_node_id, "y", monitor_id, "value"))
        .unwrap();

    engine.insert_flow(inner);
    let main_id = engine.insert_flow(main);
    engine.start_flow(main_id);

    let report = engine.tick_once(0.016).await.unwrap();
    assert!(!report.cycle_detected);
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);

    let display = engine
        .output(monitor_id, "display")
        .expect("monitor produced a display value");
    assert_eq!(display, json!(10.0));
}

#[tokio::test]
async fn determinism_with_no_time_dependent_inputs() {
    let mut engine = engine();
    let mut flow = Flow::new("deterministic");

    let mut a = Node::new("constant");
    a.data.insert("value".into(), json!(2.0));
    let a_id = a.id;
    let mut b = Node::new("constant");
    b.data.insert("value".into(), json!(7.0));
    let b_id = b.id;
    let add = Node::new("add");
    let add_id = add.id;

    flow.add_node(a);
    flow.add_node(b);
    flow.add_node(add);
    flow.add_edge(Edge::new(a_id, "value", add_id, "a")).unwrap();
    flow.add_edge(Edge::new(b_id, "value", add_id, "b")).unwrap();

    let flow_id = engine.insert_flow(flow);
    engine.start_flow(flow_id);

    engine.tick_once(0.016).await.unwrap();
    let first = engine.output(add_id, "result").unwrap();

    // Restart resets the clock/cache but the graph itself is unchanged, so a
    // fresh run at the same deltaTime must reproduce the same output.
    engine.stop_flow();
    engine.start_flow(flow_id);
    engine.tick_once(0.016).await.unwrap();
    let second = engine.output(add_id, "result").unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn topological_correctness_over_a_diamond_graph() {
    // a -> b -> d
    // a -> c -> d
    // `d` must only ever observe `a`'s executor having already run through
    // both `b` and `c`; NodeTelemetry is emitted in dispatch order, so a
    // valid topological order puts `a` strictly before `b`/`c`, and both of
    // those strictly before `d`.
    let mut engine = engine();
    let mut flow = Flow::new("diamond");

    let mut a = Node::new("constant");
    a.data.insert("value".into(), json!(1.0));
    let a_id = a.id;
    let b = Node::new("add");
    let b_id = b.id;
    let c = Node::new("add");
    let c_id = c.id;
    let d = Node::new("add");
    let d_id = d.id;

    flow.add_node(a);
    flow.add_node(b);
    flow.add_node(c);
    flow.add_node(d);
    flow.add_edge(Edge::new(a_id, "value", b_id, "a")).unwrap();
    flow.add_edge(Edge::new(a_id, "value", c_id, "a")).unwrap();
    flow.add_edge(Edge::new(b_id, "result", d_id, "a")).unwrap();
    flow.add_edge(Edge::new(c_id, "result", d_id, "b")).unwrap();

    let flow_id = engine.insert_flow(flow);
    engine.start_flow(flow_id);

    let mut subscriber = engine.subscribe_events();
    engine.tick_once(0.016).await.unwrap();

    let mut order = Vec::new();
    while let Ok(event) = subscriber.try_recv() {
        if let EngineEvent::NodeTelemetry { node_id, .. } = event {
            order.push(node_id);
        }
    }

    let pos = |id| order.iter().position(|&n| n == id).expect("node ran this tick");
    assert!(pos(a_id) < pos(b_id));
    assert!(pos(a_id) < pos(c_id));
    assert!(pos(b_id) < pos(d_id));
    assert!(pos(c_id) < pos(d_id));

    // d combines b.result + c.result = 1 + 1 = 2.
    assert_eq!(engine.output(d_id, "result"), Some(json!(2.0)));
}
