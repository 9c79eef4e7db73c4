// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: the full add → run → remove → clear lifecycle
//! across devices, admission control, and the dispatch pump.

use device_manager::DeviceConfig;
use graph_ir::{
    CompilationContext, ExecutionContext, Function, Module, Node, NodeKind, Placeholder,
    PlaceholderBindings, PrecisionMode,
};
use host_runtime::{stats, ErrorCode, HostConfig, HostManager, HostOptions};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tensor_core::{ElemKind, Shape, Tensor, Type};

// ── Helpers ────────────────────────────────────────────────────

fn float_ty(dims: Vec<usize>) -> Type {
    Type::new(ElemKind::Float, Shape::new(dims))
}

fn ph(name: &str, len: usize) -> Placeholder {
    Placeholder {
        name: name.into(),
        ty: float_ty(vec![len]),
    }
}

/// `in -> tanh -> out`, with `chain` extra unary nodes for bulk.
fn unary_chain_function(name: &str, chain: usize, len: usize) -> Function {
    let mut nodes = Vec::new();
    let mut prev = "in".to_string();
    for i in 0..chain {
        let node_name = format!("t{i}");
        nodes.push(Node {
            name: node_name.clone(),
            kind: NodeKind::Tanh,
            inputs: vec![prev.clone()],
            input_tys: vec![float_ty(vec![len])],
            output_tys: vec![float_ty(vec![len])],
        });
        prev = node_name;
    }
    Function {
        name: name.into(),
        inputs: vec![ph("in", len)],
        outputs: vec![ph("out", len)],
        output_nodes: vec![prev],
        nodes,
    }
}

fn module_with(names: &[&str]) -> Module {
    let mut module = Module::new();
    for name in names {
        module
            .add_function(unary_chain_function(name, 2, 16))
            .unwrap();
    }
    module
}

fn host(max_active: usize, max_queue: usize) -> HostManager {
    HostManager::new(
        vec![DeviceConfig::new("cpu", 1 << 20)],
        HostConfig {
            executor_threads: 2,
            max_active_requests: max_active,
            max_queue_size: max_queue,
        },
        HostOptions::default(),
    )
    .unwrap()
}

fn input_ctx() -> Box<ExecutionContext> {
    let mut ctx = Box::new(ExecutionContext::new());
    ctx.bindings.insert(
        "in",
        Tensor::from_f32(Shape::vector(16), &[0.5; 16]).unwrap(),
    );
    ctx
}

// ── Scenario 1: add, lookup, duplicate ─────────────────────────

#[test]
fn test_add_and_duplicate_rejected() {
    let host = host(4, 16);
    host.add_network(module_with(&["A", "B"]), CompilationContext::default())
        .unwrap();
    assert!(host.network_added("A"));
    assert!(host.network_added("B"));

    let err = host
        .add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Runtime);

    // The failed add left no reservation behind; an unrelated name works.
    host.add_network(module_with(&["C"]), CompilationContext::default())
        .unwrap();
    assert!(host.network_added("C"));
}

// ── Scenario 2: admission control ──────────────────────────────

#[test]
fn test_queue_overflow_refused() {
    let host = host(1, 2);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));
    let results: Arc<Mutex<Vec<Result<(), ErrorCode>>>> = Arc::new(Mutex::new(Vec::new()));

    // First request: its completion callback stalls the pump until the
    // gate opens, so the next two stay queued.
    {
        let results = Arc::clone(&results);
        let gate_rx = Arc::clone(&gate_rx);
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, result, _| {
                gate_rx.lock().unwrap().recv().unwrap();
                results.lock().unwrap().push(result.map_err(|e| e.code()));
            }),
            0,
        );
    }
    for _ in 0..2 {
        let results = Arc::clone(&results);
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, result, _| {
                results.lock().unwrap().push(result.map_err(|e| e.code()));
            }),
            0,
        );
    }

    // Fourth request: the queue is at its bound, refusal is inline.
    let (tx, rx) = mpsc::channel();
    host.run_network(
        "A",
        input_ctx(),
        Box::new(move |_, result, _| {
            tx.send(result.map_err(|e| e.code())).unwrap();
        }),
        0,
    );
    assert_eq!(rx.recv().unwrap(), Err(ErrorCode::RequestRefused));

    // Open the gate and let the three queued/running requests finish.
    gate_tx.send(()).unwrap();
    loop {
        if results.lock().unwrap().len() == 3 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert!(results.lock().unwrap().iter().all(|r| r.is_ok()));

    // Callbacks fired exactly once each: 3 successes + 1 refusal.
    assert_eq!(host.stats().counter("requests_processed.A"), 3);
    assert_eq!(host.stats().counter("requests_succeeded.A"), 3);
}

// ── Scenario 3: priority order with FIFO tie-break ─────────────

#[test]
fn test_priority_dispatch_order() {
    let host = host(1, 16);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));
    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel::<()>();

    // Occupy the single slot; the gate holds the pump.
    {
        let gate_rx = Arc::clone(&gate_rx);
        let done_tx = done_tx.clone();
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, _, _| {
                gate_rx.lock().unwrap().recv().unwrap();
                done_tx.send(()).unwrap();
            }),
            100,
        );
    }
    for priority in [1u64, 3, 2] {
        let order = Arc::clone(&order);
        let done_tx = done_tx.clone();
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, result, _| {
                result.unwrap();
                order.lock().unwrap().push(priority);
                done_tx.send(()).unwrap();
            }),
            priority,
        );
    }

    gate_tx.send(()).unwrap();
    for _ in 0..4 {
        done_rx.recv().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
}

#[test]
fn test_equal_priority_is_fifo() {
    let host = host(1, 16);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));
    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel::<()>();

    {
        let gate_rx = Arc::clone(&gate_rx);
        let done_tx = done_tx.clone();
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, _, _| {
                gate_rx.lock().unwrap().recv().unwrap();
                done_tx.send(()).unwrap();
            }),
            0,
        );
    }
    let mut submitted = Vec::new();
    for _ in 0..3 {
        let order = Arc::clone(&order);
        let done_tx = done_tx.clone();
        let id = host.run_network(
            "A",
            input_ctx(),
            Box::new(move |run_id, _, _| {
                order.lock().unwrap().push(run_id);
                done_tx.send(()).unwrap();
            }),
            7,
        );
        submitted.push(id);
    }

    gate_tx.send(()).unwrap();
    for _ in 0..4 {
        done_rx.recv().unwrap();
    }
    // Dispatch order equals submission order for identical priorities.
    assert_eq!(*order.lock().unwrap(), submitted);
}

// ── Scenario 4: removal barrier ────────────────────────────────

#[test]
fn test_remove_network_busy_then_succeeds() {
    let host = host(1, 16);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));
    let (done_tx, done_rx) = mpsc::channel::<()>();

    // One running (gated) plus one queued request keep the refcount up.
    {
        let gate_rx = Arc::clone(&gate_rx);
        let done_tx = done_tx.clone();
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, _, _| {
                gate_rx.lock().unwrap().recv().unwrap();
                done_tx.send(()).unwrap();
            }),
            0,
        );
    }
    {
        let done_tx = done_tx.clone();
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, _, _| {
                done_tx.send(()).unwrap();
            }),
            0,
        );
    }

    let err = host.remove_network("A").unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetBusy);

    gate_tx.send(()).unwrap();
    done_rx.recv().unwrap();
    done_rx.recv().unwrap();

    // All callbacks returned, so every refcount delta nets to zero.
    host.remove_network("A").unwrap();
    assert!(!host.network_added("A"));
}

#[test]
fn test_remove_unknown_is_noop() {
    let host = host(1, 4);
    host.remove_network("never-added").unwrap();
}

#[test]
fn test_add_remove_restores_memory_counters() {
    let host = host(2, 4);
    let before = host.stats().counter(stats::DEVICE_MEMORY_USED);

    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();
    assert!(host.stats().counter(stats::DEVICE_MEMORY_USED) > before);

    host.remove_network("A").unwrap();
    assert_eq!(host.stats().counter(stats::DEVICE_MEMORY_USED), before);
}

// ── Scenario 5: profile-mode precondition ──────────────────────

#[test]
fn test_profile_mode_requires_empty_host() {
    let host = host(2, 4);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let mut cctx = CompilationContext::default();
    cctx.precision.mode = PrecisionMode::Profile;
    let err = host
        .add_network(module_with(&["B"]), cctx)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Runtime);
    assert!(err.to_string().contains("profiling"));

    // The reservation was released; "B" can be added normally.
    host.add_network(module_with(&["B"]), CompilationContext::default())
        .unwrap();
}

#[test]
fn test_profile_mode_rebuilds_devices() {
    let host = host(2, 4);
    let mut cctx = CompilationContext::default();
    cctx.precision.mode = PrecisionMode::Profile;
    host.add_network(module_with(&["A"]), cctx).unwrap();

    // The network compiled onto the profiling backend.
    let dag = host.get_network_dag("A").unwrap();
    assert!(dag
        .nodes()
        .iter()
        .all(|n| n.backend_name == "interpreter"));

    // And it still runs.
    let mut bindings = PlaceholderBindings::new();
    bindings.insert(
        "in",
        Tensor::from_f32(Shape::vector(16), &[1.0; 16]).unwrap(),
    );
    host.run_network_blocking("A", &mut bindings).unwrap();
    assert!(bindings.get("out").is_some());
}

// ── Scenario 6: clear_host drains ──────────────────────────────

#[test]
fn test_clear_host_drains_and_zeroes() {
    let host = host(3, 16);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let completed = Arc::new(Mutex::new(0usize));
    for _ in 0..3 {
        let completed = Arc::clone(&completed);
        host.run_network(
            "A",
            input_ctx(),
            Box::new(move |_, _, _| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                *completed.lock().unwrap() += 1;
            }),
            0,
        );
    }

    host.clear_host().unwrap();

    // clear_host returned only after every callback fired.
    assert_eq!(*completed.lock().unwrap(), 3);
    assert!(!host.network_added("A"));
    assert_eq!(host.stats().counter(stats::DEVICE_MEMORY_USED), 0);
    assert_eq!(host.stats().counter(stats::DEVICE_MEMORY_AVAILABLE), 0);
    assert_eq!(host.stats().counter(stats::DEVICE_MEMORY_MAX), 0);
}

// ── Blocking wrappers ──────────────────────────────────────────

#[test]
fn test_run_network_blocking_restores_bindings() {
    let host = host(2, 4);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let mut bindings = PlaceholderBindings::new();
    bindings.insert(
        "in",
        Tensor::from_f32(Shape::vector(16), &[2.0; 16]).unwrap(),
    );
    host.run_network_blocking("A", &mut bindings).unwrap();

    // The caller's bindings came back, with the outputs filled in.
    assert!(bindings.get("in").is_some());
    assert!(bindings.get("out").is_some());
}

#[test]
fn test_run_network_blocking_ctx_roundtrip() {
    let host = host(2, 4);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    let mut ctx = input_ctx();
    host.run_network_blocking_ctx("A", &mut ctx).unwrap();
    assert!(ctx.bindings.get("out").is_some());
    assert!(ctx.trace.e2e_duration().is_some());
}

#[test]
fn test_blocking_unknown_network() {
    let host = host(2, 4);
    let mut bindings = PlaceholderBindings::new();
    let err = host
        .run_network_blocking("ghost", &mut bindings)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetNotFound);
}

// ── Multi-device partitioned execution ─────────────────────────

#[test]
fn test_split_network_spans_devices() {
    // Two small devices force the chain apart; the run must still
    // produce the declared output.
    let host = HostManager::new(
        vec![
            DeviceConfig::new("cpu", 24_000),
            DeviceConfig::new("cpu", 24_000),
        ],
        HostConfig {
            executor_threads: 2,
            max_active_requests: 2,
            max_queue_size: 8,
        },
        HostOptions::default(),
    )
    .unwrap();

    // 4 nodes of 1024-float activations: 4096 bytes each, context count 2
    // makes each node 8192 bytes, so at most two fit per partition.
    let mut module = Module::new();
    module
        .add_function(unary_chain_function("big", 4, 1024))
        .unwrap();
    host.add_network(module, CompilationContext::default()).unwrap();

    let dag = host.get_network_dag("big").unwrap();
    assert_eq!(dag.len(), 2, "expected the chain to split in two");
    assert!(dag
        .nodes()
        .iter()
        .all(|n| !n.device_runtime_infos.is_empty()));

    let mut bindings = PlaceholderBindings::new();
    bindings.insert(
        "in",
        Tensor::from_f32(Shape::vector(1024), &[0.25; 1024]).unwrap(),
    );
    host.run_network_blocking("big", &mut bindings).unwrap();
    assert!(bindings.get("out").is_some());
}

// ── Artifacts ──────────────────────────────────────────────────

#[test]
fn test_serialize_compiled_dag_artifact() {
    let host = host(2, 4);
    let mut module = Module::new();
    module
        .add_function(unary_chain_function("artifact_net", 2, 16))
        .unwrap();

    let mut cctx = CompilationContext::default();
    cctx.serialize_compiled_dag = true;
    host.add_network(module, cctx).unwrap();

    let path = std::path::Path::new("artifact_net.onnx");
    assert!(path.exists());
    let content = std::fs::read_to_string(path).unwrap();
    std::fs::remove_file(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["root"], "artifact_net");
}

// ── Device trace pass-through ──────────────────────────────────

#[test]
fn test_device_trace_roundtrip() {
    let host = host(2, 4);
    host.add_network(module_with(&["A"]), CompilationContext::default())
        .unwrap();

    host.start_device_trace().unwrap();
    let mut bindings = PlaceholderBindings::new();
    bindings.insert(
        "in",
        Tensor::from_f32(Shape::vector(16), &[1.0; 16]).unwrap(),
    );
    host.run_network_blocking("A", &mut bindings).unwrap();
    host.stop_device_trace().unwrap();
}
