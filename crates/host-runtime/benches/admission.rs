// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks the submit/dispatch/complete hot path.

use criterion::{criterion_group, criterion_main, Criterion};
use device_manager::DeviceConfig;
use graph_ir::{
    CompilationContext, Function, Module, Node, NodeKind, Placeholder, PlaceholderBindings,
};
use host_runtime::HostManager;
use tensor_core::{ElemKind, Shape, Tensor, Type};

fn float_ty(dims: Vec<usize>) -> Type {
    Type::new(ElemKind::Float, Shape::new(dims))
}

fn bench_module() -> Module {
    let mut module = Module::new();
    module
        .add_function(Function {
            name: "bench".into(),
            inputs: vec![Placeholder {
                name: "in".into(),
                ty: float_ty(vec![64]),
            }],
            outputs: vec![Placeholder {
                name: "out".into(),
                ty: float_ty(vec![64]),
            }],
            output_nodes: vec!["act".into()],
            nodes: vec![Node {
                name: "act".into(),
                kind: NodeKind::Tanh,
                inputs: vec!["in".into()],
                input_tys: vec![float_ty(vec![64])],
                output_tys: vec![float_ty(vec![64])],
            }],
        })
        .unwrap();
    module
}

fn bench_dispatch(c: &mut Criterion) {
    let host =
        HostManager::with_defaults(vec![DeviceConfig::new("cpu", 64 << 20)]).unwrap();
    host.add_network(bench_module(), CompilationContext::default())
        .unwrap();

    c.bench_function("run_network_blocking", |b| {
        b.iter(|| {
            let mut bindings = PlaceholderBindings::new();
            bindings.insert(
                "in",
                Tensor::from_f32(Shape::vector(64), &[1.0; 64]).unwrap(),
            );
            host.run_network_blocking("bench", &mut bindings).unwrap();
        })
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
