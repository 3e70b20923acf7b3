// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for session throughput on the host-memory backend.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use runtime::{Monitor, PreprocessFn, Session, SessionConfig};
use std::sync::Arc;

fn config(num_executor: usize, num_task: usize) -> SessionConfig {
    SessionConfig::from_toml(&format!(
        r#"
        model_path = "add_one.bin"
        num_executor = {num_executor}
        num_task = {num_task}
        devices = ["dummy"]

        [[inputs]]
        shape = [1, 5]
        dtype = "float32"

        [[outputs]]
        shape = [1, 5]
        dtype = "float32"
    "#
    ))
    .unwrap()
}

fn preprocess() -> PreprocessFn {
    Box::new(|index| {
        (0..5)
            .flat_map(|_| (index as f32).to_le_bytes())
            .collect()
    })
}

fn bench_session_throughput(c: &mut Criterion) {
    let monitor = Arc::new(Monitor::new());
    let mut group = c.benchmark_group("dummy_session");
    for executors in [1, 2, 4] {
        group.bench_with_input(
            BenchmarkId::new("executors", executors),
            &executors,
            |b, &executors| {
                b.iter(|| {
                    let session =
                        Session::new(config(executors, 32), Arc::clone(&monitor)).unwrap();
                    session.run(preprocess(), None).unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_single_task_latency(c: &mut Criterion) {
    let monitor = Arc::new(Monitor::new());
    c.bench_function("single_task", |b| {
        b.iter(|| {
            let session = Session::new(config(1, 1), Arc::clone(&monitor)).unwrap();
            session.run(preprocess(), None).unwrap()
        });
    });
}

criterion_group!(benches, bench_session_throughput, bench_single_task_latency);
criterion_main!(benches);
