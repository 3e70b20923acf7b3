// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end session pipeline.
//!
//! These tests exercise the complete flow from TOML configuration →
//! backend resolution → task fan-out → executor drain → result
//! aggregation, across all three crates.

use runtime::{
    BackendKind, Monitor, PreprocessFn, RuntimeError, Session, SessionConfig,
};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn config(num_executor: usize, num_task: usize) -> SessionConfig {
    let toml = format!(
        r#"
        model_path = "add_one.bin"
        num_executor = {num_executor}
        num_task = {num_task}
        devices = ["dummy"]

        [[inputs]]
        name = "x"
        shape = [1, 5]
        dtype = "float32"

        [[outputs]]
        shape = [1, 5]
        dtype = "float32"
    "#
    );
    SessionConfig::from_toml(&toml).unwrap()
}

/// Task `i` becomes five little-endian f32 elements all equal to `i`.
fn index_preprocess() -> PreprocessFn {
    Box::new(|index| {
        (0..5)
            .flat_map(|_| (index as f32).to_le_bytes())
            .collect()
    })
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_end_to_end_single_executor_ordered() {
    let session = Session::new(config(1, 3), Arc::new(Monitor::new())).unwrap();
    let output = session.run(index_preprocess(), None).unwrap();

    assert!(output.failures.is_empty());
    let expected: Vec<Vec<Vec<f32>>> = (0..3)
        .map(|i| vec![vec![i as f32 + 1.0; 5]])
        .collect();
    assert_eq!(output.results, expected);
}

#[test]
fn test_end_to_end_many_executors_full_set() {
    let n = 64;
    let session = Session::new(config(4, n), Arc::new(Monitor::new())).unwrap();
    let output = session.run(index_preprocess(), None).unwrap();

    assert!(output.failures.is_empty());
    assert_eq!(output.results.len(), n);
    assert_eq!(output.metrics.tasks_completed(), n);
    assert_eq!(output.metrics.executors.len(), 4);

    let mut firsts: Vec<f32> = output.results.iter().map(|t| t[0][0]).collect();
    firsts.sort_by(f32::total_cmp);
    let expected: Vec<f32> = (0..n).map(|i| i as f32 + 1.0).collect();
    assert_eq!(firsts, expected);
}

#[test]
fn test_zero_tasks_terminate_without_deadlock() {
    let session = Session::new(config(3, 0), Arc::new(Monitor::new())).unwrap();
    let output = session.run(index_preprocess(), None).unwrap();
    assert!(output.results.is_empty());
    assert!(output.failures.is_empty());
    assert_eq!(output.metrics.executors.len(), 3);
    assert_eq!(output.metrics.tasks_completed(), 0);
}

#[test]
fn test_sessions_share_one_backend_through_the_registry() {
    let monitor = Arc::new(Monitor::new());
    let backend_before = monitor.backend(BackendKind::Dummy).unwrap();

    for _ in 0..2 {
        let session = Session::new(config(2, 4), Arc::clone(&monitor)).unwrap();
        let output = session.run(index_preprocess(), None).unwrap();
        assert_eq!(output.results.len(), 4);
    }

    let backend_after = monitor.backend(BackendKind::Dummy).unwrap();
    assert!(Arc::ptr_eq(&backend_before, &backend_after));
}

#[test]
fn test_device_per_executor_config() {
    let mut cfg = config(2, 4);
    cfg.devices = vec!["dummy".to_string(), "dummy".to_string()];
    let session = Session::new(cfg, Arc::new(Monitor::new())).unwrap();
    let output = session.run(index_preprocess(), None).unwrap();
    assert_eq!(output.results.len(), 4);
}

#[test]
fn test_bad_preprocess_is_reported_not_swallowed() {
    let session = Session::new(config(1, 2), Arc::new(Monitor::new())).unwrap();
    let result = session.run(Box::new(|_| vec![0u8; 7]), None);
    assert!(matches!(
        result,
        Err(RuntimeError::InputSizeMismatch {
            expected: 20,
            actual: 7
        })
    ));
}
