// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-run profiling metrics.
//!
//! [`ExecutorMetrics`] accumulates on a single executor thread while it
//! drains the queue; [`SessionMetrics`] merges them after the threads
//! join.

use std::time::Duration;

/// Counters and timings for one executor's drain of the task queue.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorMetrics {
    /// Tasks that ran to completion and delivered outputs.
    pub tasks_completed: usize,
    /// Tasks whose callback received an error.
    pub tasks_failed: usize,
    /// Bytes copied host to device across all tasks.
    pub bytes_in: usize,
    /// Bytes copied device to host across all tasks.
    pub bytes_out: usize,
    /// Wall-clock time spent inside backend inference calls.
    pub infer_duration: Duration,
    /// Wall-clock time from first pop to queue closure.
    pub total_duration: Duration,
}

impl ExecutorMetrics {
    /// Records a successful task.
    pub fn record_completed(&mut self, bytes_in: usize, bytes_out: usize, infer: Duration) {
        self.tasks_completed += 1;
        self.bytes_in += bytes_in;
        self.bytes_out += bytes_out;
        self.infer_duration += infer;
    }

    /// Records a task that failed before delivering outputs.
    pub fn record_failed(&mut self) {
        self.tasks_failed += 1;
    }

    /// Total tasks this executor popped from the queue.
    pub fn tasks_total(&self) -> usize {
        self.tasks_completed + self.tasks_failed
    }
}

/// Aggregate view over every executor in a session run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SessionMetrics {
    /// Per-executor metrics, indexed by executor id.
    pub executors: Vec<ExecutorMetrics>,
    /// Wall-clock time for the whole run, submission through join.
    pub total_duration: Duration,
}

impl SessionMetrics {
    /// Merges per-executor metrics and the overall wall-clock time.
    pub fn new(executors: Vec<ExecutorMetrics>, total: Duration) -> Self {
        Self {
            executors,
            total_duration: total,
        }
    }

    /// Tasks completed across all executors.
    pub fn tasks_completed(&self) -> usize {
        self.executors.iter().map(|e| e.tasks_completed).sum()
    }

    /// Tasks failed across all executors.
    pub fn tasks_failed(&self) -> usize {
        self.executors.iter().map(|e| e.tasks_failed).sum()
    }

    /// Completed tasks per second over the whole run.
    pub fn tasks_per_second(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs <= 0.0 || self.tasks_completed() == 0 {
            return 0.0;
        }
        self.tasks_completed() as f64 / secs
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let bytes_in: usize = self.executors.iter().map(|e| e.bytes_in).sum();
        let bytes_out: usize = self.executors.iter().map(|e| e.bytes_out).sum();
        format!(
            "Run: {:.2}ms total, {} tasks completed, {} failed, \
             {} executors, {} B in / {} B out ({:.1} tasks/s)",
            self.total_duration.as_secs_f64() * 1000.0,
            self.tasks_completed(),
            self.tasks_failed(),
            self.executors.len(),
            bytes_in,
            bytes_out,
            self.tasks_per_second(),
        )
    }
}
