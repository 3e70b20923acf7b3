// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The execution engine that fans inference tasks out across a pool of
//! worker executors and fans their results back in.
//!
//! The pipeline:
//! ```text
//! Session ──push──▶ TaskQueue ──pop──▶ Executor (×N) ──▶ Backend
//!    ▲                                      │
//!    └────────── completion callback ◀──────┘
//! ```
//!
//! A [`Session`] reads a [`SessionConfig`], resolves backends through the
//! [`Monitor`] registry, builds one [`TaskQueue`] and N [`Executor`]s,
//! spawns one OS thread per executor, and aggregates per-task outputs.
//! Coordination is mutexes and condition variables only — no async
//! runtime, no cancellation, no timeouts at this layer.

mod config;
mod error;
mod executor;
mod metrics;
mod monitor;
mod session;
mod task_queue;

pub use config::{SessionConfig, TensorConfig};
pub use error::RuntimeError;
pub use executor::Executor;
pub use metrics::{ExecutorMetrics, SessionMetrics};
pub use monitor::{BackendKind, Monitor};
pub use session::{PostprocessFn, PreprocessFn, Session, SessionOutput};
pub use task_queue::{Task, TaskQueue, TaskResult};
