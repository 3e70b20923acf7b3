// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Top-level orchestration: configuration in, aggregated results out.
//!
//! A session resolves backends through the [`Monitor`], builds one
//! [`TaskQueue`] and N [`Executor`]s, turns each logical request into a
//! [`Task`] via the caller's preprocessing function, and runs one OS
//! thread per executor until the queue drains. The last completion
//! callback closes the queue; the session just joins the threads and
//! hands back what accumulated.

use crate::{
    Executor, Monitor, RuntimeError, SessionConfig, SessionMetrics, Task, TaskQueue,
};
use backend::Backend;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tensor_core::{DType, Shape, Tensor};
use tracing::{info, warn};

/// Turns one logical request (by task index) into raw model input bytes.
pub type PreprocessFn = Box<dyn Fn(usize) -> Vec<u8> + Send + Sync>;

/// Consumes one task's decoded output vectors as they complete. Runs on
/// executor threads; must not block for long.
pub type PostprocessFn = Box<dyn Fn(&[Vec<f32>]) + Send + Sync>;

/// Everything a finished run produced.
pub struct SessionOutput {
    /// Decoded outputs of successful tasks, one entry per task, each
    /// holding one `Vec<f32>` per declared model output. Entries appear
    /// in completion order; with a single executor that equals
    /// submission order.
    pub results: Vec<Vec<Vec<f32>>>,
    /// Failures of tasks whose callback received an error, in completion
    /// order.
    pub failures: Vec<RuntimeError>,
    /// Merged per-executor and wall-clock metrics.
    pub metrics: SessionMetrics,
}

/// One configured inference run over a pool of executors.
pub struct Session {
    config: SessionConfig,
    monitor: Arc<Monitor>,
}

impl Session {
    /// Creates a session from a validated configuration and a backend
    /// registry.
    pub fn new(config: SessionConfig, monitor: Arc<Monitor>) -> Result<Self, RuntimeError> {
        config.validate()?;
        if config.inputs.is_empty() {
            return Err(RuntimeError::Config(
                "at least one input tensor must be declared".into(),
            ));
        }
        Ok(Self { config, monitor })
    }

    /// Runs the whole workload to completion and returns the aggregated
    /// outputs.
    ///
    /// `preprocess` is called once per task, on the calling thread,
    /// before any executor starts. `postprocess`, when given, is called
    /// once per successful task on the completing executor's thread.
    pub fn run(
        &self,
        preprocess: PreprocessFn,
        postprocess: Option<PostprocessFn>,
    ) -> Result<SessionOutput, RuntimeError> {
        let started = Instant::now();
        let num_task = self.config.num_task;
        let num_executor = self.config.num_executor;
        info!(num_task, num_executor, "session starting");

        let backends = self.resolve_backends()?;
        let queue = Arc::new(TaskQueue::new());
        let results = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let outstanding = Arc::new(AtomicUsize::new(num_task));
        let postprocess = Arc::new(postprocess);

        if num_task == 0 {
            // Nothing outstanding: close immediately so executors wind
            // down as soon as they start.
            queue.shutdown();
        }
        for index in 0..num_task {
            let inputs = self.build_inputs(index, &preprocess)?;
            queue.push(self.build_task(
                inputs,
                Arc::clone(&queue),
                Arc::clone(&results),
                Arc::clone(&failures),
                Arc::clone(&outstanding),
                Arc::clone(&postprocess),
            ));
        }

        let executor_metrics = self.run_executors(backends, &queue)?;

        let results = lock_collected(&results);
        let failures = lock_collected(&failures);
        let metrics = SessionMetrics::new(executor_metrics, started.elapsed());
        info!("{}", metrics.summary());
        Ok(SessionOutput {
            results,
            failures,
            metrics,
        })
    }

    fn resolve_backends(&self) -> Result<Vec<Arc<dyn Backend>>, RuntimeError> {
        (0..self.config.num_executor)
            .map(|i| {
                let kind = self.config.device_for(i).parse()?;
                self.monitor.backend(kind)
            })
            .collect()
    }

    /// Splits one preprocessed byte sequence across the declared input
    /// tensors, in declaration order.
    fn build_inputs(
        &self,
        index: usize,
        preprocess: &PreprocessFn,
    ) -> Result<Vec<Tensor>, RuntimeError> {
        let bytes = preprocess(index);
        let expected: usize = self.config.inputs.iter().map(|t| t.size_bytes()).sum();
        if bytes.len() != expected {
            return Err(RuntimeError::InputSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut inputs = Vec::with_capacity(self.config.inputs.len());
        let mut offset = 0;
        for tensor_cfg in &self.config.inputs {
            let end = offset + tensor_cfg.size_bytes();
            inputs.push(Tensor::from_bytes(
                Shape::new(tensor_cfg.shape.clone()),
                tensor_cfg.dtype,
                bytes[offset..end].to_vec(),
            )?);
            offset = end;
        }
        Ok(inputs)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_task(
        &self,
        inputs: Vec<Tensor>,
        queue: Arc<TaskQueue>,
        results: Arc<Mutex<Vec<Vec<Vec<f32>>>>>,
        failures: Arc<Mutex<Vec<RuntimeError>>>,
        outstanding: Arc<AtomicUsize>,
        postprocess: Arc<Option<PostprocessFn>>,
    ) -> Task {
        Task::new(inputs, move |result| {
            match result.and_then(decode_outputs) {
                Ok(decoded) => {
                    if let Some(post) = postprocess.as_ref() {
                        post(&decoded);
                    }
                    lock_sink(&results).push(decoded);
                }
                Err(err) => {
                    warn!(%err, "task completed with error");
                    lock_sink(&failures).push(err);
                }
            }
            // Last callback out closes the queue.
            if outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
                queue.shutdown();
            }
        })
    }

    fn run_executors(
        &self,
        backends: Vec<Arc<dyn Backend>>,
        queue: &Arc<TaskQueue>,
    ) -> Result<Vec<crate::ExecutorMetrics>, RuntimeError> {
        let output_dtype = self
            .config
            .outputs
            .first()
            .map(|t| t.dtype)
            .unwrap_or(DType::F32);

        let mut handles = Vec::with_capacity(backends.len());
        for (id, backend) in backends.into_iter().enumerate() {
            let executor = Executor::new(
                id,
                backend,
                Arc::clone(queue),
                self.config.model_path.clone(),
                output_dtype,
            );
            let handle = std::thread::Builder::new()
                .name(format!("executor-{id}"))
                .spawn(move || executor.execute())
                .map_err(|e| RuntimeError::Config(format!("failed to spawn executor {id}: {e}")))?;
            handles.push(handle);
        }

        let mut metrics = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(m)) => metrics.push(m),
                Ok(Err(err)) => {
                    warn!(executor = id, %err, "executor failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Err(_) => {
                    warn!(executor = id, "executor thread panicked");
                    if first_error.is_none() {
                        first_error =
                            Some(RuntimeError::Config(format!("executor {id} panicked")));
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(metrics),
        }
    }
}

fn decode_outputs(outputs: Vec<Tensor>) -> Result<Vec<Vec<f32>>, RuntimeError> {
    outputs
        .iter()
        .map(|t| t.to_f32_vec().map_err(RuntimeError::from))
        .collect()
}

fn lock_sink<T>(sink: &Mutex<Vec<T>>) -> std::sync::MutexGuard<'_, Vec<T>> {
    match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock_collected<T>(sink: &Arc<Mutex<Vec<T>>>) -> Vec<T> {
    std::mem::take(&mut *lock_sink(sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TensorConfig;
    use std::path::PathBuf;

    fn dummy_config(num_executor: usize, num_task: usize) -> SessionConfig {
        SessionConfig {
            model_path: PathBuf::from("model.bin"),
            num_executor,
            num_task,
            devices: vec!["dummy".to_string()],
            inputs: vec![TensorConfig {
                name: Some("x".to_string()),
                shape: vec![1, 5],
                dtype: DType::F32,
            }],
            outputs: vec![TensorConfig {
                name: None,
                shape: vec![1, 5],
                dtype: DType::F32,
            }],
        }
    }

    fn index_preprocess() -> PreprocessFn {
        // Task i produces five f32 elements all equal to i.
        Box::new(|index| {
            (0..5)
                .flat_map(|_| (index as f32).to_le_bytes())
                .collect()
        })
    }

    #[test]
    fn test_single_executor_preserves_submission_order() {
        let session = Session::new(dummy_config(1, 3), Arc::new(Monitor::new())).unwrap();
        let output = session.run(index_preprocess(), None).unwrap();

        assert!(output.failures.is_empty());
        assert_eq!(output.results.len(), 3);
        for (i, task_outputs) in output.results.iter().enumerate() {
            assert_eq!(task_outputs[0], vec![i as f32 + 1.0; 5]);
        }
        assert_eq!(output.metrics.tasks_completed(), 3);
    }

    #[test]
    fn test_multiple_executors_produce_the_full_set() {
        let n = 16;
        let session = Session::new(dummy_config(4, n), Arc::new(Monitor::new())).unwrap();
        let output = session.run(index_preprocess(), None).unwrap();

        assert_eq!(output.results.len(), n);
        let mut firsts: Vec<f32> = output.results.iter().map(|t| t[0][0]).collect();
        firsts.sort_by(f32::total_cmp);
        let expected: Vec<f32> = (0..n).map(|i| i as f32 + 1.0).collect();
        assert_eq!(firsts, expected);
    }

    #[test]
    fn test_zero_tasks_terminates_promptly() {
        let session = Session::new(dummy_config(2, 0), Arc::new(Monitor::new())).unwrap();
        let output = session.run(index_preprocess(), None).unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.metrics.executors.len(), 2);
    }

    #[test]
    fn test_postprocess_sees_every_successful_task() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_callback = Arc::clone(&seen);
        let session = Session::new(dummy_config(2, 5), Arc::new(Monitor::new())).unwrap();
        let output = session
            .run(
                index_preprocess(),
                Some(Box::new(move |decoded| {
                    assert_eq!(decoded.len(), 1);
                    seen_in_callback.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(output.results.len(), 5);
    }

    #[test]
    fn test_preprocess_size_mismatch_rejected() {
        let session = Session::new(dummy_config(1, 1), Arc::new(Monitor::new())).unwrap();
        let result = session.run(Box::new(|_| vec![0u8; 3]), None);
        assert!(matches!(
            result,
            Err(RuntimeError::InputSizeMismatch {
                expected: 20,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_undeclared_inputs_rejected_at_construction() {
        let mut config = dummy_config(1, 1);
        config.inputs.clear();
        assert!(matches!(
            Session::new(config, Arc::new(Monitor::new())),
            Err(RuntimeError::Config(_))
        ));
    }
}
