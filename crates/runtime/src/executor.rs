// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Single-threaded worker loop that drives one backend stream.
//!
//! An executor owns one stream, loads one model, and drains the shared
//! task queue until it is closed. Per-task work is strictly sequential:
//! validate, stage input into device memory, run, read output back,
//! release both device buffers. The executor never decides when to stop;
//! the queue tells it.

use crate::{ExecutorMetrics, RuntimeError, Task, TaskQueue, TaskResult};
use backend::{Backend, DevicePtr, ModelId, StreamId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tensor_core::{DType, ModelInfo, Tensor};
use tracing::{debug, info, warn};

/// One worker bound to a backend, a shared queue, and a model path.
pub struct Executor {
    id: usize,
    backend: Arc<dyn Backend>,
    queue: Arc<TaskQueue>,
    model_path: PathBuf,
    output_dtype: DType,
}

impl Executor {
    /// Binds a worker to its backend, queue, and model.
    ///
    /// `output_dtype` is the element type host output tensors are
    /// decoded as; model descriptors report shapes only.
    pub fn new(
        id: usize,
        backend: Arc<dyn Backend>,
        queue: Arc<TaskQueue>,
        model_path: impl Into<PathBuf>,
        output_dtype: DType,
    ) -> Self {
        Self {
            id,
            backend,
            queue,
            model_path: model_path.into(),
            output_dtype,
        }
    }

    /// Runs the full worker lifecycle: create stream, load model, drain
    /// the queue, then tear down.
    ///
    /// Setup failures (stream creation, model load) are fatal for this
    /// executor. Per-task failures are delivered to that task's callback
    /// as `Err` and the loop keeps draining. Teardown (model unload and
    /// stream destruction) runs on every exit path after setup.
    pub fn execute(&self) -> Result<ExecutorMetrics, RuntimeError> {
        let stream = self.backend.create_stream()?;
        info!(
            executor = self.id,
            backend = self.backend.name(),
            %stream,
            "executor started"
        );

        let run = self.load_model().map(|(model, info)| {
            info!(
                executor = self.id,
                %model,
                path = %self.model_path.display(),
                "model ready"
            );
            self.drain(stream, model, &info)
        });

        let unload = self.backend.unload_model(&self.model_path);
        let destroy = self.backend.destroy_stream(stream);

        let metrics = run?;
        unload?;
        destroy?;
        info!(
            executor = self.id,
            completed = metrics.tasks_completed,
            failed = metrics.tasks_failed,
            "executor finished"
        );
        Ok(metrics)
    }

    fn load_model(&self) -> Result<(ModelId, Arc<ModelInfo>), RuntimeError> {
        let model = self.backend.load_model(&self.model_path)?;
        let info = self
            .backend
            .model_info(model)
            .ok_or(RuntimeError::MissingModelInfo(model))?;
        Ok((model, info))
    }

    fn drain(&self, stream: StreamId, model: ModelId, info: &ModelInfo) -> ExecutorMetrics {
        let mut metrics = ExecutorMetrics::default();
        let started = Instant::now();
        while let Some(task) = self.queue.pop() {
            let Task { inputs, callback } = task;
            let bytes_in: usize = inputs.iter().map(Tensor::size_bytes).sum();
            let result = self.run_task(&inputs, stream, model, info);
            callback(match result {
                Ok((outputs, infer_time)) => {
                    let bytes_out = outputs.iter().map(Tensor::size_bytes).sum();
                    metrics.record_completed(bytes_in, bytes_out, infer_time);
                    debug!(executor = self.id, bytes_in, bytes_out, "task complete");
                    Ok(outputs)
                }
                Err(err) => {
                    metrics.record_failed();
                    warn!(executor = self.id, %err, "task failed");
                    Err(err)
                }
            });
        }
        metrics.total_duration = started.elapsed();
        metrics
    }

    /// Runs one popped task end to end. Both device buffers are released
    /// on every path once allocated, including after a failed copy or
    /// inference.
    fn run_task(
        &self,
        inputs: &[Tensor],
        stream: StreamId,
        model: ModelId,
        info: &ModelInfo,
    ) -> Result<(Vec<Tensor>, std::time::Duration), RuntimeError> {
        self.validate(inputs, info)?;

        let in_bytes = info.batch_size() * info.input_size();
        let out_bytes = info.batch_size() * info.output_size();
        let dev_in = self.backend.alloc(in_bytes)?;
        let dev_out = match self.backend.alloc(out_bytes) {
            Ok(ptr) => ptr,
            Err(err) => {
                let _ = self.backend.free(dev_in);
                return Err(err.into());
            }
        };

        let result = self.run_on_device(inputs, stream, model, info, dev_in, dev_out);

        let free_in = self.backend.free(dev_in);
        let free_out = self.backend.free(dev_out);
        let outputs = result?;
        free_in?;
        free_out?;
        Ok(outputs)
    }

    fn run_on_device(
        &self,
        inputs: &[Tensor],
        stream: StreamId,
        model: ModelId,
        info: &ModelInfo,
        dev_in: DevicePtr,
        dev_out: DevicePtr,
    ) -> Result<(Vec<Tensor>, std::time::Duration), RuntimeError> {
        let mut offset = 0;
        for tensor in inputs {
            self.backend.copy_to_device(dev_in, offset, tensor.as_bytes())?;
            offset += tensor.size_bytes();
        }

        let infer_start = Instant::now();
        self.backend.infer(stream, model, dev_in, dev_out)?;
        let infer_time = infer_start.elapsed();

        let mut outputs = Vec::with_capacity(info.output_num());
        let mut offset = 0;
        for shape in info.outputs_shape() {
            let mut tensor = Tensor::zeros(shape.clone(), self.output_dtype);
            self.backend
                .copy_from_device(tensor.as_bytes_mut(), dev_out, offset)?;
            offset += tensor.size_bytes();
            outputs.push(tensor);
        }
        Ok((outputs, infer_time))
    }

    fn validate(&self, inputs: &[Tensor], info: &ModelInfo) -> Result<(), RuntimeError> {
        if inputs.len() != info.input_num() {
            return Err(RuntimeError::InputCountMismatch {
                expected: info.input_num(),
                actual: inputs.len(),
            });
        }
        let actual: usize = inputs.iter().map(Tensor::size_bytes).sum();
        let expected = info.batch_size() * info.input_size();
        if actual != expected {
            return Err(RuntimeError::InputSizeMismatch { expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::DummyBackend;
    use std::sync::Mutex;
    use tensor_core::Shape;

    fn five_floats(start: f32) -> Tensor {
        let values: Vec<f32> = (0..5).map(|i| start + i as f32).collect();
        Tensor::from_f32(Shape::matrix(1, 5), &values).unwrap()
    }

    fn collecting_task(tensor: Tensor, sink: Arc<Mutex<Vec<TaskResult>>>) -> Task {
        Task::new(vec![tensor], move |result| {
            sink.lock().unwrap().push(result);
        })
    }

    #[test]
    fn test_happy_path_adds_one() {
        let backend = Arc::new(DummyBackend::new());
        backend.init().unwrap();
        let queue = Arc::new(TaskQueue::new());
        let sink = Arc::new(Mutex::new(Vec::new()));
        queue.push(collecting_task(five_floats(0.0), Arc::clone(&sink)));
        queue.shutdown();

        let executor = Executor::new(
            0,
            Arc::clone(&backend) as Arc<dyn Backend>,
            queue,
            "model.bin",
            DType::F32,
        );
        let metrics = executor.execute().unwrap();
        assert_eq!(metrics.tasks_completed, 1);
        assert_eq!(metrics.tasks_failed, 0);

        let results = sink.lock().unwrap();
        let outputs = results[0].as_ref().unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(
            outputs[0].to_f32_vec().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn test_malformed_task_does_not_stop_the_drain() {
        let backend = Arc::new(DummyBackend::new());
        backend.init().unwrap();
        let queue = Arc::new(TaskQueue::new());
        let sink = Arc::new(Mutex::new(Vec::new()));

        // Wrong byte length, then a valid task behind it.
        let bad = Tensor::from_f32(Shape::vector(3), &[0.0, 0.0, 0.0]).unwrap();
        queue.push(collecting_task(bad, Arc::clone(&sink)));
        queue.push(collecting_task(five_floats(10.0), Arc::clone(&sink)));
        queue.shutdown();

        let executor = Executor::new(
            0,
            Arc::clone(&backend) as Arc<dyn Backend>,
            queue,
            "model.bin",
            DType::F32,
        );
        let metrics = executor.execute().unwrap();
        assert_eq!(metrics.tasks_failed, 1);
        assert_eq!(metrics.tasks_completed, 1);

        let results = sink.lock().unwrap();
        assert!(matches!(
            results[0],
            Err(RuntimeError::InputSizeMismatch {
                expected: 20,
                actual: 12
            })
        ));
        assert_eq!(
            results[1].as_ref().unwrap()[0].to_f32_vec().unwrap(),
            vec![11.0, 12.0, 13.0, 14.0, 15.0]
        );
    }

    #[test]
    fn test_wrong_tensor_count_reported() {
        let backend = Arc::new(DummyBackend::new());
        backend.init().unwrap();
        let queue = Arc::new(TaskQueue::new());
        let sink = Arc::new(Mutex::new(Vec::new()));
        queue.push(Task::new(Vec::new(), {
            let sink = Arc::clone(&sink);
            move |result| sink.lock().unwrap().push(result)
        }));
        queue.shutdown();

        let executor = Executor::new(
            0,
            Arc::clone(&backend) as Arc<dyn Backend>,
            queue,
            "model.bin",
            DType::F32,
        );
        executor.execute().unwrap();
        let results = sink.lock().unwrap();
        assert!(matches!(
            results[0],
            Err(RuntimeError::InputCountMismatch {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_no_device_leak_across_failures() {
        let backend = Arc::new(DummyBackend::new());
        backend.init().unwrap();
        let queue = Arc::new(TaskQueue::new());
        let sink = Arc::new(Mutex::new(Vec::new()));
        queue.push(collecting_task(five_floats(0.0), Arc::clone(&sink)));
        queue.push(collecting_task(
            Tensor::from_f32(Shape::vector(2), &[0.0, 0.0]).unwrap(),
            Arc::clone(&sink),
        ));
        queue.push(collecting_task(five_floats(1.0), Arc::clone(&sink)));
        queue.shutdown();

        let executor = Executor::new(
            0,
            Arc::clone(&backend) as Arc<dyn Backend>,
            queue,
            "model.bin",
            DType::F32,
        );
        executor.execute().unwrap();

        let stats = backend.stats();
        assert_eq!(stats.allocs, stats.frees);
        assert_eq!(stats.live, 0);
    }

    #[test]
    fn test_teardown_unloads_model() {
        let backend = Arc::new(DummyBackend::new());
        backend.init().unwrap();
        let queue = Arc::new(TaskQueue::new());
        queue.shutdown();

        let executor = Executor::new(
            0,
            Arc::clone(&backend) as Arc<dyn Backend>,
            queue,
            "model.bin",
            DType::F32,
        );
        executor.execute().unwrap();

        // Path no longer cached: a fresh load issues a new id.
        let id = backend.load_model(std::path::Path::new("model.bin")).unwrap();
        assert!(backend.model_info(id).is_some());
    }
}
