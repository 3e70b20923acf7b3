// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Thread-safe FIFO work distribution with shutdown semantics.

use crate::RuntimeError;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex};
use tensor_core::Tensor;
use tracing::info;

/// Outcome delivered to a task's completion callback: the output tensors
/// in declared output order, or the failure that stopped this task.
pub type TaskResult = Result<Vec<Tensor>, RuntimeError>;

/// One unit of inference work: input tensors plus a completion callback.
///
/// A task is consumed exactly once by exactly one executor; the callback
/// takes ownership of the outputs (or the task's failure) and runs on
/// the executor's thread.
pub struct Task {
    /// Input tensors, in the model's input order.
    pub inputs: Vec<Tensor>,
    /// Completion callback. Always invoked exactly once per popped task,
    /// on success and on per-task failure alike.
    pub callback: Box<dyn FnOnce(TaskResult) + Send>,
}

impl Task {
    /// Creates a task from inputs and a completion callback.
    pub fn new(
        inputs: Vec<Tensor>,
        callback: impl FnOnce(TaskResult) + Send + 'static,
    ) -> Self {
        Self {
            inputs,
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("inputs", &self.inputs.len())
            .finish()
    }
}

struct QueueState {
    items: VecDeque<Task>,
    shutdown: bool,
}

/// A mutex + condvar FIFO shared between one producer (the session) and
/// N consumer executor threads.
///
/// `pop` blocks until an item is available or the queue has been shut
/// down, and keeps handing out remaining items after shutdown — it
/// returns `None` only when the queue is shut down **and** empty.
/// There is no priority, no peeking, and no re-queue on failure.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Enqueues a task and wakes one waiting consumer.
    pub fn push(&self, task: Task) {
        self.lock_state().items.push_back(task);
        self.available.notify_one();
    }

    /// Blocks until a task is available or the queue is closed.
    ///
    /// Returns `None` only when [`shutdown`](TaskQueue::shutdown) has
    /// been called and every queued task has already been handed out.
    pub fn pop(&self) -> Option<Task> {
        let mut state = self.lock_state();
        loop {
            if let Some(task) = state.items.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                info!("task queue drained and closed");
                return None;
            }
            state = match self.available.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Closes the queue and wakes every blocked consumer. Idempotent.
    ///
    /// Must not be called while producers still have tasks to push:
    /// closure is the only way `pop` reports completion to the
    /// executors.
    pub fn shutdown(&self) {
        self.lock_state().shutdown = true;
        self.available.notify_all();
    }

    /// Returns the number of tasks currently queued.
    pub fn len(&self) -> usize {
        self.lock_state().items.len()
    }

    /// Returns `true` if no tasks are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn noop_task(tag: usize) -> Task {
        let _ = tag;
        Task::new(Vec::new(), |_| {})
    }

    #[test]
    fn test_push_pop_fifo() {
        let q = TaskQueue::new();
        for i in 0..3 {
            let t = Task::new(
                vec![tensor_core::Tensor::zeros(
                    tensor_core::Shape::vector(i + 1),
                    tensor_core::DType::U8,
                )],
                |_| {},
            );
            q.push(t);
        }
        assert_eq!(q.len(), 3);
        for i in 0..3 {
            let t = q.pop().unwrap();
            assert_eq!(t.inputs[0].size_bytes(), i + 1);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_property() {
        // N pushes then shutdown: exactly N pops succeed, the (N+1)th
        // reports closure.
        let q = TaskQueue::new();
        let n = 5;
        for i in 0..n {
            q.push(noop_task(i));
        }
        q.shutdown();
        for _ in 0..n {
            assert!(q.pop().is_some());
        }
        assert!(q.pop().is_none());
        assert!(q.pop().is_none()); // stays closed
    }

    #[test]
    fn test_shutdown_idempotent() {
        let q = TaskQueue::new();
        q.shutdown();
        q.shutdown();
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let q = Arc::new(TaskQueue::new());
        let q2 = Arc::clone(&q);
        let handle = std::thread::spawn(move || q2.pop().is_some());
        std::thread::sleep(Duration::from_millis(50));
        q.push(noop_task(0));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_shutdown_wakes_all_blocked_consumers() {
        let q = Arc::new(TaskQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            handles.push(std::thread::spawn(move || q.pop().is_none()));
        }
        std::thread::sleep(Duration::from_millis(50));
        q.shutdown();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }

    #[test]
    fn test_concurrent_consumers_each_task_once() {
        let q = Arc::new(TaskQueue::new());
        let popped = Arc::new(AtomicUsize::new(0));
        let n = 100;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            let popped = Arc::clone(&popped);
            handles.push(std::thread::spawn(move || {
                while q.pop().is_some() {
                    popped.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for i in 0..n {
            q.push(noop_task(i));
        }
        q.shutdown();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(popped.load(Ordering::SeqCst), n);
    }
}
