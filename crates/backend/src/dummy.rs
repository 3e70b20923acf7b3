// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host-memory backend with a fixed trivial model.
//!
//! `DummyBackend` exercises the whole engine control flow — allocation,
//! copies, model cache, streams, events — without hardware. Its single
//! model takes one `[1, 5]` f32 tensor and produces one `[1, 5]` f32
//! tensor where every element is the input plus one. Because everything
//! runs on the calling thread, stream and event operations reduce to
//! table-validity checks.

use crate::{Backend, BackendError, DevicePtr, EventId, ModelId, StreamId};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tensor_core::{ModelInfo, Shape};
use tracing::{debug, info};

/// Byte length of the dummy model's input and of its output (5 × f32).
const DUMMY_IO_BYTES: usize = 20;

#[derive(Default)]
struct DummyState {
    next_ptr: u64,
    allocs: HashMap<u64, Vec<u8>>,
    next_model: u32,
    path_to_id: HashMap<PathBuf, ModelId>,
    infos: HashMap<u32, Arc<ModelInfo>>,
    next_stream: u32,
    streams: HashSet<u32>,
    next_event: u32,
    events: HashSet<u32>,
}

/// Allocation counters for leak assertions in tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyStats {
    /// Total `alloc` calls that succeeded.
    pub allocs: u64,
    /// Total `free` calls that succeeded.
    pub frees: u64,
    /// Allocations currently live.
    pub live: usize,
}

/// In-process backend backed by host memory.
pub struct DummyBackend {
    state: Mutex<DummyState>,
    initialized: AtomicBool,
    allocs_total: AtomicU64,
    frees_total: AtomicU64,
}

impl DummyBackend {
    /// Creates an uninitialised dummy backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DummyState::default()),
            initialized: AtomicBool::new(false),
            allocs_total: AtomicU64::new(0),
            frees_total: AtomicU64::new(0),
        }
    }

    /// Returns a snapshot of the allocation counters.
    pub fn stats(&self) -> DummyStats {
        let live = self.lock_state().allocs.len();
        DummyStats {
            allocs: self.allocs_total.load(Ordering::Acquire),
            frees: self.frees_total.load(Ordering::Acquire),
            live,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DummyState> {
        // Lock poisoning only happens if another thread panicked while
        // holding the lock; the state itself is still consistent enough
        // for the host-memory tables.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Builds the fixed descriptor the dummy "hardware" reports for any
    /// model path.
    fn load_descriptor() -> Result<ModelInfo, BackendError> {
        Ok(ModelInfo::new(
            1,
            DUMMY_IO_BYTES,
            DUMMY_IO_BYTES,
            vec![Shape::matrix(1, 5)],
            vec![Shape::matrix(1, 5)],
        )?)
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn init(&self) -> Result<(), BackendError> {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!(backend = self.name(), "backend initialised");
        }
        Ok(())
    }

    fn finalize(&self) -> Result<(), BackendError> {
        self.initialized.store(false, Ordering::Release);
        info!(backend = self.name(), "backend finalised");
        Ok(())
    }

    fn alloc(&self, size: usize) -> Result<DevicePtr, BackendError> {
        if size == 0 {
            return Err(BackendError::ZeroSizedAllocation);
        }
        let mut state = self.lock_state();
        state.next_ptr += 1;
        let raw = state.next_ptr;
        state.allocs.insert(raw, vec![0u8; size]);
        drop(state);
        self.allocs_total.fetch_add(1, Ordering::AcqRel);
        debug!(ptr = raw, size, "dummy alloc");
        Ok(DevicePtr::from_raw(raw))
    }

    fn free(&self, ptr: DevicePtr) -> Result<(), BackendError> {
        let mut state = self.lock_state();
        if state.allocs.remove(&ptr.raw()).is_none() {
            return Err(BackendError::UnknownDevicePtr(ptr));
        }
        drop(state);
        self.frees_total.fetch_add(1, Ordering::AcqRel);
        debug!(ptr = ptr.raw(), "dummy free");
        Ok(())
    }

    fn copy_to_device(
        &self,
        ptr: DevicePtr,
        offset: usize,
        src: &[u8],
    ) -> Result<(), BackendError> {
        let mut state = self.lock_state();
        let buf = state
            .allocs
            .get_mut(&ptr.raw())
            .ok_or(BackendError::UnknownDevicePtr(ptr))?;
        let end = offset
            .checked_add(src.len())
            .filter(|&end| end <= buf.len())
            .ok_or(BackendError::CopyOutOfBounds {
                ptr,
                offset,
                len: src.len(),
                alloc_len: buf.len(),
            })?;
        buf[offset..end].copy_from_slice(src);
        Ok(())
    }

    fn copy_from_device(
        &self,
        dst: &mut [u8],
        ptr: DevicePtr,
        offset: usize,
    ) -> Result<(), BackendError> {
        let state = self.lock_state();
        let buf = state
            .allocs
            .get(&ptr.raw())
            .ok_or(BackendError::UnknownDevicePtr(ptr))?;
        let end = offset
            .checked_add(dst.len())
            .filter(|&end| end <= buf.len())
            .ok_or(BackendError::CopyOutOfBounds {
                ptr,
                offset,
                len: dst.len(),
                alloc_len: buf.len(),
            })?;
        dst.copy_from_slice(&buf[offset..end]);
        Ok(())
    }

    fn load_model(&self, path: &Path) -> Result<ModelId, BackendError> {
        // Fast path: already loaded.
        {
            let state = self.lock_state();
            if let Some(&id) = state.path_to_id.get(path) {
                return Ok(id);
            }
        }

        // "Load" outside the lock, the way a real backend would hold the
        // lock only around its tables, never around the device call.
        let info = Self::load_descriptor()?;

        let mut state = self.lock_state();
        if let Some(&id) = state.path_to_id.get(path) {
            // Another thread committed first; discard the duplicate.
            return Ok(id);
        }
        let raw = state.next_model;
        state.next_model += 1;
        let id = ModelId::from_raw(raw);
        state.path_to_id.insert(path.to_path_buf(), id);
        state.infos.insert(raw, Arc::new(info));
        info!(backend = self.name(), %id, path = %path.display(), "model loaded");
        Ok(id)
    }

    fn unload_model(&self, path: &Path) -> Result<(), BackendError> {
        let mut state = self.lock_state();
        if let Some(id) = state.path_to_id.remove(path) {
            state.infos.remove(&id.raw());
            info!(backend = self.name(), %id, path = %path.display(), "model unloaded");
        }
        // Not loaded: deliberately a successful no-op.
        Ok(())
    }

    fn model_info(&self, model: ModelId) -> Option<Arc<ModelInfo>> {
        self.lock_state().infos.get(&model.raw()).cloned()
    }

    fn infer(
        &self,
        stream: StreamId,
        model: ModelId,
        dev_in: DevicePtr,
        dev_out: DevicePtr,
    ) -> Result<(), BackendError> {
        let mut state = self.lock_state();
        if !state.streams.contains(&stream.raw()) {
            return Err(BackendError::UnknownStream(stream));
        }
        if !state.infos.contains_key(&model.raw()) {
            return Err(BackendError::UnknownModel(model));
        }
        let input = state
            .allocs
            .get(&dev_in.raw())
            .ok_or(BackendError::UnknownDevicePtr(dev_in))?
            .clone();
        let output = state
            .allocs
            .get_mut(&dev_out.raw())
            .ok_or(BackendError::UnknownDevicePtr(dev_out))?;
        if output.len() < input.len() {
            return Err(BackendError::CopyOutOfBounds {
                ptr: dev_out,
                offset: 0,
                len: input.len(),
                alloc_len: output.len(),
            });
        }

        // The trivial model: out[i] = in[i] + 1.0 over f32 elements.
        for (src, dst) in input.chunks_exact(4).zip(output.chunks_exact_mut(4)) {
            let v = f32::from_le_bytes([src[0], src[1], src[2], src[3]]) + 1.0;
            dst.copy_from_slice(&v.to_le_bytes());
        }
        debug!(%stream, %model, bytes = input.len(), "dummy infer complete");
        // The compute above ran on the calling thread, so the stream is
        // already drained; nothing left to synchronize.
        Ok(())
    }

    fn create_stream(&self) -> Result<StreamId, BackendError> {
        let mut state = self.lock_state();
        let raw = state.next_stream;
        state.next_stream += 1;
        state.streams.insert(raw);
        debug!(stream = raw, "dummy stream created");
        Ok(StreamId::from_raw(raw))
    }

    fn destroy_stream(&self, stream: StreamId) -> Result<(), BackendError> {
        let mut state = self.lock_state();
        if !state.streams.remove(&stream.raw()) {
            return Err(BackendError::UnknownStream(stream));
        }
        debug!(%stream, "dummy stream destroyed");
        Ok(())
    }

    fn synchronize_stream(&self, stream: StreamId) -> Result<(), BackendError> {
        let state = self.lock_state();
        if !state.streams.contains(&stream.raw()) {
            return Err(BackendError::UnknownStream(stream));
        }
        Ok(())
    }

    fn create_event(&self) -> Result<EventId, BackendError> {
        let mut state = self.lock_state();
        let raw = state.next_event;
        state.next_event += 1;
        state.events.insert(raw);
        Ok(EventId::from_raw(raw))
    }

    fn destroy_event(&self, event: EventId) -> Result<(), BackendError> {
        let mut state = self.lock_state();
        if !state.events.remove(&event.raw()) {
            return Err(BackendError::UnknownEvent(event));
        }
        Ok(())
    }

    fn record_event(&self, stream: StreamId, event: EventId) -> Result<(), BackendError> {
        let state = self.lock_state();
        if !state.streams.contains(&stream.raw()) {
            return Err(BackendError::UnknownStream(stream));
        }
        if !state.events.contains(&event.raw()) {
            return Err(BackendError::UnknownEvent(event));
        }
        Ok(())
    }

    fn wait_event(&self, stream: StreamId, event: EventId) -> Result<(), BackendError> {
        self.record_event(stream, event)
    }

    fn synchronize_event(&self, event: EventId) -> Result<(), BackendError> {
        let state = self.lock_state();
        if !state.events.contains(&event.raw()) {
            return Err(BackendError::UnknownEvent(event));
        }
        Ok(())
    }
}
