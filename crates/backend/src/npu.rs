// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! NPU backend: routes every operation to the vendor runtime's C ABI.
//!
//! Every SDK entry point returns an integer status; zero is success and
//! any other value is an opaque failure surfaced as
//! [`BackendError::Sdk`]. The backend owns the handle tables (path →
//! model id → SDK handle, stream/event id → SDK handle, live device
//! pointers with their sizes); SDK calls themselves are made outside the
//! table lock so a slow device operation never blocks table lookups on
//! other executor threads.

use crate::{Backend, BackendError, DevicePtr, EventId, ModelId, StreamId};
use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::Arc;
use tensor_core::{ModelInfo, Shape};
use tracing::{debug, info, warn};

mod ffi {
    use std::ffi::{c_char, c_void};

    pub const COPY_HOST_TO_DEVICE: i32 = 0;
    pub const COPY_DEVICE_TO_HOST: i32 = 1;

    #[link(name = "npurt")]
    extern "C" {
        pub fn npurt_device_count(count: *mut i32) -> i32;
        pub fn npurt_context_create(ctx: *mut *mut c_void, device: i32) -> i32;
        pub fn npurt_context_destroy(ctx: *mut c_void) -> i32;
        pub fn npurt_context_set_current(ctx: *mut c_void) -> i32;

        pub fn npurt_malloc(ptr: *mut *mut c_void, size: u64) -> i32;
        pub fn npurt_free(ptr: *mut c_void) -> i32;
        pub fn npurt_memcpy(dst: *mut c_void, src: *const c_void, size: u64, kind: i32) -> i32;

        pub fn npurt_model_load(path: *const c_char, model: *mut *mut c_void) -> i32;
        pub fn npurt_model_unload(model: *mut c_void) -> i32;
        pub fn npurt_model_batch_size(model: *mut c_void, out: *mut u64) -> i32;
        pub fn npurt_model_input_total_len(model: *mut c_void, out: *mut u64) -> i32;
        pub fn npurt_model_output_total_len(model: *mut c_void, out: *mut u64) -> i32;
        pub fn npurt_model_input_tensor_num(model: *mut c_void, out: *mut u32) -> i32;
        pub fn npurt_model_output_tensor_num(model: *mut c_void, out: *mut u32) -> i32;
        /// Two-phase: pass `dims = null` to query the dim count.
        pub fn npurt_model_input_dims(
            model: *mut c_void,
            index: u32,
            dims: *mut u32,
            count: *mut u32,
        ) -> i32;
        pub fn npurt_model_output_dims(
            model: *mut c_void,
            index: u32,
            dims: *mut u32,
            count: *mut u32,
        ) -> i32;

        pub fn npurt_stream_create(stream: *mut *mut c_void) -> i32;
        pub fn npurt_stream_destroy(stream: *mut c_void) -> i32;
        pub fn npurt_stream_synchronize(stream: *mut c_void) -> i32;

        pub fn npurt_event_create(event: *mut *mut c_void) -> i32;
        pub fn npurt_event_destroy(event: *mut c_void) -> i32;
        pub fn npurt_event_record(stream: *mut c_void, event: *mut c_void) -> i32;
        pub fn npurt_event_stream_wait(stream: *mut c_void, event: *mut c_void) -> i32;
        pub fn npurt_event_synchronize(event: *mut c_void) -> i32;

        pub fn npurt_model_execute_async(
            stream: *mut c_void,
            model: *mut c_void,
            input: *mut c_void,
            output: *mut c_void,
            batch: u64,
        ) -> i32;
    }
}

fn check(code: i32, op: &'static str) -> Result<(), BackendError> {
    if code == 0 {
        Ok(())
    } else {
        Err(BackendError::Sdk { op, code })
    }
}

#[derive(Default)]
struct NpuState {
    next_model: u32,
    path_to_id: HashMap<PathBuf, ModelId>,
    models: HashMap<u32, usize>,
    infos: HashMap<u32, Arc<ModelInfo>>,
    next_stream: u32,
    streams: HashMap<u32, usize>,
    next_event: u32,
    events: HashMap<u32, usize>,
    /// Live device allocations: raw address → size in bytes.
    allocs: HashMap<u64, usize>,
}

/// Backend driving one NPU device through the vendor runtime.
pub struct NpuBackend {
    device_id: i32,
    /// Raw SDK context handle, zero when no context exists.
    ctx: Mutex<usize>,
    state: Mutex<NpuState>,
}

// SAFETY: the raw SDK handles stored in the tables are opaque tokens
// only ever passed back to the SDK, whose entry points are documented
// thread-safe for distinct handles. Table mutation is serialized by the
// mutexes.
unsafe impl Send for NpuBackend {}
unsafe impl Sync for NpuBackend {}

impl NpuBackend {
    /// Creates a backend bound to `device_id`. The device context is not
    /// created until [`Backend::init`].
    pub fn new(device_id: i32) -> Self {
        Self {
            device_id,
            ctx: Mutex::new(0),
            state: Mutex::new(NpuState::default()),
        }
    }

    /// Returns the number of NPU devices visible to the runtime.
    pub fn device_count() -> Result<i32, BackendError> {
        let mut count = 0i32;
        check(
            unsafe { ffi::npurt_device_count(&mut count) },
            "npurt_device_count",
        )?;
        Ok(count)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, NpuState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_ctx(&self) -> std::sync::MutexGuard<'_, usize> {
        match self.ctx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queries the SDK for a loaded model's descriptor.
    fn query_descriptor(model: *mut c_void) -> Result<ModelInfo, BackendError> {
        let mut batch = 0u64;
        let mut input_len = 0u64;
        let mut output_len = 0u64;
        let mut input_num = 0u32;
        let mut output_num = 0u32;
        unsafe {
            check(
                ffi::npurt_model_batch_size(model, &mut batch),
                "npurt_model_batch_size",
            )?;
            check(
                ffi::npurt_model_input_total_len(model, &mut input_len),
                "npurt_model_input_total_len",
            )?;
            check(
                ffi::npurt_model_output_total_len(model, &mut output_len),
                "npurt_model_output_total_len",
            )?;
            check(
                ffi::npurt_model_input_tensor_num(model, &mut input_num),
                "npurt_model_input_tensor_num",
            )?;
            check(
                ffi::npurt_model_output_tensor_num(model, &mut output_num),
                "npurt_model_output_tensor_num",
            )?;
        }

        let inputs_shape = Self::query_dims(model, input_num, true)?;
        let outputs_shape = Self::query_dims(model, output_num, false)?;

        Ok(ModelInfo::with_counts(
            batch as usize,
            input_len as usize,
            output_len as usize,
            input_num as usize,
            output_num as usize,
            inputs_shape,
            outputs_shape,
        )?)
    }

    fn query_dims(
        model: *mut c_void,
        num: u32,
        inputs: bool,
    ) -> Result<Vec<Shape>, BackendError> {
        let (query, op): (
            unsafe extern "C" fn(*mut c_void, u32, *mut u32, *mut u32) -> i32,
            &'static str,
        ) = if inputs {
            (ffi::npurt_model_input_dims, "npurt_model_input_dims")
        } else {
            (ffi::npurt_model_output_dims, "npurt_model_output_dims")
        };

        let mut shapes = Vec::with_capacity(num as usize);
        for index in 0..num {
            let mut count = 0u32;
            check(
                unsafe { query(model, index, std::ptr::null_mut(), &mut count) },
                op,
            )?;
            let mut dims = vec![0u32; count as usize];
            check(
                unsafe { query(model, index, dims.as_mut_ptr(), &mut count) },
                op,
            )?;
            shapes.push(Shape::new(dims.into_iter().map(|d| d as usize).collect()));
        }
        Ok(shapes)
    }
}

impl Backend for NpuBackend {
    fn name(&self) -> &'static str {
        "npu"
    }

    fn init(&self) -> Result<(), BackendError> {
        let mut ctx = self.lock_ctx();
        if *ctx != 0 {
            return Ok(());
        }
        let mut raw: *mut c_void = std::ptr::null_mut();
        check(
            unsafe { ffi::npurt_context_create(&mut raw, self.device_id) },
            "npurt_context_create",
        )
        .map_err(|e| BackendError::Context {
            backend: "npu",
            detail: format!("device {}: {e}", self.device_id),
        })?;
        *ctx = raw as usize;
        info!(backend = self.name(), device = self.device_id, "context created");
        Ok(())
    }

    fn finalize(&self) -> Result<(), BackendError> {
        let mut ctx = self.lock_ctx();
        if *ctx == 0 {
            return Ok(());
        }
        check(
            unsafe { ffi::npurt_context_destroy(*ctx as *mut c_void) },
            "npurt_context_destroy",
        )?;
        *ctx = 0;
        info!(backend = self.name(), device = self.device_id, "context destroyed");
        Ok(())
    }

    fn alloc(&self, size: usize) -> Result<DevicePtr, BackendError> {
        if size == 0 {
            return Err(BackendError::ZeroSizedAllocation);
        }
        let mut raw: *mut c_void = std::ptr::null_mut();
        check(
            unsafe { ffi::npurt_malloc(&mut raw, size as u64) },
            "npurt_malloc",
        )?;
        let addr = raw as u64;
        self.lock_state().allocs.insert(addr, size);
        debug!(ptr = addr, size, "npu alloc");
        Ok(DevicePtr::from_raw(addr))
    }

    fn free(&self, ptr: DevicePtr) -> Result<(), BackendError> {
        if self.lock_state().allocs.remove(&ptr.raw()).is_none() {
            return Err(BackendError::UnknownDevicePtr(ptr));
        }
        check(
            unsafe { ffi::npurt_free(ptr.raw() as *mut c_void) },
            "npurt_free",
        )
    }

    fn copy_to_device(
        &self,
        ptr: DevicePtr,
        offset: usize,
        src: &[u8],
    ) -> Result<(), BackendError> {
        let alloc_len = *self
            .lock_state()
            .allocs
            .get(&ptr.raw())
            .ok_or(BackendError::UnknownDevicePtr(ptr))?;
        if offset
            .checked_add(src.len())
            .map_or(true, |end| end > alloc_len)
        {
            return Err(BackendError::CopyOutOfBounds {
                ptr,
                offset,
                len: src.len(),
                alloc_len,
            });
        }
        check(
            unsafe {
                ffi::npurt_memcpy(
                    (ptr.raw() + offset as u64) as *mut c_void,
                    src.as_ptr() as *const c_void,
                    src.len() as u64,
                    ffi::COPY_HOST_TO_DEVICE,
                )
            },
            "npurt_memcpy",
        )
    }

    fn copy_from_device(
        &self,
        dst: &mut [u8],
        ptr: DevicePtr,
        offset: usize,
    ) -> Result<(), BackendError> {
        let alloc_len = *self
            .lock_state()
            .allocs
            .get(&ptr.raw())
            .ok_or(BackendError::UnknownDevicePtr(ptr))?;
        if offset
            .checked_add(dst.len())
            .map_or(true, |end| end > alloc_len)
        {
            return Err(BackendError::CopyOutOfBounds {
                ptr,
                offset,
                len: dst.len(),
                alloc_len,
            });
        }
        check(
            unsafe {
                ffi::npurt_memcpy(
                    dst.as_mut_ptr() as *mut c_void,
                    (ptr.raw() + offset as u64) as *const c_void,
                    dst.len() as u64,
                    ffi::COPY_DEVICE_TO_HOST,
                )
            },
            "npurt_memcpy",
        )
    }

    fn load_model(&self, path: &Path) -> Result<ModelId, BackendError> {
        // Fast path under the table lock.
        {
            let state = self.lock_state();
            if let Some(&id) = state.path_to_id.get(path) {
                return Ok(id);
            }
        }

        // Device load outside the lock.
        let c_path = CString::new(path.as_os_str().as_encoded_bytes()).map_err(|_| {
            BackendError::ModelLoad {
                path: path.to_path_buf(),
                detail: "path contains an interior NUL byte".into(),
            }
        })?;
        let mut raw: *mut c_void = std::ptr::null_mut();
        check(
            unsafe { ffi::npurt_model_load(c_path.as_ptr(), &mut raw) },
            "npurt_model_load",
        )
        .map_err(|e| BackendError::ModelLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let info = match Self::query_descriptor(raw) {
            Ok(info) => info,
            Err(e) => {
                unsafe {
                    ffi::npurt_model_unload(raw);
                }
                return Err(e);
            }
        };

        let mut state = self.lock_state();
        if let Some(&id) = state.path_to_id.get(path) {
            // Lost the race: another executor committed this path first.
            drop(state);
            warn!(path = %path.display(), "discarding duplicate model load");
            check(
                unsafe { ffi::npurt_model_unload(raw) },
                "npurt_model_unload",
            )?;
            return Ok(id);
        }
        let raw_id = state.next_model;
        state.next_model += 1;
        let id = ModelId::from_raw(raw_id);
        state.path_to_id.insert(path.to_path_buf(), id);
        state.models.insert(raw_id, raw as usize);
        state.infos.insert(raw_id, Arc::new(info));
        info!(backend = self.name(), %id, path = %path.display(), "model loaded");
        Ok(id)
    }

    fn unload_model(&self, path: &Path) -> Result<(), BackendError> {
        let handle = {
            let mut state = self.lock_state();
            let Some(id) = state.path_to_id.remove(path) else {
                return Ok(());
            };
            state.infos.remove(&id.raw());
            state
                .models
                .remove(&id.raw())
                .ok_or(BackendError::UnknownModel(id))?
        };
        check(
            unsafe { ffi::npurt_model_unload(handle as *mut c_void) },
            "npurt_model_unload",
        )
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
        let (stream_handle, model_handle, batch) = {
            let state = self.lock_state();
            let stream_handle = *state
                .streams
                .get(&stream.raw())
                .ok_or(BackendError::UnknownStream(stream))?;
            let model_handle = *state
                .models
                .get(&model.raw())
                .ok_or(BackendError::UnknownModel(model))?;
            let batch = state
                .infos
                .get(&model.raw())
                .ok_or(BackendError::UnknownModel(model))?
                .batch_size();
            (stream_handle, model_handle, batch)
        };

        // Submit asynchronously, then drain the stream: the interface is
        // logically synchronous.
        check(
            unsafe {
                ffi::npurt_model_execute_async(
                    stream_handle as *mut c_void,
                    model_handle as *mut c_void,
                    dev_in.raw() as *mut c_void,
                    dev_out.raw() as *mut c_void,
                    batch as u64,
                )
            },
            "npurt_model_execute_async",
        )?;
        check(
            unsafe { ffi::npurt_stream_synchronize(stream_handle as *mut c_void) },
            "npurt_stream_synchronize",
        )
    }

    fn create_stream(&self) -> Result<StreamId, BackendError> {
        {
            let ctx = self.lock_ctx();
            if *ctx == 0 {
                return Err(BackendError::Context {
                    backend: "npu",
                    detail: "create_stream before init".into(),
                });
            }
            check(
                unsafe { ffi::npurt_context_set_current(*ctx as *mut c_void) },
                "npurt_context_set_current",
            )?;
        }
        let mut raw: *mut c_void = std::ptr::null_mut();
        check(
            unsafe { ffi::npurt_stream_create(&mut raw) },
            "npurt_stream_create",
        )?;
        let mut state = self.lock_state();
        let raw_id = state.next_stream;
        state.next_stream += 1;
        state.streams.insert(raw_id, raw as usize);
        debug!(stream = raw_id, "npu stream created");
        Ok(StreamId::from_raw(raw_id))
    }

    fn destroy_stream(&self, stream: StreamId) -> Result<(), BackendError> {
        let handle = self
            .lock_state()
            .streams
            .remove(&stream.raw())
            .ok_or(BackendError::UnknownStream(stream))?;
        check(
            unsafe { ffi::npurt_stream_destroy(handle as *mut c_void) },
            "npurt_stream_destroy",
        )
    }

    fn synchronize_stream(&self, stream: StreamId) -> Result<(), BackendError> {
        let handle = *self
            .lock_state()
            .streams
            .get(&stream.raw())
            .ok_or(BackendError::UnknownStream(stream))?;
        check(
            unsafe { ffi::npurt_stream_synchronize(handle as *mut c_void) },
            "npurt_stream_synchronize",
        )
    }

    fn create_event(&self) -> Result<EventId, BackendError> {
        let mut raw: *mut c_void = std::ptr::null_mut();
        check(
            unsafe { ffi::npurt_event_create(&mut raw) },
            "npurt_event_create",
        )?;
        let mut state = self.lock_state();
        let raw_id = state.next_event;
        state.next_event += 1;
        state.events.insert(raw_id, raw as usize);
        Ok(EventId::from_raw(raw_id))
    }

    fn destroy_event(&self, event: EventId) -> Result<(), BackendError> {
        let handle = self
            .lock_state()
            .events
            .remove(&event.raw())
            .ok_or(BackendError::UnknownEvent(event))?;
        check(
            unsafe { ffi::npurt_event_destroy(handle as *mut c_void) },
            "npurt_event_destroy",
        )
    }

    fn record_event(&self, stream: StreamId, event: EventId) -> Result<(), BackendError> {
        let (s, e) = {
            let state = self.lock_state();
            (
                *state
                    .streams
                    .get(&stream.raw())
                    .ok_or(BackendError::UnknownStream(stream))?,
                *state
                    .events
                    .get(&event.raw())
                    .ok_or(BackendError::UnknownEvent(event))?,
            )
        };
        check(
            unsafe { ffi::npurt_event_record(s as *mut c_void, e as *mut c_void) },
            "npurt_event_record",
        )
    }

    fn wait_event(&self, stream: StreamId, event: EventId) -> Result<(), BackendError> {
        let (s, e) = {
            let state = self.lock_state();
            (
                *state
                    .streams
                    .get(&stream.raw())
                    .ok_or(BackendError::UnknownStream(stream))?,
                *state
                    .events
                    .get(&event.raw())
                    .ok_or(BackendError::UnknownEvent(event))?,
            )
        };
        check(
            unsafe { ffi::npurt_event_stream_wait(s as *mut c_void, e as *mut c_void) },
            "npurt_event_stream_wait",
        )
    }

    fn synchronize_event(&self, event: EventId) -> Result<(), BackendError> {
        let handle = *self
            .lock_state()
            .events
            .get(&event.raw())
            .ok_or(BackendError::UnknownEvent(event))?;
        check(
            unsafe { ffi::npurt_event_synchronize(handle as *mut c_void) },
            "npurt_event_synchronize",
        )
    }
}
