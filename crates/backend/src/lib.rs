// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # backend
//!
//! The hardware abstraction of the npu-exec-rt engine: device lifecycle,
//! device memory, model loading with per-path caching, stream/event
//! concurrency primitives, and synchronous inference invocation.
//!
//! Two implementations ship with the crate:
//! - [`DummyBackend`] — operates entirely in host memory with a fixed
//!   trivial model. Exists to validate the engine's control flow without
//!   hardware.
//! - `NpuBackend` (behind the `npu` feature) — routes every operation to
//!   the vendor NPU runtime over its C ABI.
//!
//! # Handles
//! Device memory, models, streams, and events are addressed through
//! opaque integer handles ([`DevicePtr`], [`ModelId`], [`StreamId`],
//! [`EventId`]) validated against backend-owned tables, never through
//! raw pointers. A handle is only meaningful to the backend that issued
//! it.
//!
//! # Contract
//! Every operation returns `Result`; no call panics across the trait
//! boundary. `infer` is logically synchronous: it submits work to the
//! given stream and synchronizes that stream before returning.

mod dummy;
mod error;
mod handle;
#[cfg(feature = "npu")]
mod npu;

pub use dummy::{DummyBackend, DummyStats};
pub use error::BackendError;
pub use handle::{DevicePtr, EventId, ModelId, StreamId};
#[cfg(feature = "npu")]
pub use npu::NpuBackend;

use std::path::Path;
use std::sync::Arc;
use tensor_core::ModelInfo;

/// One class of inference hardware: device lifecycle, memory, model
/// cache, streams/events, and inference execution.
///
/// Implementations are shared across executor threads as
/// `Arc<dyn Backend>`; all interior state is guarded by backend-internal
/// locks. Model loading is idempotent per path: concurrent or repeated
/// calls for the same path converge on one underlying load and one
/// [`ModelId`].
pub trait Backend: Send + Sync {
    /// Short identifier, e.g. `"dummy"` or `"npu"`.
    fn name(&self) -> &'static str;

    /// Sets up the device context. Idempotent: calling it again after a
    /// successful init is a no-op.
    fn init(&self) -> Result<(), BackendError>;

    /// Tears down the device context.
    fn finalize(&self) -> Result<(), BackendError>;

    /// Allocates `size` bytes of device memory.
    ///
    /// The returned pointer is opaque; it must be released with exactly
    /// one [`free`](Backend::free).
    fn alloc(&self, size: usize) -> Result<DevicePtr, BackendError>;

    /// Releases a device allocation.
    fn free(&self, ptr: DevicePtr) -> Result<(), BackendError>;

    /// Copies `src` into device memory at `ptr + offset`.
    ///
    /// Synchronous with respect to the calling thread.
    fn copy_to_device(
        &self,
        ptr: DevicePtr,
        offset: usize,
        src: &[u8],
    ) -> Result<(), BackendError>;

    /// Copies `dst.len()` bytes from device memory at `ptr + offset`
    /// into `dst`. Synchronous with respect to the calling thread.
    fn copy_from_device(
        &self,
        dst: &mut [u8],
        ptr: DevicePtr,
        offset: usize,
    ) -> Result<(), BackendError>;

    /// Loads the model at `path`, or returns the existing id if this
    /// path is already loaded. Populates a [`ModelInfo`] from the
    /// model's declared tensor shapes, counts, and batch size.
    fn load_model(&self, path: &Path) -> Result<ModelId, BackendError>;

    /// Unloads the model at `path`. Succeeds as a no-op when the path is
    /// not loaded, so callers cannot double-free through this entry.
    fn unload_model(&self, path: &Path) -> Result<(), BackendError>;

    /// Returns the descriptor for a loaded model, or `None` if the id is
    /// unknown (e.g. after `unload_model`).
    fn model_info(&self, model: ModelId) -> Option<Arc<ModelInfo>>;

    /// Runs inference for `model` on `stream`, reading from `dev_in` and
    /// writing to `dev_out` (both caller-owned, sized per the model's
    /// [`ModelInfo`]). Synchronizes the stream before returning.
    fn infer(
        &self,
        stream: StreamId,
        model: ModelId,
        dev_in: DevicePtr,
        dev_out: DevicePtr,
    ) -> Result<(), BackendError>;

    /// Creates an ordered command stream. A backend supports multiple
    /// concurrently live streams; a stream must not outlive its backend.
    fn create_stream(&self) -> Result<StreamId, BackendError>;

    /// Destroys a stream.
    fn destroy_stream(&self, stream: StreamId) -> Result<(), BackendError>;

    /// Blocks until all work previously issued on `stream` completes.
    fn synchronize_stream(&self, stream: StreamId) -> Result<(), BackendError>;

    /// Creates a cross-stream synchronization event.
    fn create_event(&self) -> Result<EventId, BackendError>;

    /// Destroys an event.
    fn destroy_event(&self, event: EventId) -> Result<(), BackendError>;

    /// Marks a point in `stream`'s command order.
    ///
    /// Recording one event into several streams concurrently leaves the
    /// wake order unspecified; callers that need ordering must not share
    /// an event across streams whose relative order matters.
    fn record_event(&self, stream: StreamId, event: EventId) -> Result<(), BackendError>;

    /// Makes `stream` block until the recorded point of `event` is
    /// reached on the stream it was recorded into.
    fn wait_event(&self, stream: StreamId, event: EventId) -> Result<(), BackendError>;

    /// Blocks the calling thread until `event`'s recorded point is
    /// reached.
    fn synchronize_event(&self, event: EventId) -> Result<(), BackendError>;
}
