// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for backend operations.

use crate::{DevicePtr, EventId, ModelId, StreamId};
use std::path::PathBuf;

/// Errors reported across the [`crate::Backend`] interface.
///
/// Backends never panic across the trait boundary; every fallible
/// operation maps its failure into one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Device context creation or teardown failed.
    #[error("device context error on '{backend}': {detail}")]
    Context {
        backend: &'static str,
        detail: String,
    },

    /// A zero-byte device allocation was requested.
    #[error("zero-sized device allocation")]
    ZeroSizedAllocation,

    /// The device pointer is not (or no longer) a live allocation of
    /// this backend.
    #[error("unknown device pointer {0}")]
    UnknownDevicePtr(DevicePtr),

    /// A copy would run past the end of the device allocation.
    #[error("copy out of bounds at {ptr}: offset {offset} + len {len} > allocation {alloc_len}")]
    CopyOutOfBounds {
        ptr: DevicePtr,
        offset: usize,
        len: usize,
        alloc_len: usize,
    },

    /// Model loading failed.
    #[error("failed to load model {path:?}: {detail}")]
    ModelLoad { path: PathBuf, detail: String },

    /// The model id is not present in this backend's tables.
    #[error("unknown {0}")]
    UnknownModel(ModelId),

    /// The stream id is not present in this backend's tables.
    #[error("unknown {0}")]
    UnknownStream(StreamId),

    /// The event id is not present in this backend's tables.
    #[error("unknown {0}")]
    UnknownEvent(EventId),

    /// The model's declared descriptor was internally inconsistent.
    #[error("model descriptor error: {0}")]
    Descriptor(#[from] tensor_core::TensorError),

    /// A vendor SDK call returned a non-zero status. The code is opaque;
    /// there is no recovery beyond aborting the operation.
    #[error("sdk call '{op}' failed with status {code}")]
    Sdk { op: &'static str, code: i32 },
}
