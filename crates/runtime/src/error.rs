// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the execution engine.

use backend::ModelId;

/// Errors that can occur while configuring or running a session.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration file could not be read, parsed, or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// A backend operation failed.
    #[error("backend error: {0}")]
    Backend(#[from] backend::BackendError),

    /// Tensor construction failed.
    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    /// The device name is not one of the known backends.
    #[error("unknown device '{0}'; expected 'dummy' or 'npu'")]
    UnknownDevice(String),

    /// The device is known but its backend was not compiled into this
    /// build.
    #[error("backend '{0}' support is not compiled into this build")]
    BackendUnavailable(&'static str),

    /// A task supplied a different number of input tensors than the
    /// model declares.
    #[error("task supplied {actual} input tensors, model expects {expected}")]
    InputCountMismatch { expected: usize, actual: usize },

    /// A task's combined input byte length does not match the model's
    /// batched input size.
    #[error("task input is {actual} bytes, model expects {expected}")]
    InputSizeMismatch { expected: usize, actual: usize },

    /// The backend returned a model id it no longer has a descriptor
    /// for.
    #[error("no model descriptor for {0}")]
    MissingModelInfo(ModelId),
}
