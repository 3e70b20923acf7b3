// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor and model-descriptor construction.

/// Errors that can occur when constructing tensors or model descriptors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the shape × dtype product.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A typed view was requested for a tensor of a different dtype.
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The dtype string is not one of the supported names.
    #[error("unknown dtype '{0}'")]
    UnknownDType(String),

    /// A model descriptor declared a tensor count that disagrees with its
    /// shape list.
    #[error("model descriptor mismatch: declared {declared} {kind} tensors but {shapes} shapes")]
    TensorCountMismatch {
        kind: &'static str,
        declared: usize,
        shapes: usize,
    },
}
