// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Data-carrier types for the npu-exec-rt execution engine.
//!
//! This crate provides:
//! - [`Tensor`] — an owned, contiguous byte buffer with a shape and dtype.
//! - [`Shape`] — runtime shape descriptor.
//! - [`DType`] — supported element data types (float32, float16, int8, uint8).
//! - [`ModelInfo`] — immutable descriptor of a loaded model's I/O layout.
//!
//! Tensors here carry data between preprocessing, device buffers, and
//! result aggregation; they do not implement arithmetic. Compute happens
//! on the backend, behind the `backend` crate's trait.

mod dtype;
mod error;
mod model_info;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use model_info::ModelInfo;
pub use shape::Shape;
pub use tensor::Tensor;
