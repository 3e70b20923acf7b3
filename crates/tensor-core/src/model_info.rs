// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Immutable descriptor of a loaded model's I/O layout.

use crate::{Shape, TensorError};

/// Describes a loaded model: batch size, per-batch byte sizes, and the
/// count and shape of every input and output tensor.
///
/// A `ModelInfo` is created once per successful model load and shared
/// read-only (as `Arc<ModelInfo>`) by every executor using that model.
/// It never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    batch_size: usize,
    input_size: usize,
    output_size: usize,
    input_num: usize,
    output_num: usize,
    inputs_shape: Vec<Shape>,
    outputs_shape: Vec<Shape>,
}

impl ModelInfo {
    /// Creates a model descriptor, checking that the shape lists agree
    /// with the declared tensor counts.
    pub fn new(
        batch_size: usize,
        input_size: usize,
        output_size: usize,
        inputs_shape: Vec<Shape>,
        outputs_shape: Vec<Shape>,
    ) -> Result<Self, TensorError> {
        Self::with_counts(
            batch_size,
            input_size,
            output_size,
            inputs_shape.len(),
            outputs_shape.len(),
            inputs_shape,
            outputs_shape,
        )
    }

    /// Creates a model descriptor with explicitly declared tensor counts,
    /// as reported by a device SDK. Counts that disagree with the shape
    /// lists are rejected.
    pub fn with_counts(
        batch_size: usize,
        input_size: usize,
        output_size: usize,
        input_num: usize,
        output_num: usize,
        inputs_shape: Vec<Shape>,
        outputs_shape: Vec<Shape>,
    ) -> Result<Self, TensorError> {
        if inputs_shape.len() != input_num {
            return Err(TensorError::TensorCountMismatch {
                kind: "input",
                declared: input_num,
                shapes: inputs_shape.len(),
            });
        }
        if outputs_shape.len() != output_num {
            return Err(TensorError::TensorCountMismatch {
                kind: "output",
                declared: output_num,
                shapes: outputs_shape.len(),
            });
        }
        Ok(Self {
            batch_size,
            input_size,
            output_size,
            input_num,
            output_num,
            inputs_shape,
            outputs_shape,
        })
    }

    /// Returns the model's batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the combined input byte length for one batch.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns the combined output byte length for one batch.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Returns the number of input tensors.
    pub fn input_num(&self) -> usize {
        self.input_num
    }

    /// Returns the number of output tensors.
    pub fn output_num(&self) -> usize {
        self.output_num
    }

    /// Returns the per-tensor input shapes, in input order.
    pub fn inputs_shape(&self) -> &[Shape] {
        &self.inputs_shape
    }

    /// Returns the per-tensor output shapes, in output order.
    pub fn outputs_shape(&self) -> &[Shape] {
        &self.outputs_shape
    }
}
