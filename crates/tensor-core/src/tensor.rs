// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The owned tensor type carried through the execution pipeline.

use crate::{DType, Shape, TensorError};

/// An owned, contiguous tensor: byte buffer + shape + element type.
///
/// `Tensor` is the unit of data exchange between preprocessing, the
/// executors' device buffers, and result aggregation. The invariant
/// `data.len() == shape.num_elements() * dtype.size_bytes()` is enforced
/// by every constructor.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    data: Vec<u8>,
}

impl Tensor {
    /// Creates a zero-filled tensor.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let t = Tensor::zeros(Shape::matrix(1, 5), DType::F32);
    /// assert_eq!(t.size_bytes(), 20);
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let size = shape.size_bytes(dtype);
        Self {
            shape,
            dtype,
            data: vec![0u8; size],
        }
    }

    /// Creates a tensor from raw bytes.
    ///
    /// Returns an error if the buffer length does not match
    /// `shape.size_bytes(dtype)`.
    pub fn from_bytes(shape: Shape, dtype: DType, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = shape.size_bytes(dtype);
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, dtype, data })
    }

    /// Creates an f32 tensor from a slice of values.
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        if values.len() != shape.num_elements() {
            return Err(TensorError::BufferSizeMismatch {
                expected: shape.num_elements() * DType::F32.size_bytes(),
                actual: values.len() * DType::F32.size_bytes(),
            });
        }
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Ok(Self {
            shape,
            dtype: DType::F32,
            data,
        })
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the raw byte slice backing this tensor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns a mutable reference to the raw byte buffer.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the byte length of the buffer.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Decodes the buffer into a vector of `f32` values.
    ///
    /// Returns an error if the tensor's dtype is not [`DType::F32`].
    /// Decoding copies: `Vec<u8>` carries no alignment guarantee, so the
    /// bytes are reassembled element by element.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TensorError> {
        if self.dtype != DType::F32 {
            return Err(TensorError::DTypeMismatch {
                expected: DType::F32.as_str(),
                actual: self.dtype.as_str(),
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Consumes the tensor, returning its byte buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(Shape::matrix(1, 5), DType::F32);
        assert_eq!(t.size_bytes(), 20);
        assert_eq!(t.shape(), &Shape::matrix(1, 5));
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.to_f32_vec().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_f32_roundtrip() {
        let values = vec![0.0f32, 1.0, 2.0, 3.0, 4.0];
        let t = Tensor::from_f32(Shape::vector(5), &values).unwrap();
        assert_eq!(t.to_f32_vec().unwrap(), values);
    }

    #[test]
    fn test_from_f32_wrong_count() {
        let result = Tensor::from_f32(Shape::vector(4), &[1.0, 2.0]);
        assert!(matches!(
            result,
            Err(TensorError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_bytes_size_mismatch() {
        let result = Tensor::from_bytes(Shape::matrix(1, 5), DType::F32, vec![0u8; 10]);
        assert!(matches!(
            result,
            Err(TensorError::BufferSizeMismatch {
                expected: 20,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_to_f32_wrong_dtype() {
        let t = Tensor::zeros(Shape::vector(4), DType::U8);
        assert!(matches!(
            t.to_f32_vec(),
            Err(TensorError::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_bytes_mut() {
        let mut t = Tensor::zeros(Shape::vector(1), DType::F32);
        t.as_bytes_mut().copy_from_slice(&1.5f32.to_le_bytes());
        assert_eq!(t.to_f32_vec().unwrap(), vec![1.5]);
    }
}
