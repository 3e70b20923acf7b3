// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

/// Enumerates the element types a [`crate::Tensor`] can hold.
///
/// The serde names match the strings accepted by session configuration
/// files (`dtype = "float32"` and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    #[serde(rename = "float32")]
    F32,
    /// 16-bit IEEE 754 floating point.
    #[serde(rename = "float16")]
    F16,
    /// 8-bit signed integer (quantised models).
    #[serde(rename = "int8")]
    I8,
    /// 8-bit unsigned integer (raw image data).
    #[serde(rename = "uint8")]
    U8,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
            DType::I8 => 1,
            DType::U8 => 1,
        }
    }

    /// Returns the configuration-file label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F16 => "float16",
            DType::I8 => "int8",
            DType::U8 => "uint8",
        }
    }
}

impl std::str::FromStr for DType {
    type Err = crate::TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float32" => Ok(DType::F32),
            "float16" => Ok(DType::F16),
            "int8" => Ok(DType::I8),
            "uint8" => Ok(DType::U8),
            other => Err(crate::TensorError::UnknownDType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bytes() {
        assert_eq!(DType::F32.size_bytes(), 4);
        assert_eq!(DType::F16.size_bytes(), 2);
        assert_eq!(DType::I8.size_bytes(), 1);
        assert_eq!(DType::U8.size_bytes(), 1);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("float32".parse::<DType>().unwrap(), DType::F32);
        assert_eq!("uint8".parse::<DType>().unwrap(), DType::U8);
        assert!("f64".parse::<DType>().is_err());
    }

    #[test]
    fn test_str_roundtrip() {
        for d in [DType::F32, DType::F16, DType::I8, DType::U8] {
            assert_eq!(d.as_str().parse::<DType>().unwrap(), d);
        }
    }
}
