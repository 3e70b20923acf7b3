// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Session configuration loaded from TOML.

use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tensor_core::DType;

/// Declared layout of one model input or output tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorConfig {
    /// Optional human-readable tensor name.
    #[serde(default)]
    pub name: Option<String>,
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Element type.
    pub dtype: DType,
}

impl TensorConfig {
    /// Total byte size of one tensor with this layout.
    pub fn size_bytes(&self) -> usize {
        self.shape.iter().product::<usize>() * self.dtype.size_bytes()
    }
}

/// Everything a [`Session`](crate::Session) needs to run a workload:
/// which model, how many executors, how many tasks, and on which
/// devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the compiled model artifact.
    pub model_path: PathBuf,

    /// Number of executor threads to spawn.
    #[serde(default = "default_num_executor")]
    pub num_executor: usize,

    /// Number of tasks the session will submit.
    #[serde(default = "default_num_task")]
    pub num_task: usize,

    /// Device name per executor ("dummy" or "npu"). A single entry is
    /// broadcast to every executor.
    #[serde(default = "default_devices")]
    pub devices: Vec<String>,

    /// Declared model inputs, in submission order.
    #[serde(default)]
    pub inputs: Vec<TensorConfig>,

    /// Declared model outputs, in delivery order.
    #[serde(default)]
    pub outputs: Vec<TensorConfig>,
}

fn default_num_executor() -> usize {
    1
}

fn default_num_task() -> usize {
    1
}

fn default_devices() -> Vec<String> {
    vec!["dummy".to_string()]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.bin"),
            num_executor: default_num_executor(),
            num_task: default_num_task(),
            devices: default_devices(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses and validates a configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| RuntimeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("failed to serialise config: {e}")))
    }

    /// Checks internal consistency. `num_task` may be zero (an empty
    /// workload is legal and terminates promptly).
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.num_executor == 0 {
            return Err(RuntimeError::Config(
                "num_executor must be at least 1".into(),
            ));
        }
        if self.devices.is_empty() {
            return Err(RuntimeError::Config(
                "at least one device must be named".into(),
            ));
        }
        if self.devices.len() != 1 && self.devices.len() != self.num_executor {
            return Err(RuntimeError::Config(format!(
                "devices lists {} entries, expected 1 or num_executor ({})",
                self.devices.len(),
                self.num_executor
            )));
        }
        for device in &self.devices {
            device.parse::<crate::BackendKind>()?;
        }
        for tensor in self.inputs.iter().chain(&self.outputs) {
            if tensor.shape.is_empty() {
                return Err(RuntimeError::Config(
                    "tensor shape must have at least one dimension".into(),
                ));
            }
        }
        Ok(())
    }

    /// Device name for executor `index`, broadcasting a single entry.
    pub fn device_for(&self, index: usize) -> &str {
        if self.devices.len() == 1 {
            &self.devices[0]
        } else {
            &self.devices[index]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        model_path = "models/add_one.bin"
        num_executor = 2
        num_task = 8
        devices = ["dummy"]

        [[inputs]]
        name = "x"
        shape = [1, 5]
        dtype = "float32"

        [[outputs]]
        shape = [1, 5]
        dtype = "float32"
    "#;

    #[test]
    fn test_parse_example() {
        let config = SessionConfig::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.model_path, PathBuf::from("models/add_one.bin"));
        assert_eq!(config.num_executor, 2);
        assert_eq!(config.num_task, 8);
        assert_eq!(config.inputs.len(), 1);
        assert_eq!(config.inputs[0].name.as_deref(), Some("x"));
        assert_eq!(config.inputs[0].size_bytes(), 20);
        assert_eq!(config.outputs[0].dtype, DType::F32);
    }

    #[test]
    fn test_defaults_fill_in() {
        let config = SessionConfig::from_toml(r#"model_path = "m.bin""#).unwrap();
        assert_eq!(config.num_executor, 1);
        assert_eq!(config.num_task, 1);
        assert_eq!(config.devices, vec!["dummy".to_string()]);
    }

    #[test]
    fn test_zero_executors_rejected() {
        let result = SessionConfig::from_toml(
            r#"
            model_path = "m.bin"
            num_executor = 0
        "#,
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_unknown_device_rejected() {
        let result = SessionConfig::from_toml(
            r#"
            model_path = "m.bin"
            devices = ["gpu"]
        "#,
        );
        assert!(matches!(result, Err(RuntimeError::UnknownDevice(_))));
    }

    #[test]
    fn test_device_count_must_match_executors() {
        let result = SessionConfig::from_toml(
            r#"
            model_path = "m.bin"
            num_executor = 3
            devices = ["dummy", "dummy"]
        "#,
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_single_device_broadcasts() {
        let config = SessionConfig::from_toml(
            r#"
            model_path = "m.bin"
            num_executor = 3
        "#,
        )
        .unwrap();
        assert_eq!(config.device_for(0), "dummy");
        assert_eq!(config.device_for(2), "dummy");
    }

    #[test]
    fn test_roundtrip() {
        let config = SessionConfig::from_toml(EXAMPLE).unwrap();
        let text = config.to_toml().unwrap();
        let reparsed = SessionConfig::from_toml(&text).unwrap();
        assert_eq!(reparsed.num_task, config.num_task);
        assert_eq!(reparsed.inputs[0].shape, config.inputs[0].shape);
    }

    #[test]
    fn test_zero_tasks_is_legal() {
        let config = SessionConfig::from_toml(
            r#"
            model_path = "m.bin"
            num_task = 0
        "#,
        )
        .unwrap();
        assert_eq!(config.num_task, 0);
    }
}
