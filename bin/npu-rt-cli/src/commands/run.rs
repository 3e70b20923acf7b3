// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `npu-rt run` command: execute a configured workload.
//!
//! The built-in preprocessing fills every declared input element of task
//! `i` with the value `i`, which makes outputs easy to eyeball against
//! the model's transfer function.

use anyhow::Context;
use runtime::{Monitor, PreprocessFn, Session, SessionConfig, TensorConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tensor_core::DType;
use tracing::warn;

pub fn execute(
    config_path: PathBuf,
    executors: Option<usize>,
    tasks: Option<usize>,
    device: Option<String>,
    print_outputs: bool,
) -> anyhow::Result<()> {
    let mut config = SessionConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(n) = executors {
        config.num_executor = n;
    }
    if let Some(n) = tasks {
        config.num_task = n;
    }
    if let Some(d) = device {
        config.devices = vec![d];
    }
    config.validate()?;

    println!("npu-rt · inference run");
    println!("  Model:     {}", config.model_path.display());
    println!("  Executors: {}", config.num_executor);
    println!("  Tasks:     {}", config.num_task);
    println!("  Devices:   {}", config.devices.join(", "));
    println!();

    let preprocess = index_fill_preprocess(config.inputs.clone());

    let session = Session::new(config, Arc::new(Monitor::new()))?;
    let output = session.run(preprocess, None)?;

    if print_outputs {
        for (task, outputs) in output.results.iter().enumerate() {
            for (i, values) in outputs.iter().enumerate() {
                println!("  task {task} output {i}: {values:?}");
            }
        }
        println!();
    }

    println!("  Completed: {}", output.results.len());
    if !output.failures.is_empty() {
        println!("  Failed:    {}", output.failures.len());
        for err in &output.failures {
            warn!(%err, "task completed with error");
            println!("    {err}");
        }
    }
    println!("  {}", output.metrics.summary());
    Ok(())
}

/// Task `i` fills every declared input element with the value `i`:
/// little-endian f32 for float32 inputs, the low byte of `i` repeated
/// over the element bytes for the other dtypes. The produced length
/// always matches the declared input layout.
fn index_fill_preprocess(inputs: Vec<TensorConfig>) -> PreprocessFn {
    Box::new(move |index| {
        let mut bytes = Vec::new();
        for input in &inputs {
            match input.dtype {
                DType::F32 => {
                    let elements: usize = input.shape.iter().product();
                    for _ in 0..elements {
                        bytes.extend_from_slice(&(index as f32).to_le_bytes());
                    }
                }
                _ => {
                    bytes.resize(bytes.len() + input.size_bytes(), index as u8);
                }
            }
        }
        bytes
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(shape: Vec<usize>, dtype: DType) -> TensorConfig {
        TensorConfig {
            name: None,
            shape,
            dtype,
        }
    }

    #[test]
    fn test_index_fill_f32() {
        let pre = index_fill_preprocess(vec![input(vec![1, 5], DType::F32)]);
        let bytes = pre(3);
        assert_eq!(bytes.len(), 20);
        let decoded: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(decoded, vec![3.0; 5]);
    }

    #[test]
    fn test_index_fill_matches_declared_size_for_byte_dtypes() {
        let pre = index_fill_preprocess(vec![input(vec![4], DType::U8)]);
        assert_eq!(pre(7), vec![7u8; 4]);

        let pre = index_fill_preprocess(vec![input(vec![2, 3], DType::I8)]);
        assert_eq!(pre(1).len(), 6);
    }

    #[test]
    fn test_index_fill_mixed_inputs_concatenate_in_order() {
        let pre = index_fill_preprocess(vec![
            input(vec![2], DType::F32),
            input(vec![3], DType::U8),
        ]);
        let bytes = pre(2);
        assert_eq!(bytes.len(), 2 * 4 + 3);
        assert_eq!(&bytes[8..], &[2u8; 3]);
    }
}
