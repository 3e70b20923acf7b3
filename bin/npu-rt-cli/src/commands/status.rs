// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `npu-rt status` command: report which backends this build can use.

use runtime::{BackendKind, Monitor};

pub fn execute() -> anyhow::Result<()> {
    println!("npu-rt · backend status");
    println!();

    for kind in Monitor::available_kinds() {
        match kind {
            BackendKind::Dummy => {
                println!("  dummy  available (host memory, fixed add-one model)");
            }
            #[cfg(feature = "npu")]
            BackendKind::Npu => match backend::NpuBackend::device_count() {
                Ok(count) => println!("  npu    available ({count} device(s) present)"),
                Err(err) => println!("  npu    compiled in, but device query failed: {err}"),
            },
            #[cfg(not(feature = "npu"))]
            BackendKind::Npu => {}
        }
    }

    #[cfg(not(feature = "npu"))]
    println!("  npu    not compiled in (rebuild with --features npu)");

    Ok(())
}
