// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lazily-populated registry of backend instances.
//!
//! One `Monitor` owns at most one backend instance per [`BackendKind`]
//! for its lifetime; every session and executor created through it
//! shares those instances. Passing the registry explicitly (instead of
//! hiding it in a process-wide singleton) keeps backend lifetime visible
//! and lets tests run with isolated registries.

use crate::RuntimeError;
use backend::{Backend, DummyBackend};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::info;

/// The closed set of backend implementations the engine can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process host-memory backend with a fixed trivial model.
    Dummy,
    /// Vendor NPU device backend (requires the `npu` build feature).
    Npu,
}

impl BackendKind {
    /// Returns the configuration-file name for this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Dummy => "dummy",
            BackendKind::Npu => "npu",
        }
    }
}

impl FromStr for BackendKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dummy" => Ok(BackendKind::Dummy),
            "npu" => Ok(BackendKind::Npu),
            other => Err(RuntimeError::UnknownDevice(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry that creates, initialises, and caches one backend per kind.
pub struct Monitor {
    backends: Mutex<HashMap<BackendKind, Arc<dyn Backend>>>,
}

impl Monitor {
    /// Creates an empty registry; backends are constructed on first
    /// request.
    pub fn new() -> Self {
        Self {
            backends: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached backend for `kind`, constructing and
    /// initialising it on first use.
    ///
    /// The whole lookup-or-create runs under the registry lock, so two
    /// threads racing on the same kind still converge on one instance.
    pub fn backend(&self, kind: BackendKind) -> Result<Arc<dyn Backend>, RuntimeError> {
        let mut backends = match self.backends.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = backends.get(&kind) {
            return Ok(Arc::clone(existing));
        }

        let created = Self::create(kind)?;
        created.init()?;
        info!(backend = %kind, "backend created and initialised");
        backends.insert(kind, Arc::clone(&created));
        Ok(created)
    }

    /// Returns the kinds this build can actually construct.
    pub fn available_kinds() -> Vec<BackendKind> {
        #[cfg(feature = "npu")]
        {
            vec![BackendKind::Dummy, BackendKind::Npu]
        }
        #[cfg(not(feature = "npu"))]
        {
            vec![BackendKind::Dummy]
        }
    }

    fn create(kind: BackendKind) -> Result<Arc<dyn Backend>, RuntimeError> {
        match kind {
            BackendKind::Dummy => Ok(Arc::new(DummyBackend::new())),
            #[cfg(feature = "npu")]
            BackendKind::Npu => {
                let count = backend::NpuBackend::device_count()?;
                if count == 0 {
                    return Err(RuntimeError::Config("no NPU devices present".into()));
                }
                // Single-device placement; multi-device scheduling is a
                // session-level concern, not a registry one.
                Ok(Arc::new(backend::NpuBackend::new(0)))
            }
            #[cfg(not(feature = "npu"))]
            BackendKind::Npu => Err(RuntimeError::BackendUnavailable("npu")),
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
