// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Opaque handles issued by backends.
//!
//! Handles are small copyable ids validated against the issuing
//! backend's tables. Representing device resources this way keeps
//! ownership checks in one place instead of trusting raw pointers at
//! every call site.

use std::fmt;

/// Opaque device memory handle returned by [`crate::Backend::alloc`].
///
/// Must not be dereferenced by callers and must be paired with exactly
/// one [`crate::Backend::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr(u64);

impl DevicePtr {
    /// Wraps a backend-internal address or table key.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the backend-internal value. Only the issuing backend may
    /// interpret it.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev:{:#x}", self.0)
    }
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a backend-internal table key.
            pub fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the backend-internal value.
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a loaded model within one backend.
    ModelId,
    "model"
);

id_type!(
    /// Identifies an ordered command stream within one backend.
    StreamId,
    "stream"
);

id_type!(
    /// Identifies a cross-stream synchronization event within one backend.
    EventId,
    "event"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ptr_roundtrip() {
        let p = DevicePtr::from_raw(0xdead_beef);
        assert_eq!(p.raw(), 0xdead_beef);
        assert_eq!(format!("{p}"), "dev:0xdeadbeef");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", ModelId::from_raw(3)), "model:3");
        assert_eq!(format!("{}", StreamId::from_raw(1)), "stream:1");
        assert_eq!(format!("{}", EventId::from_raw(7)), "event:7");
    }
}
