// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identification types.
//!
//! [`PropertyId`] identifies a descriptor, [`ObserverId`] a registered
//! observer, and [`InstanceId`] a dispatcher instance. All three are allocated
//! from process-wide counters and never reused.

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

static NEXT_PROPERTY: AtomicU32 = AtomicU32::new(0);
static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identifies a property descriptor.
///
/// Per-instance records are keyed by this id rather than by attribute name,
/// so one descriptor published under two names shares a single record.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u32);

impl PropertyId {
    /// Allocates a fresh id.
    pub(crate) fn next() -> Self {
        Self(NEXT_PROPERTY.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying index of this id.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// Handle returned when binding an observer; pass it back to unbind.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObserverId").field(&self.0).finish()
    }
}

/// Identifies a dispatcher instance for the lifetime of the process.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InstanceId").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = PropertyId::next();
        let b = PropertyId::next();
        assert_ne!(a, b);
        assert!(b > a);

        assert_ne!(ObserverId::next(), ObserverId::next());
        assert_ne!(InstanceId::next(), InstanceId::next());
    }

    #[test]
    fn property_id_display() {
        let id = PropertyId(42);
        assert_eq!(format!("{id}"), "PropertyId(42)");
        assert_eq!(format!("{id:?}"), "PropertyId(42)");
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn id_sizes() {
        use core::mem::size_of;
        assert_eq!(size_of::<PropertyId>(), 4);
        assert_eq!(size_of::<ObserverId>(), 8);
    }
}
