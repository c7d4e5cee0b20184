// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-instance property records.
//!
//! Each linked descriptor owns one [`PropertyRecord`] per instance, holding the
//! stored value, the observer list, the dependency subscriptions installed on
//! its behalf and a handful of state bits. Records are kept in a vector sorted
//! by [`PropertyId`] and found by binary search; typical instances link few
//! enough properties that the first eight live inline.

use std::rc::Rc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::descriptor::Property;
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::id::{ObserverId, PropertyId};
use crate::value::Value;

const INLINE_CAPACITY: usize = 8;

/// An observer callback as stored in a record.
pub(crate) type Callback = Rc<dyn Fn(&Dispatcher, &Value) -> Result<(), PropertyError>>;

bitflags! {
    /// Transient state of a record.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub(crate) struct RecordState: u8 {
        /// A dispatch pass is running.
        const DISPATCHING = 1 << 0;
        /// The value changed again while dispatching; run one more pass.
        const REDISPATCH = 1 << 1;
        /// The cached value is out of date.
        const STALE = 1 << 2;
        /// The value has been read at least once.
        const WATCHED = 1 << 3;
        /// Dependency notifications are ignored (reference list write-back).
        const SUPPRESS = 1 << 4;
        /// Dependency subscriptions are installed.
        const DEPS_LINKED = 1 << 5;
    }
}

pub(crate) struct Observer {
    pub(crate) id: ObserverId,
    pub(crate) callback: Callback,
}

/// An observer installed on another record on behalf of this one.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Subscription {
    pub(crate) target: PropertyId,
    pub(crate) observer: ObserverId,
}

/// Kind-specific per-instance data.
#[derive(Clone, Debug, Default)]
pub(crate) enum Extra {
    #[default]
    None,
    /// Bounds of a bounded numeric, adjustable per instance.
    Bounds { min: Option<f64>, max: Option<f64> },
    /// Last observed child values of a reference list.
    Snapshot(Vec<Value>),
    /// Unresolved elements of a variable list.
    Raw(Vec<Value>),
}

pub(crate) struct PropertyRecord {
    pub(crate) property: Property,
    pub(crate) value: Value,
    pub(crate) observers: SmallVec<[Observer; 2]>,
    pub(crate) subscriptions: SmallVec<[Subscription; 2]>,
    pub(crate) state: RecordState,
    pub(crate) extra: Extra,
}

impl PropertyRecord {
    pub(crate) fn new(property: Property, value: Value, extra: Extra) -> Self {
        Self {
            property,
            value,
            observers: SmallVec::new(),
            subscriptions: SmallVec::new(),
            state: RecordState::empty(),
            extra,
        }
    }

    pub(crate) fn has_observer(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|o| o.id == id)
    }

    /// Detaches an observer and hands it back, so the caller can drop the
    /// callback after releasing the store.
    pub(crate) fn remove_observer(&mut self, id: ObserverId) -> Option<Observer> {
        let index = self.observers.iter().position(|o| o.id == id)?;
        Some(self.observers.remove(index))
    }
}

/// The sorted record table of one instance.
#[derive(Default)]
pub(crate) struct PropertyStore {
    entries: SmallVec<[(PropertyId, PropertyRecord); INLINE_CAPACITY]>,
}

impl PropertyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn find(&self, id: PropertyId) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&id, |(pid, _)| *pid)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: PropertyId) -> bool {
        self.find(id).is_ok()
    }

    pub(crate) fn get(&self, id: PropertyId) -> Option<&PropertyRecord> {
        self.find(id).ok().map(|i| &self.entries[i].1)
    }

    pub(crate) fn get_mut(&mut self, id: PropertyId) -> Option<&mut PropertyRecord> {
        self.find(id).ok().map(|i| &mut self.entries[i].1)
    }

    /// Inserts a record unless one exists; returns `true` if inserted.
    pub(crate) fn insert(&mut self, record: PropertyRecord) -> bool {
        let id = record.property.id();
        match self.find(id) {
            Ok(_) => false,
            Err(i) => {
                self.entries.insert(i, (id, record));
                true
            }
        }
    }

    pub(crate) fn remove(&mut self, id: PropertyId) -> Option<PropertyRecord> {
        self.find(id).ok().map(|i| self.entries.remove(i).1)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &PropertyRecord> + '_ {
        self.entries.iter().map(|(_, record)| record)
    }
}

impl core::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(id, record)| (id, (record.property.display_name(), &record.value))),
            )
            .finish()
    }
}
