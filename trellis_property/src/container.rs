// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observable list and dict proxies.
//!
//! A container returned by a list, dict, color or reference-list property is
//! bound to its owner: every logical mutation is applied in place and then
//! reported to the owning property exactly once, which redispatches it. The
//! interior borrow is always released before the owner is notified, so
//! observers are free to read (or mutate) the same container.
//!
//! Containers created directly with [`ObservableList::new`] or
//! [`ObservableDict::new`] are unbound; assigning one to a property copies
//! its contents into a fresh bound container.

use core::fmt;
use core::ops::{Bound, RangeBounds};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::descriptor::Property;
use crate::dispatcher::WeakDispatcher;
use crate::error::PropertyError;
use crate::value::Value;

/// The property (on a particular instance) that owns a bound container.
pub(crate) struct Owner {
    instance: WeakDispatcher,
    property: Property,
}

impl Owner {
    pub(crate) fn new(instance: WeakDispatcher, property: Property) -> Self {
        Self { instance, property }
    }

    fn notify(&self) -> Result<(), PropertyError> {
        match self.instance.upgrade() {
            Some(dispatcher) => self.property.container_mutated(&dispatcher),
            None => {
                log::debug!(
                    "container of {} mutated after its owner was dropped",
                    self.property.display_name()
                );
                Ok(())
            }
        }
    }
}

fn notify(owner: Option<&Owner>) -> Result<(), PropertyError> {
    owner.map_or(Ok(()), Owner::notify)
}

// ============================================================================
// ObservableList
// ============================================================================

struct ListInner {
    items: RefCell<Vec<Value>>,
    owner: Option<Owner>,
}

/// A shared list that reports mutations to its owning property.
///
/// Cloning the handle shares the list.
///
/// # Example
///
/// ```
/// use trellis_property::{ClassBuilder, Dispatcher, Property};
/// use std::{cell::Cell, rc::Rc};
///
/// let class = ClassBuilder::new("Widget")
///     .property("items", Property::list(Vec::<i64>::new()).build())
///     .build()
///     .unwrap();
/// let widget = Dispatcher::new(&class).unwrap();
///
/// let fired = Rc::new(Cell::new(0));
/// let counter = fired.clone();
/// widget.bind("items", move |_, _| counter.set(counter.get() + 1)).unwrap();
///
/// let items = widget.get("items").unwrap();
/// let list = items.as_list().unwrap();
/// list.push(1).unwrap();
/// list.extend([2, 3]).unwrap();
/// assert_eq!(fired.get(), 2);
/// assert_eq!(list.len(), 3);
/// ```
#[derive(Clone)]
pub struct ObservableList(Rc<ListInner>);

impl ObservableList {
    /// Creates an unbound list.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(ListInner {
            items: RefCell::new(items),
            owner: None,
        }))
    }

    pub(crate) fn bound(items: Vec<Value>, owner: Owner) -> Self {
        Self(Rc::new(ListInner {
            items: RefCell::new(items),
            owner: Some(owner),
        }))
    }

    /// Returns `true` if the list reports mutations to a property.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.0.owner.is_some()
    }

    /// Returns `true` if both handles share one list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn contents_eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.items.borrow() == *other.0.items.borrow()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Returns a copy of the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    /// Returns `true` if some element equals `value`.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.items.borrow().contains(value)
    }

    /// Returns a copy of the elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Replaces the element at `index`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<(), PropertyError> {
        {
            let mut items = self.0.items.borrow_mut();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(PropertyError::IndexOutOfRange { index, len })?;
            *slot = value.into();
        }
        self.notify()
    }

    /// Replaces the elements in `range` with `values`.
    ///
    /// `list.set_slice(.., values)` replaces the whole contents.
    pub fn set_slice<T: Into<Value>>(
        &self,
        range: impl RangeBounds<usize>,
        values: impl IntoIterator<Item = T>,
    ) -> Result<(), PropertyError> {
        {
            let mut items = self.0.items.borrow_mut();
            let len = items.len();
            let after = |index: usize| {
                index
                    .checked_add(1)
                    .ok_or(PropertyError::IndexOutOfRange { index, len })
            };
            let start = match range.start_bound() {
                Bound::Included(&i) => i,
                Bound::Excluded(&i) => after(i)?,
                Bound::Unbounded => 0,
            };
            let end = match range.end_bound() {
                Bound::Included(&i) => after(i)?,
                Bound::Excluded(&i) => i,
                Bound::Unbounded => len,
            };
            if end > len {
                return Err(PropertyError::IndexOutOfRange { index: end, len });
            }
            if start > end {
                return Err(PropertyError::IndexOutOfRange { index: start, len });
            }
            items.splice(start..end, values.into_iter().map(Into::into));
        }
        self.notify()
    }

    /// Appends an element.
    pub fn push(&self, value: impl Into<Value>) -> Result<(), PropertyError> {
        self.0.items.borrow_mut().push(value.into());
        self.notify()
    }

    /// Inserts an element at `index`, shifting later elements.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(), PropertyError> {
        {
            let mut items = self.0.items.borrow_mut();
            if index > items.len() {
                return Err(PropertyError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value.into());
        }
        self.notify()
    }

    /// Appends every element of `values` with a single notification.
    pub fn extend<T: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = T>,
    ) -> Result<(), PropertyError> {
        self.0
            .items
            .borrow_mut()
            .extend(values.into_iter().map(Into::into));
        self.notify()
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&self, index: usize) -> Result<Value, PropertyError> {
        let removed = {
            let mut items = self.0.items.borrow_mut();
            if index >= items.len() {
                return Err(PropertyError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        self.notify()?;
        Ok(removed)
    }

    /// Removes and returns the last element; an empty list is left alone.
    pub fn pop(&self) -> Result<Option<Value>, PropertyError> {
        let Some(value) = self.0.items.borrow_mut().pop() else {
            return Ok(None);
        };
        self.notify()?;
        Ok(Some(value))
    }

    /// Removes every element.
    pub fn clear(&self) -> Result<(), PropertyError> {
        self.0.items.borrow_mut().clear();
        self.notify()
    }

    /// Reverses the elements in place.
    pub fn reverse(&self) -> Result<(), PropertyError> {
        self.0.items.borrow_mut().reverse();
        self.notify()
    }

    /// Sorts the elements with `compare`.
    pub fn sort_by(
        &self,
        compare: impl FnMut(&Value, &Value) -> core::cmp::Ordering,
    ) -> Result<(), PropertyError> {
        // Sorted outside the cell so `compare` may read the list.
        let mut items = core::mem::take(&mut *self.0.items.borrow_mut());
        items.sort_by(compare);
        *self.0.items.borrow_mut() = items;
        self.notify()
    }

    /// Overwrites the contents without notifying.
    pub(crate) fn replace_silently(&self, items: Vec<Value>) {
        *self.0.items.borrow_mut() = items;
    }

    fn notify(&self) -> Result<(), PropertyError> {
        notify(self.0.owner.as_ref())
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

// ============================================================================
// ObservableDict
// ============================================================================

struct DictInner {
    entries: RefCell<BTreeMap<String, Value>>,
    owner: Option<Owner>,
}

/// A shared string-keyed map that reports mutations to its owning property.
#[derive(Clone)]
pub struct ObservableDict(Rc<DictInner>);

impl ObservableDict {
    /// Creates an unbound dict.
    #[must_use]
    pub fn new(entries: BTreeMap<String, Value>) -> Self {
        Self(Rc::new(DictInner {
            entries: RefCell::new(entries),
            owner: None,
        }))
    }

    pub(crate) fn bound(entries: BTreeMap<String, Value>, owner: Owner) -> Self {
        Self(Rc::new(DictInner {
            entries: RefCell::new(entries),
            owner: Some(owner),
        }))
    }

    /// Returns `true` if the dict reports mutations to a property.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.0.owner.is_some()
    }

    /// Returns `true` if both handles share one dict.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn contents_eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.entries.borrow() == *other.0.entries.borrow()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    /// Returns `true` if the dict is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.entries.borrow().is_empty()
    }

    /// Returns a copy of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.entries.borrow().get(key).cloned()
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.borrow().contains_key(key)
    }

    /// Returns the keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.entries.borrow().keys().cloned().collect()
    }

    /// Returns a copy of the entries.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.0.entries.borrow().clone()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, PropertyError> {
        let previous = self
            .0
            .entries
            .borrow_mut()
            .insert(key.into(), value.into());
        self.notify()?;
        Ok(previous)
    }

    /// Removes `key`. Removing a missing key does not notify.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, PropertyError> {
        let Some(removed) = self.0.entries.borrow_mut().remove(key) else {
            return Ok(None);
        };
        self.notify()?;
        Ok(Some(removed))
    }

    /// Removes `key` and returns its value, or `default` if it was missing.
    pub fn pop(&self, key: &str, default: impl Into<Value>) -> Result<Value, PropertyError> {
        Ok(self.remove(key)?.unwrap_or_else(|| default.into()))
    }

    /// Inserts every entry with a single notification.
    pub fn update<K: Into<String>, V: Into<Value>>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), PropertyError> {
        self.0
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.notify()
    }

    /// Removes every entry.
    pub fn clear(&self) -> Result<(), PropertyError> {
        self.0.entries.borrow_mut().clear();
        self.notify()
    }

    /// Returns the value under `key`, inserting `default` first if missing.
    ///
    /// Only an insertion notifies.
    pub fn set_default(
        &self,
        key: impl Into<String>,
        default: impl Into<Value>,
    ) -> Result<Value, PropertyError> {
        let key = key.into();
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }
        let value = default.into();
        self.0.entries.borrow_mut().insert(key, value.clone());
        self.notify()?;
        Ok(value)
    }

    fn notify(&self) -> Result<(), PropertyError> {
        notify(self.0.owner.as_ref())
    }
}

impl fmt::Debug for ObservableDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.entries.try_borrow() {
            Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
            Err(_) => f.write_str("{<borrowed>}"),
        }
    }
}
