// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linking descriptors to instances.
//!
//! Linking creates the per-instance record of a descriptor, initialized from
//! its coerced default. Dependency linking is a second step: alias and
//! reference-list records subscribe to the records they depend on, through
//! internal observers that carry only the dependent descriptor.
//!
//! Class properties are linked in two passes when an instance is
//! constructed (every record first, then every dependency), so the
//! declaration order within a class does not matter. Properties added to a
//! class after an instance was built are linked on that instance the first
//! time they are accessed.

use std::rc::Rc;

use crate::class::check_name;
use crate::container::ObservableList;
use crate::descriptor::{Property, PropertyKind};
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::store::{Extra, PropertyRecord, RecordState, Subscription};
use crate::units::UnitContext;
use crate::value::Value;

impl Property {
    /// Attaches this descriptor to `dispatcher` under `name`.
    ///
    /// Assigns the name if the descriptor has none yet and creates the
    /// instance record from the default value. Linking an already linked
    /// descriptor leaves its record untouched. Dependencies are not linked;
    /// see [`Property::link_deps`] and [`Property::link_eagerly`].
    pub fn link(&self, dispatcher: &Dispatcher, name: &str) -> Result<(), PropertyError> {
        check_name(name)?;
        self.set_name(name);
        dispatcher.register_name(name, self);
        self.link_record(dispatcher).map(drop)
    }

    /// Links under the descriptor's own name, then links its dependencies.
    pub fn link_eagerly(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        let name = self.require_name()?.to_owned();
        self.link(dispatcher, &name)?;
        self.link_deps(dispatcher)
    }

    /// Subscribes this property's record to the records it depends on.
    ///
    /// Dependencies that are not linked yet are linked first. Calling this
    /// again is a no-op; properties without dependencies have nothing to do.
    pub fn link_deps(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        let already = self.with_record_mut(dispatcher, |record| {
            let already = record.state.contains(RecordState::DEPS_LINKED);
            record.state.insert(RecordState::DEPS_LINKED);
            already
        })?;
        if already {
            return Ok(());
        }
        let result = self.subscribe_all(dispatcher);
        if result.is_err() {
            self.with_record_mut(dispatcher, |record| {
                record.state.remove(RecordState::DEPS_LINKED);
            })?;
        }
        result
    }

    /// Detaches this descriptor from `dispatcher`.
    ///
    /// Drops the record with its value and observers, and removes the
    /// observers it had installed on its dependencies. Returns `false` if it
    /// was not linked.
    pub fn unlink(&self, dispatcher: &Dispatcher) -> bool {
        let Some(record) = dispatcher.store_mut().remove(self.id()) else {
            return false;
        };
        let removed = drop_subscriptions(dispatcher, &record.subscriptions);
        dispatcher.unregister_property(self);
        UnitContext::forget(dispatcher.id(), self.id());
        log::debug!(
            "unlinked {} from {dispatcher:?} ({} observers, {removed} subscriptions)",
            self.display_name(),
            record.observers.len()
        );
        drop(record);
        true
    }

    /// Re-resolves dependencies by name and re-evaluates, after one of them
    /// was replaced.
    pub(crate) fn relink_deps(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        let subscriptions = self.with_record_mut(dispatcher, |record| {
            record.state.remove(RecordState::DEPS_LINKED);
            record.state.insert(RecordState::STALE);
            core::mem::take(&mut record.subscriptions)
        })?;
        drop_subscriptions(dispatcher, &subscriptions);
        self.link_deps(dispatcher)?;
        self.dependency_changed(dispatcher)
    }

    /// Links this descriptor lazily if `dispatcher` publishes it under some
    /// name; fails if it does not.
    pub(crate) fn ensure_linked(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        if dispatcher.store().contains(self.id()) {
            return Ok(());
        }
        if !dispatcher.resolves(self) {
            return Err(self.unknown_on(dispatcher));
        }
        log::debug!("lazily linking {} on {dispatcher:?}", self.display_name());
        self.link_record(dispatcher)?;
        self.link_deps(dispatcher)
    }

    /// Creates the record if missing; returns `true` if it was created.
    pub(crate) fn link_record(&self, dispatcher: &Dispatcher) -> Result<bool, PropertyError> {
        if dispatcher.store().contains(self.id()) {
            return Ok(false);
        }
        let (value, extra, state) = match self.kind() {
            PropertyKind::Alias(_) => (Value::None, Extra::None, RecordState::STALE),
            PropertyKind::ReferenceList(_) => (
                Value::List(ObservableList::bound(Vec::new(), self.owner(dispatcher))),
                Extra::Snapshot(Vec::new()),
                RecordState::STALE,
            ),
            kind => {
                let stored = self.coerce(dispatcher, self.default_value().clone())?;
                let extra = match (kind, stored.raw) {
                    (PropertyKind::BoundedNumeric(bounds), _) => Extra::Bounds {
                        min: bounds.lower(),
                        max: bounds.upper(),
                    },
                    (_, Some(raw)) => Extra::Raw(raw),
                    _ => Extra::None,
                };
                (stored.value, extra, RecordState::empty())
            }
        };

        let mut record = PropertyRecord::new(self.clone(), value, extra);
        record.state = state;
        if !dispatcher.store_mut().insert(record) {
            return Ok(false);
        }
        if self.kind().is_unit_aware() {
            UnitContext::register(dispatcher, self);
        }
        log::trace!("linked {} on {dispatcher:?}", self.display_name());
        Ok(true)
    }

    /// Returns the descriptors this property depends on, as published on
    /// `dispatcher`.
    pub(crate) fn dependency_targets(
        &self,
        dispatcher: &Dispatcher,
    ) -> Result<Vec<Self>, PropertyError> {
        match self.kind() {
            PropertyKind::Alias(spec) => spec
                .dependencies()
                .iter()
                .map(|name| dispatcher.property(name))
                .collect(),
            PropertyKind::ReferenceList(children) => Ok(children
                .iter()
                .map(|child| {
                    child
                        .name()
                        .and_then(|name| dispatcher.lookup(name))
                        .unwrap_or_else(|| child.clone())
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn subscribe_all(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        let targets = self.dependency_targets(dispatcher)?;
        if targets.is_empty() {
            return Ok(());
        }
        for target in &targets {
            target.ensure_linked(dispatcher)?;
            let dependent = self.clone();
            let observer = target.add_observer(
                dispatcher,
                Rc::new(move |dispatcher: &Dispatcher, _: &Value| {
                    dependent.dependency_changed(dispatcher)
                }),
            )?;
            self.with_record_mut(dispatcher, |record| {
                record.subscriptions.push(Subscription {
                    target: target.id(),
                    observer,
                });
            })?;
        }
        log::debug!(
            "{} on {dispatcher:?} follows {:?}",
            self.display_name(),
            targets.iter().map(Self::display_name).collect::<Vec<_>>()
        );
        Ok(())
    }

    pub(crate) fn with_record_mut<R>(
        &self,
        dispatcher: &Dispatcher,
        f: impl FnOnce(&mut PropertyRecord) -> R,
    ) -> Result<R, PropertyError> {
        let mut store = dispatcher.store_mut();
        let record = store
            .get_mut(self.id())
            .ok_or_else(|| self.unknown_on(dispatcher))?;
        Ok(f(record))
    }

    pub(crate) fn with_record<R>(
        &self,
        dispatcher: &Dispatcher,
        f: impl FnOnce(&PropertyRecord) -> R,
    ) -> Result<R, PropertyError> {
        let store = dispatcher.store();
        let record = store
            .get(self.id())
            .ok_or_else(|| self.unknown_on(dispatcher))?;
        Ok(f(record))
    }

    pub(crate) fn unknown_on(&self, dispatcher: &Dispatcher) -> PropertyError {
        PropertyError::UnknownProperty {
            owner: dispatcher.class().name().to_owned(),
            name: self.display_name().to_owned(),
        }
    }
}

/// Removes the observers behind `subscriptions`; returns how many were found.
fn drop_subscriptions(dispatcher: &Dispatcher, subscriptions: &[Subscription]) -> usize {
    let removed: Vec<_> = {
        let mut store = dispatcher.store_mut();
        subscriptions
            .iter()
            .filter_map(|sub| store.get_mut(sub.target)?.remove_observer(sub.observer))
            .collect()
    };
    // Callbacks are released outside the store borrow.
    let count = removed.len();
    drop(removed);
    count
}
