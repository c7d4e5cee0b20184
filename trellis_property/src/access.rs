// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reading and writing property values.

use trellis_units::{Dimension, Unit};

use crate::coerce;
use crate::descriptor::{Property, PropertyKind};
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::store::Extra;
use crate::units::UnitContext;
use crate::value::Value;

impl Property {
    /// Reads the value of this property on `dispatcher`.
    ///
    /// Numbers stored with a unit are returned resolved to pixels under the
    /// current metrics. Containers are returned as shared handles bound to
    /// this property: mutating them notifies its observers.
    pub fn get(&self, dispatcher: &Dispatcher) -> Result<Value, PropertyError> {
        self.ensure_linked(dispatcher)?;
        match self.kind() {
            PropertyKind::Alias(spec) => self.alias_get(dispatcher, spec),
            PropertyKind::ReferenceList(_) => self.reference_get(dispatcher),
            _ => Ok(self.current_value(dispatcher)),
        }
    }

    /// Validates, coerces and stores `value`, then dispatches if it changed.
    ///
    /// Returns `true` if the value changed. With force-dispatch the
    /// observers run even if it did not.
    pub fn set(&self, dispatcher: &Dispatcher, value: impl Into<Value>) -> Result<bool, PropertyError> {
        self.ensure_linked(dispatcher)?;
        let value = value.into();
        match self.kind() {
            PropertyKind::Alias(spec) => self.alias_set(dispatcher, spec, value),
            PropertyKind::ReferenceList(_) => self.reference_set(dispatcher, value),
            _ => self.store_value(dispatcher, value),
        }
    }

    fn store_value(&self, dispatcher: &Dispatcher, value: Value) -> Result<bool, PropertyError> {
        let stored = self.coerce(dispatcher, value)?;
        let metrics = UnitContext::metrics();
        let old = self.with_record(dispatcher, |record| {
            coerce::resolve(&record.value, &metrics)
        })?;
        let changed = !self.values_equal(&old, &coerce::resolve(&stored.value, &metrics));

        // Scalars are always replaced so a new unit tag sticks even when the
        // resolved value is equal; equal containers keep their identity.
        let keep_container = !changed && self.kind().is_container();
        self.with_record_mut(dispatcher, |record| {
            if !keep_container {
                record.value = stored.value;
            }
            if let Some(raw) = stored.raw {
                record.extra = Extra::Raw(raw);
            }
        })?;

        if changed || self.force_dispatch() {
            self.dispatch(dispatcher)?;
        }
        Ok(changed)
    }

    /// Called by a bound container after an in-place mutation.
    pub(crate) fn container_mutated(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        match self.kind() {
            PropertyKind::ReferenceList(_) => self.reference_write_back(dispatcher),
            PropertyKind::VariableList { length } => {
                let (value, previous) = self.with_record(dispatcher, |record| {
                    let previous = match &record.extra {
                        Extra::Raw(raw) => raw.clone(),
                        _ => Vec::new(),
                    };
                    (record.value.clone(), previous)
                })?;
                let Value::List(list) = value else {
                    return Ok(());
                };
                let metrics = UnitContext::metrics();
                let raw = match coerce::variable_list(&Value::List(list.clone()), *length) {
                    Ok(raw) => raw,
                    Err(message) => {
                        list.replace_silently(coerce::resolve_all(&previous, &metrics));
                        return Err(self.invalid(message));
                    }
                };
                list.replace_silently(coerce::resolve_all(&raw, &metrics));
                self.with_record_mut(dispatcher, |record| record.extra = Extra::Raw(raw))?;
                self.dispatch(dispatcher)
            }
            _ => self.dispatch(dispatcher),
        }
    }

    /// Called by the unit context after the metrics changed.
    pub(crate) fn metrics_changed(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        let Ok((scaled, list, raw)) = self.with_record(dispatcher, |record| {
            match (&record.extra, &record.value) {
                (Extra::Raw(raw), Value::List(list)) => (
                    raw.iter().any(coerce::is_scaled),
                    Some(list.clone()),
                    raw.clone(),
                ),
                _ => (coerce::is_scaled(&record.value), None, Vec::new()),
            }
        }) else {
            return Ok(());
        };
        if !scaled {
            return Ok(());
        }
        if let Some(list) = list {
            list.replace_silently(coerce::resolve_all(&raw, &UnitContext::metrics()));
        }
        log::trace!(
            "redispatching {} on {dispatcher:?} for new metrics",
            self.display_name()
        );
        self.dispatch(dispatcher)
    }

    /// Called through the internal observers installed by
    /// [`link_deps`](Self::link_deps).
    pub(crate) fn dependency_changed(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        match self.kind() {
            PropertyKind::Alias(spec) => self.alias_refresh(dispatcher, spec),
            PropertyKind::ReferenceList(_) => self.reference_refresh_and_dispatch(dispatcher),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Numeric extras
    // ========================================================================

    /// Returns the unit of the stored value (`px` for plain numbers).
    pub fn get_format(&self, dispatcher: &Dispatcher) -> Result<Unit, PropertyError> {
        Ok(self
            .get_dimension(dispatcher)?
            .map_or(Unit::Px, Dimension::unit))
    }

    /// Returns the stored value as an unresolved dimension, or `None` if it
    /// is not numeric.
    pub fn get_dimension(&self, dispatcher: &Dispatcher) -> Result<Option<Dimension>, PropertyError> {
        self.ensure_linked(dispatcher)?;
        self.with_record(dispatcher, |record| match &record.value {
            Value::Dimension(dimension) => Some(*dimension),
            other => other.as_f64().map(Dimension::px),
        })
    }

    /// Returns the lower bound in effect on `dispatcher`.
    pub fn get_min(&self, dispatcher: &Dispatcher) -> Result<Option<f64>, PropertyError> {
        Ok(self.bounds_on(dispatcher)?.0)
    }

    /// Returns the upper bound in effect on `dispatcher`.
    pub fn get_max(&self, dispatcher: &Dispatcher) -> Result<Option<f64>, PropertyError> {
        Ok(self.bounds_on(dispatcher)?.1)
    }

    /// Changes the lower bound on `dispatcher` only. The current value is not
    /// re-checked.
    pub fn set_min(&self, dispatcher: &Dispatcher, min: Option<f64>) -> Result<(), PropertyError> {
        self.update_bounds(dispatcher, |bounds| bounds.0 = min)
    }

    /// Changes the upper bound on `dispatcher` only. The current value is not
    /// re-checked.
    pub fn set_max(&self, dispatcher: &Dispatcher, max: Option<f64>) -> Result<(), PropertyError> {
        self.update_bounds(dispatcher, |bounds| bounds.1 = max)
    }

    fn bounds_on(&self, dispatcher: &Dispatcher) -> Result<(Option<f64>, Option<f64>), PropertyError> {
        let PropertyKind::BoundedNumeric(bounds) = self.kind() else {
            return Err(self.invalid("not a bounded numeric property"));
        };
        self.ensure_linked(dispatcher)?;
        Ok(self.current_bounds(dispatcher, bounds))
    }

    fn update_bounds(
        &self,
        dispatcher: &Dispatcher,
        update: impl FnOnce(&mut (Option<f64>, Option<f64>)),
    ) -> Result<(), PropertyError> {
        let mut bounds = self.bounds_on(dispatcher)?;
        update(&mut bounds);
        self.with_record_mut(dispatcher, |record| {
            record.extra = Extra::Bounds {
                min: bounds.0,
                max: bounds.1,
            };
        })
    }
}
