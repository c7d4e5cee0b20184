// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-list properties: a list view over several child properties.

use crate::descriptor::Property;
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::store::{Extra, RecordState};
use crate::value::Value;

impl Property {
    pub(crate) fn reference_get(&self, dispatcher: &Dispatcher) -> Result<Value, PropertyError> {
        let stale = self.with_record(dispatcher, |record| {
            record.state.contains(RecordState::STALE)
        })?;
        if stale {
            self.reference_refresh(dispatcher)?;
        }
        self.with_record(dispatcher, |record| record.value.clone())
    }

    pub(crate) fn reference_set(
        &self,
        dispatcher: &Dispatcher,
        value: Value,
    ) -> Result<bool, PropertyError> {
        match value {
            Value::List(list) => self.reference_assign(dispatcher, list.to_vec()),
            other => Err(self.invalid(format!(
                "ReferenceListProperty accepts only list, got {}",
                other.type_name()
            ))),
        }
    }

    /// Writes an in-place edit of the returned list back to the children.
    pub(crate) fn reference_write_back(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        let Value::List(list) = self.with_record(dispatcher, |record| record.value.clone())? else {
            return Ok(());
        };
        self.reference_assign(dispatcher, list.to_vec()).map(drop)
    }

    /// Sets every child in order, then dispatches once.
    fn reference_assign(
        &self,
        dispatcher: &Dispatcher,
        values: Vec<Value>,
    ) -> Result<bool, PropertyError> {
        let children = self.dependency_targets(dispatcher)?;
        if values.len() != children.len() {
            self.reference_refresh(dispatcher)?;
            return Err(self.invalid(format!(
                "expected {} values, got {}",
                children.len(),
                values.len()
            )));
        }

        self.with_record_mut(dispatcher, |record| {
            record.state.insert(RecordState::SUPPRESS);
        })?;
        let result = children
            .iter()
            .zip(values)
            .try_for_each(|(child, value)| child.set(dispatcher, value).map(drop));
        self.with_record_mut(dispatcher, |record| {
            record.state.remove(RecordState::SUPPRESS);
        })?;

        let changed = self.reference_refresh(dispatcher)?;
        result?;
        if changed || self.force_dispatch() {
            self.dispatch(dispatcher)?;
        }
        Ok(changed)
    }

    /// Called when one of the children dispatched.
    pub(crate) fn reference_refresh_and_dispatch(
        &self,
        dispatcher: &Dispatcher,
    ) -> Result<(), PropertyError> {
        let suppressed = self.with_record(dispatcher, |record| {
            record.state.contains(RecordState::SUPPRESS)
        })?;
        if suppressed {
            return Ok(());
        }
        if self.reference_refresh(dispatcher)? || self.force_dispatch() {
            self.dispatch(dispatcher)?;
        }
        Ok(())
    }

    /// Re-reads the children into the list; returns `true` if any differed
    /// from the last snapshot.
    fn reference_refresh(&self, dispatcher: &Dispatcher) -> Result<bool, PropertyError> {
        let values = self
            .dependency_targets(dispatcher)?
            .iter()
            .map(|child| child.get(dispatcher))
            .collect::<Result<Vec<_>, _>>()?;
        let (list, changed) = self.with_record_mut(dispatcher, |record| {
            let changed = !matches!(&record.extra, Extra::Snapshot(old) if *old == values);
            record.extra = Extra::Snapshot(values.clone());
            record.state.remove(RecordState::STALE);
            (record.value.clone(), changed)
        })?;
        if let Value::List(list) = list {
            list.replace_silently(values);
        }
        Ok(changed)
    }
}
