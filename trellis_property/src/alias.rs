// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Computed (alias) properties.
//!
//! The record of an alias holds the last computed value and two state bits:
//! `STALE` (a dependency changed since the value was computed, or it never
//! was) and `WATCHED` (the alias has been read at least once).

use crate::descriptor::{AliasSpec, Property};
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::store::RecordState;
use crate::value::Value;

impl Property {
    pub(crate) fn alias_get(
        &self,
        dispatcher: &Dispatcher,
        spec: &AliasSpec,
    ) -> Result<Value, PropertyError> {
        let cached = self.with_record_mut(dispatcher, |record| {
            record.state.insert(RecordState::WATCHED);
            (spec.cache && !record.state.contains(RecordState::STALE))
                .then(|| record.value.clone())
        })?;
        if let Some(value) = cached {
            return Ok(value);
        }
        self.evaluate(dispatcher, spec)
    }

    pub(crate) fn alias_set(
        &self,
        dispatcher: &Dispatcher,
        spec: &AliasSpec,
        value: Value,
    ) -> Result<bool, PropertyError> {
        let Some(setter) = &spec.setter else {
            return Err(PropertyError::ReadOnly {
                property: self.display_name().to_owned(),
            });
        };
        let changed = setter(dispatcher, value)?;
        if changed || self.force_dispatch() {
            self.evaluate(dispatcher, spec)?;
            self.dispatch(dispatcher)?;
        }
        Ok(changed)
    }

    /// Reacts to a change of one of the alias dependencies.
    pub(crate) fn alias_refresh(
        &self,
        dispatcher: &Dispatcher,
        spec: &AliasSpec,
    ) -> Result<(), PropertyError> {
        let (old, watched) = self.with_record_mut(dispatcher, |record| {
            let watched = spec.watch_before_use || record.state.contains(RecordState::WATCHED);
            if !watched {
                record.state.insert(RecordState::STALE);
            }
            (record.value.clone(), watched)
        })?;
        if !watched {
            log::trace!("{} is not watched yet; marked stale", self.display_name());
            return Ok(());
        }
        let new = self.evaluate(dispatcher, spec)?;
        if self.force_dispatch() || !self.values_equal(&old, &new) {
            self.dispatch(dispatcher)?;
        }
        Ok(())
    }

    /// Calls the getter and stores the result as the fresh value.
    fn evaluate(&self, dispatcher: &Dispatcher, spec: &AliasSpec) -> Result<Value, PropertyError> {
        let value = (spec.getter)(dispatcher)?;
        self.with_record_mut(dispatcher, |record| {
            record.value = value.clone();
            record.state.remove(RecordState::STALE);
        })?;
        Ok(value)
    }
}
