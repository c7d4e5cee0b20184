// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observers and change dispatch.
//!
//! Observers run synchronously, in registration order, with the instance and
//! the current value. The observer list is snapshotted when a pass starts:
//! observers bound during the pass wait for the next one, observers unbound
//! during the pass are skipped.
//!
//! A dispatch requested for a record that is already dispatching is
//! coalesced: the running pass finishes, then exactly one more pass runs with
//! whatever value is current by then.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::coerce;
use crate::descriptor::{Property, PropertyKind};
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::id::ObserverId;
use crate::store::{Callback, Observer, RecordState};
use crate::units::UnitContext;
use crate::value::Value;

/// Upper bound on coalesced passes of one dispatch; observers that keep
/// changing the value they observe are cut off here.
const MAX_COALESCED_PASSES: usize = 64;

impl Property {
    /// Notifies the observers of this property on `dispatcher` with its
    /// current value, whether or not it changed.
    pub fn dispatch(&self, dispatcher: &Dispatcher) -> Result<(), PropertyError> {
        self.ensure_linked(dispatcher)?;
        let mut passes = 0;
        loop {
            let observers: SmallVec<[(ObserverId, Callback); 4]> = {
                let mut store = dispatcher.store_mut();
                let Some(record) = store.get_mut(self.id()) else {
                    return Ok(());
                };
                if record.state.contains(RecordState::DISPATCHING) {
                    record.state.insert(RecordState::REDISPATCH);
                    log::trace!("coalescing dispatch of {}", self.display_name());
                    return Ok(());
                }
                record.state.insert(RecordState::DISPATCHING);
                record
                    .observers
                    .iter()
                    .map(|o| (o.id, o.callback.clone()))
                    .collect()
            };

            let value = self.current_value(dispatcher);
            log::trace!(
                "dispatching {} = {value} on {dispatcher:?} to {} observers",
                self.display_name(),
                observers.len()
            );
            let result = self.notify(dispatcher, &value, &observers);

            let again = dispatcher
                .store_mut()
                .get_mut(self.id())
                .is_some_and(|record| {
                    let again = record.state.contains(RecordState::REDISPATCH);
                    record
                        .state
                        .remove(RecordState::DISPATCHING | RecordState::REDISPATCH);
                    again
                });
            result?;
            if !again {
                return Ok(());
            }
            passes += 1;
            if passes >= MAX_COALESCED_PASSES {
                log::warn!(
                    "{} on {dispatcher:?} kept changing during dispatch; giving up after {passes} passes",
                    self.display_name()
                );
                return Ok(());
            }
        }
    }

    fn notify(
        &self,
        dispatcher: &Dispatcher,
        value: &Value,
        observers: &[(ObserverId, Callback)],
    ) -> Result<(), PropertyError> {
        for (id, callback) in observers {
            let bound = dispatcher
                .store()
                .get(self.id())
                .is_some_and(|record| record.has_observer(*id));
            if bound {
                callback(dispatcher, value)?;
            }
        }
        Ok(())
    }

    /// The value handed to observers and returned by plain reads: the stored
    /// value, with unit-tagged numbers resolved to pixels.
    pub(crate) fn current_value(&self, dispatcher: &Dispatcher) -> Value {
        let store = dispatcher.store();
        let Some(record) = store.get(self.id()) else {
            return Value::None;
        };
        match self.kind() {
            PropertyKind::Numeric => coerce::resolve(&record.value, &UnitContext::metrics()),
            _ => record.value.clone(),
        }
    }

    /// Registers an observer of this property on `dispatcher`.
    ///
    /// Observers run only when the value changes (or on every set with
    /// force-dispatch, or on an explicit [`dispatch`](Self::dispatch)).
    ///
    /// ```
    /// use trellis_property::{Dispatcher, Property, Value};
    /// use std::{cell::Cell, rc::Rc};
    ///
    /// let d = Dispatcher::bare();
    /// let size = Property::numeric(0).build();
    /// size.link(&d, "size").unwrap();
    ///
    /// let calls = Rc::new(Cell::new(0));
    /// let counter = calls.clone();
    /// let id = size.bind(&d, move |_, _| counter.set(counter.get() + 1)).unwrap();
    ///
    /// size.set(&d, 1).unwrap();
    /// size.set(&d, 1).unwrap();
    /// assert_eq!(calls.get(), 1);
    ///
    /// assert!(size.unbind(&d, id));
    /// size.set(&d, 2).unwrap();
    /// assert_eq!(calls.get(), 1);
    /// ```
    pub fn bind(
        &self,
        dispatcher: &Dispatcher,
        callback: impl Fn(&Dispatcher, &Value) + 'static,
    ) -> Result<ObserverId, PropertyError> {
        self.try_bind(dispatcher, move |dispatcher: &Dispatcher, value: &Value| {
            callback(dispatcher, value);
            Ok(())
        })
    }

    /// Registers a fallible observer. An error aborts the rest of the
    /// dispatch and is returned from the operation that triggered it; the
    /// stored value is not rolled back.
    pub fn try_bind(
        &self,
        dispatcher: &Dispatcher,
        callback: impl Fn(&Dispatcher, &Value) -> Result<(), PropertyError> + 'static,
    ) -> Result<ObserverId, PropertyError> {
        self.ensure_linked(dispatcher)?;
        self.add_observer(dispatcher, Rc::new(callback))
    }

    /// Registers an observer that receives `args` ahead of the instance and
    /// value.
    pub fn fbind(
        &self,
        dispatcher: &Dispatcher,
        args: Vec<Value>,
        callback: impl Fn(&[Value], &Dispatcher, &Value) + 'static,
    ) -> Result<ObserverId, PropertyError> {
        self.bind(dispatcher, move |dispatcher: &Dispatcher, value: &Value| {
            callback(&args, dispatcher, value);
        })
    }

    /// Removes an observer; returns `false` if it was not bound here.
    pub fn unbind(&self, dispatcher: &Dispatcher, observer: ObserverId) -> bool {
        let removed = dispatcher
            .store_mut()
            .get_mut(self.id())
            .and_then(|record| record.remove_observer(observer));
        removed.is_some()
    }

    /// Returns how many observers are bound, including the internal ones
    /// installed by dependent aliases and reference lists.
    pub fn observer_count(&self, dispatcher: &Dispatcher) -> Result<usize, PropertyError> {
        self.ensure_linked(dispatcher)?;
        self.with_record(dispatcher, |record| record.observers.len())
    }

    pub(crate) fn add_observer(
        &self,
        dispatcher: &Dispatcher,
        callback: Callback,
    ) -> Result<ObserverId, PropertyError> {
        let id = ObserverId::next();
        self.with_record_mut(dispatcher, |record| {
            record.observers.push(Observer { id, callback });
        })?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::WeakDispatcher;
    use std::cell::{Cell, RefCell};

    fn counter() -> (Rc<Cell<usize>>, impl Fn(&Dispatcher, &Value) + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move |_: &Dispatcher, _: &Value| c.set(c.get() + 1))
    }

    #[test]
    fn observers_run_in_registration_order() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            prop.bind(&d, move |_, _| order.borrow_mut().push(i)).unwrap();
        }
        prop.set(&d, 1).unwrap();
        assert_eq!(*order.borrow(), [0, 1, 2]);
    }

    #[test]
    fn explicit_dispatch_fires_without_change() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();
        let (count, cb) = counter();
        prop.bind(&d, cb).unwrap();
        prop.dispatch(&d).unwrap();
        prop.dispatch(&d).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn force_dispatch_fires_on_equal_set() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).force_dispatch(true).build();
        prop.link(&d, "n").unwrap();
        let (count, cb) = counter();
        prop.bind(&d, cb).unwrap();
        prop.set(&d, 0).unwrap();
        prop.set(&d, 0).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn reentrant_set_is_coalesced() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        prop.bind(&d, move |_, v| log.borrow_mut().push(v.clone())).unwrap();

        let inner = prop.clone();
        prop.try_bind(&d, move |d, v| {
            if v.as_f64() == Some(1.0) {
                inner.set(d, 2)?;
                inner.set(d, 3)?;
            }
            Ok(())
        })
        .unwrap();

        prop.set(&d, 1).unwrap();
        assert_eq!(*seen.borrow(), [Value::from(1), Value::from(3)]);
        assert_eq!(prop.get(&d).unwrap(), Value::from(3));
    }

    #[test]
    fn unbound_during_pass_is_skipped() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();

        let victim: Rc<Cell<Option<ObserverId>>> = Rc::new(Cell::new(None));
        let target = victim.clone();
        let unbinder = prop.clone();
        prop.bind(&d, move |d, _| {
            if let Some(id) = target.get() {
                unbinder.unbind(d, id);
            }
        })
        .unwrap();
        let (count, cb) = counter();
        victim.set(Some(prop.bind(&d, cb).unwrap()));

        prop.set(&d, 1).unwrap();
        assert_eq!(count.get(), 0);
        assert_eq!(prop.observer_count(&d).unwrap(), 1);
    }

    #[test]
    fn unbound_callback_is_dropped_outside_the_store() {
        struct ReadOnDrop(Property, WeakDispatcher, Rc<Cell<bool>>);
        impl Drop for ReadOnDrop {
            fn drop(&mut self) {
                if let Some(d) = self.1.upgrade() {
                    self.2.set(self.0.get(&d).is_ok());
                }
            }
        }

        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();
        let read = Rc::new(Cell::new(false));
        let guard = ReadOnDrop(prop.clone(), d.downgrade(), read.clone());
        let id = prop
            .bind(&d, move |_, _| {
                let _keep = &guard;
            })
            .unwrap();

        assert!(prop.unbind(&d, id));
        assert!(read.get());
        assert!(!prop.unbind(&d, id));
        assert_eq!(prop.observer_count(&d).unwrap(), 0);
    }

    #[test]
    fn observer_error_propagates_without_rollback() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();
        prop.try_bind(&d, |_, _| Err(PropertyError::callback("boom")))
            .unwrap();
        let (count, cb) = counter();
        prop.bind(&d, cb).unwrap();

        let err = prop.set(&d, 5).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(count.get(), 0);
        assert_eq!(prop.get(&d).unwrap(), Value::from(5));
        // The record is not left in the dispatching state.
        prop.set(&d, 6).unwrap_err();
        assert_eq!(prop.get(&d).unwrap(), Value::from(6));
    }

    #[test]
    fn fbind_passes_extra_args() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        prop.fbind(&d, vec![Value::from("tag"), Value::from(7)], move |args, _, v| {
            log.borrow_mut().push((args.to_vec(), v.clone()));
        })
        .unwrap();
        prop.set(&d, 3).unwrap();
        assert_eq!(
            *seen.borrow(),
            [(vec![Value::from("tag"), Value::from(7)], Value::from(3))]
        );
    }

    #[test]
    fn runaway_dispatch_is_cut_off() {
        let d = Dispatcher::bare();
        let prop = Property::numeric(0).build();
        prop.link(&d, "n").unwrap();
        let inner = prop.clone();
        prop.try_bind(&d, move |d, v| {
            let next = v.as_f64().unwrap_or(0.0) + 1.0;
            inner.set(d, next).map(drop)
        })
        .unwrap();
        prop.set(&d, 1).unwrap();
        let value = prop.get(&d).unwrap().as_f64().unwrap();
        assert!(value > 1.0 && value < 200.0);
    }
}
