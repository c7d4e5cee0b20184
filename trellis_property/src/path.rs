// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Watching a chain of properties, such as `button.state`.
//!
//! A [`PathWatch`] subscribes to every property along the path. When a
//! rebindable property in the chain changes, the part of the chain behind it
//! is dropped and rebuilt from the new value; a property that is not
//! rebindable keeps the subscriptions it was built with.

use core::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::descriptor::Property;
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::id::ObserverId;
use crate::value::Value;

struct Link {
    depth: usize,
    dispatcher: Dispatcher,
    property: Property,
    observer: ObserverId,
}

impl Link {
    fn release(&self) {
        self.property.unbind(&self.dispatcher, self.observer);
    }
}

struct Inner {
    root: Dispatcher,
    path: Vec<String>,
    callback: Box<dyn Fn(&Value)>,
    links: RefCell<Vec<Link>>,
}

/// Calls back with the value at the end of a property path whenever any
/// property along the path changes.
///
/// Each segment is resolved on the current value: on a [`Dispatcher`] it
/// names a property (which is observed), on a dict it names a key. Any other
/// value ends the chain, and the watched value is `None`.
///
/// # Example
///
/// ```
/// use trellis_property::{ClassBuilder, Dispatcher, PathWatch, Property, Value};
/// use std::{cell::RefCell, rc::Rc};
///
/// let button_class = ClassBuilder::new("Button")
///     .property("state", Property::options("normal", ["normal", "down"]).build())
///     .build()
///     .unwrap();
/// let holder_class = ClassBuilder::new("Holder")
///     .property("button", Property::object(Value::None).rebind(true).build())
///     .build()
///     .unwrap();
///
/// let holder = Dispatcher::new(&holder_class).unwrap();
/// let button = Dispatcher::new(&button_class).unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = seen.clone();
/// let watch = PathWatch::new(&holder, ["button", "state"], move |value| {
///     log.borrow_mut().push(value.clone());
/// })
/// .unwrap();
/// assert_eq!(watch.value().unwrap(), Value::None);
///
/// holder.set("button", button.clone()).unwrap();
/// button.set("state", "down").unwrap();
/// assert_eq!(*seen.borrow(), [Value::from("normal"), Value::from("down")]);
/// ```
pub struct PathWatch {
    inner: Rc<Inner>,
}

impl PathWatch {
    /// Starts watching `path` from `root`.
    ///
    /// Fails if a segment names an unknown property of a dispatcher on the
    /// path.
    pub fn new<S: Into<String>>(
        root: &Dispatcher,
        path: impl IntoIterator<Item = S>,
        callback: impl Fn(&Value) + 'static,
    ) -> Result<Self, PropertyError> {
        let inner = Rc::new(Inner {
            root: root.clone(),
            path: path.into_iter().map(Into::into).collect(),
            callback: Box::new(callback),
            links: RefCell::new(Vec::new()),
        });
        let links = Inner::attach(&inner, 0, Value::Dispatcher(root.clone()))?;
        *inner.links.borrow_mut() = links;
        Ok(Self { inner })
    }

    /// Resolves the path now.
    pub fn value(&self) -> Result<Value, PropertyError> {
        self.inner.resolve()
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.inner.path
    }

    /// Returns how many properties are currently observed.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.links.borrow().len()
    }
}

impl Drop for PathWatch {
    fn drop(&mut self) {
        let links = core::mem::take(&mut *self.inner.links.borrow_mut());
        for link in &links {
            link.release();
        }
    }
}

impl fmt::Debug for PathWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathWatch")
            .field("root", &self.inner.root)
            .field("path", &self.inner.path)
            .field("subscriptions", &self.subscription_count())
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Subscribes to the segments from `from` on, starting at `current`.
    fn attach(this: &Rc<Self>, from: usize, mut current: Value) -> Result<Vec<Link>, PropertyError> {
        let mut links = Vec::new();
        for (depth, segment) in this.path.iter().enumerate().skip(from) {
            current = match current {
                Value::Dispatcher(dispatcher) => {
                    let property = dispatcher.property(segment)?;
                    let watch = Rc::downgrade(this);
                    let observer = property.try_bind(&dispatcher, move |_, value| {
                        Weak::upgrade(&watch).map_or(Ok(()), |watch| watch.fired(depth, value))
                    })?;
                    let next = property.get(&dispatcher)?;
                    links.push(Link {
                        depth,
                        dispatcher,
                        property,
                        observer,
                    });
                    next
                }
                Value::Dict(dict) => dict.get(segment).unwrap_or_default(),
                _ => break,
            };
        }
        Ok(links)
    }

    fn resolve(&self) -> Result<Value, PropertyError> {
        let mut current = Value::Dispatcher(self.root.clone());
        for segment in &self.path {
            current = match current {
                Value::Dispatcher(dispatcher) => dispatcher.get(segment)?,
                Value::Dict(dict) => dict.get(segment).unwrap_or_default(),
                _ => return Ok(Value::None),
            };
        }
        Ok(current)
    }

    fn fired(self: Rc<Self>, depth: usize, value: &Value) -> Result<(), PropertyError> {
        let rebind = self
            .links
            .borrow()
            .iter()
            .any(|link| link.depth == depth && link.property.is_rebindable());
        if rebind {
            let stale: Vec<Link> = {
                let mut links = self.links.borrow_mut();
                let keep = links.iter().take_while(|link| link.depth <= depth).count();
                links.split_off(keep)
            };
            for link in &stale {
                link.release();
            }
            let fresh = Self::attach(&self, depth + 1, value.clone())?;
            log::trace!(
                "rebound {:?} after segment {depth}: {} -> {} links",
                self.path,
                stale.len(),
                fresh.len()
            );
            self.links.borrow_mut().extend(fresh);
        }
        let leaf = self.resolve()?;
        (self.callback)(&leaf);
        Ok(())
    }
}
