// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatcher instances.
//!
//! A [`Dispatcher`] is an object that carries properties: a shared handle to
//! its class, an instance-level name table for properties linked directly
//! with [`Property::link`], and the per-instance record store. The name-based
//! methods here resolve a name to its descriptor and forward to it.

use core::fmt;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::class::{DispatcherClass, check_name};
use crate::descriptor::{Property, PropertyKind};
use crate::error::{NameList, PropertyError};
use crate::id::{InstanceId, ObserverId, PropertyId};
use crate::store::PropertyStore;
use crate::units::UnitContext;
use crate::value::Value;

pub(crate) struct DispatcherInner {
    id: InstanceId,
    class: Rc<DispatcherClass>,
    names: RefCell<HashMap<Rc<str>, Property>>,
    store: RefCell<PropertyStore>,
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        UnitContext::forget_instance(self.id);
    }
}

/// An object carrying properties.
///
/// Cloning the handle shares the instance.
///
/// # Example
///
/// ```
/// use trellis_property::{ClassBuilder, Dispatcher, Property, Value};
/// use std::{cell::RefCell, rc::Rc};
///
/// let class = ClassBuilder::new("Button")
///     .property("text", Property::string("").build())
///     .build()
///     .unwrap();
/// let button = Dispatcher::with_args(&class, [("text", "Ok")]).unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = seen.clone();
/// button
///     .bind("text", move |_, value| log.borrow_mut().push(value.clone()))
///     .unwrap();
///
/// button.set("text", "Cancel").unwrap();
/// button.set("text", "Cancel").unwrap();
/// assert_eq!(*seen.borrow(), [Value::from("Cancel")]);
///
/// assert!(button.set("text", 5).is_err());
/// ```
#[derive(Clone)]
pub struct Dispatcher(Rc<DispatcherInner>);

/// A weak handle to a [`Dispatcher`].
#[derive(Clone, Default)]
pub struct WeakDispatcher(Weak<DispatcherInner>);

impl WeakDispatcher {
    /// Returns the instance if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Dispatcher> {
        self.0.upgrade().map(Dispatcher)
    }

    /// Returns `true` if the instance is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(dispatcher) => write!(f, "Weak({dispatcher:?})"),
            None => f.write_str("Weak(<dropped>)"),
        }
    }
}

impl Dispatcher {
    fn alloc(class: Rc<DispatcherClass>) -> Self {
        Self(Rc::new(DispatcherInner {
            id: InstanceId::next(),
            class,
            names: RefCell::new(HashMap::new()),
            store: RefCell::new(PropertyStore::new()),
        }))
    }

    /// Creates an instance of a fresh class without properties.
    ///
    /// Properties can be attached later with [`Property::link`] or
    /// [`Dispatcher::create_property`].
    #[must_use]
    pub fn bare() -> Self {
        Self::alloc(DispatcherClass::empty("Dispatcher"))
    }

    /// Creates an instance of `class` with default values.
    pub fn new(class: &Rc<DispatcherClass>) -> Result<Self, PropertyError> {
        Self::with_args(class, Vec::<(String, Value)>::new())
    }

    /// Creates an instance of `class` with constructor arguments.
    ///
    /// Every argument must name a property of the class or be accepted by one
    /// of its initializers; otherwise construction fails with
    /// [`PropertyError::UnknownProperties`] before anything is built. All
    /// class properties are then linked, the initializers run (parents first)
    /// and the property arguments are applied in order.
    pub fn with_args<K: Into<String>, V: Into<Value>>(
        class: &Rc<DispatcherClass>,
        args: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, PropertyError> {
        let args: Vec<(String, Value)> = args
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let properties = class.properties();

        let is_property = |name: &str| properties.iter().any(|(n, _)| n == name);
        let invalid: Vec<&str> = args
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| !is_property(name) && !class.accepts_arg(name))
            .collect();
        if !invalid.is_empty() {
            return Err(PropertyError::UnknownProperties {
                invalid: NameList::sorted(invalid),
                valid: NameList::sorted(properties.iter().map(|(n, _)| n.as_str())),
            });
        }

        let dispatcher = Self::alloc(class.clone());
        for (_, property) in &properties {
            property.link_record(&dispatcher)?;
        }
        for (_, property) in &properties {
            property.link_deps(&dispatcher)?;
        }
        for initializer in class.initializers() {
            initializer.run(&dispatcher, &args)?;
        }
        for (name, value) in args {
            if is_property(&name) {
                dispatcher.set(&name, value)?;
            }
        }
        log::debug!("constructed {dispatcher:?}");
        Ok(dispatcher)
    }

    /// Returns the class.
    #[must_use]
    pub fn class(&self) -> &Rc<DispatcherClass> {
        &self.0.class
    }

    /// Returns the instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    /// Returns a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher(Rc::downgrade(&self.0))
    }

    /// Returns `true` if both handles share one instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn store(&self) -> Ref<'_, PropertyStore> {
        self.0.store.borrow()
    }

    pub(crate) fn store_mut(&self) -> RefMut<'_, PropertyStore> {
        self.0.store.borrow_mut()
    }

    // ========================================================================
    // Name resolution
    // ========================================================================

    /// Resolves `name` through the instance table, then the class chain.
    pub(crate) fn lookup(&self, name: &str) -> Option<Property> {
        if let Some(property) = self.0.names.borrow().get(name) {
            return Some(property.clone());
        }
        self.0.class.property(name)
    }

    /// Returns `true` if some name on this instance resolves to `property`.
    pub(crate) fn resolves(&self, property: &Property) -> bool {
        if let Some(name) = property.name()
            && self.lookup(name).is_some_and(|found| found.ptr_eq(property))
        {
            return true;
        }
        self.0.names.borrow().values().any(|p| p.ptr_eq(property))
            || self.0.class.properties().iter().any(|(name, p)| {
                p.ptr_eq(property) && self.lookup(name).is_some_and(|found| found.ptr_eq(p))
            })
    }

    pub(crate) fn register_name(&self, name: &str, property: &Property) {
        if self.lookup(name).is_some_and(|p| p.ptr_eq(property)) {
            return;
        }
        self.0.names.borrow_mut().insert(Rc::from(name), property.clone());
    }

    pub(crate) fn unregister_property(&self, property: &Property) {
        self.0.names.borrow_mut().retain(|_, p| !p.ptr_eq(property));
    }

    /// Returns the descriptor published under `name`.
    pub fn property(&self, name: &str) -> Result<Property, PropertyError> {
        self.lookup(name).ok_or_else(|| PropertyError::UnknownProperty {
            owner: self.0.class.name().to_owned(),
            name: name.to_owned(),
        })
    }

    /// Returns every property with its name: the class table (parents first)
    /// followed by instance-level links.
    #[must_use]
    pub fn properties(&self) -> Vec<(String, Property)> {
        let mut properties = self.0.class.properties();
        let mut linked: Vec<(String, Property)> = self
            .0
            .names
            .borrow()
            .iter()
            .map(|(name, prop)| (name.to_string(), prop.clone()))
            .collect();
        linked.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, prop) in linked {
            match properties.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = prop,
                None => properties.push((name, prop)),
            }
        }
        properties
    }

    /// Returns the sorted property names.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties().into_iter().map(|(n, _)| n).collect();
        names.sort();
        names
    }

    /// Returns `true` if `name` resolves to a property with a record on this instance.
    #[must_use]
    pub fn is_linked(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|p| self.store().contains(p.id()))
    }

    // ========================================================================
    // Name-based access
    // ========================================================================

    /// Reads the property `name`.
    pub fn get(&self, name: &str) -> Result<Value, PropertyError> {
        self.property(name)?.get(self)
    }

    /// Writes the property `name`; returns `true` if the value changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<bool, PropertyError> {
        self.property(name)?.set(self, value)
    }

    /// Dispatches the current value of `name` to its observers.
    pub fn dispatch(&self, name: &str) -> Result<(), PropertyError> {
        self.property(name)?.dispatch(self)
    }

    /// Observes `name`; see [`Property::bind`].
    pub fn bind(
        &self,
        name: &str,
        callback: impl Fn(&Self, &Value) + 'static,
    ) -> Result<ObserverId, PropertyError> {
        self.property(name)?.bind(self, callback)
    }

    /// Observes `name` with a fallible callback; see [`Property::try_bind`].
    pub fn try_bind(
        &self,
        name: &str,
        callback: impl Fn(&Self, &Value) -> Result<(), PropertyError> + 'static,
    ) -> Result<ObserverId, PropertyError> {
        self.property(name)?.try_bind(self, callback)
    }

    /// Observes `name` with extra leading arguments; see [`Property::fbind`].
    pub fn fbind(
        &self,
        name: &str,
        args: Vec<Value>,
        callback: impl Fn(&[Value], &Self, &Value) + 'static,
    ) -> Result<ObserverId, PropertyError> {
        self.property(name)?.fbind(self, args, callback)
    }

    /// Removes an observer from `name`; returns `true` if it was bound.
    pub fn unbind(&self, name: &str, observer: ObserverId) -> Result<bool, PropertyError> {
        Ok(self.property(name)?.unbind(self, observer))
    }

    /// Returns how many observers `name` has, including dependency links.
    pub fn observers(&self, name: &str) -> Result<usize, PropertyError> {
        self.property(name)?.observer_count(self)
    }

    /// Returns an observer that copies the dispatched value into this
    /// instance's property `name`.
    ///
    /// ```
    /// use trellis_property::{Dispatcher, Value};
    ///
    /// let a = Dispatcher::bare();
    /// let b = Dispatcher::bare();
    /// a.create_property("x", 0).unwrap();
    /// b.create_property("x", 0).unwrap();
    ///
    /// a.try_bind("x", b.setter("x")).unwrap();
    /// a.set("x", 7).unwrap();
    /// assert_eq!(b.get("x").unwrap(), Value::from(7));
    /// ```
    pub fn setter(
        &self,
        name: &str,
    ) -> impl Fn(&Self, &Value) -> Result<(), PropertyError> + 'static {
        let target = self.downgrade();
        let name = name.to_owned();
        move |_: &Self, value: &Value| match target.upgrade() {
            Some(target) => target.set(&name, value.clone()).map(drop),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Dynamic properties
    // ========================================================================

    /// Creates a property named `name` whose kind is inferred from `value`,
    /// which also becomes its default.
    ///
    /// Booleans become boolean properties, numbers and dimensions numeric,
    /// strings string, lists list and dicts dict properties; anything else
    /// (including `None`) an object property.
    pub fn create_property(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<Property, PropertyError> {
        let value = value.into();
        let builder = match value {
            Value::Bool(_) => Property::boolean(value),
            Value::Int(_) | Value::Float(_) | Value::Dimension(_) => Property::numeric(value),
            Value::Str(_) => Property::string(value),
            Value::List(_) => Property::list(value),
            Value::Dict(_) => Property::dict(value),
            Value::None | Value::Dispatcher(_) | Value::Object(_) => Property::object(value),
        };
        self.create_property_with(name, builder.build())
    }

    /// Publishes `property` under `name` and links it here.
    ///
    /// A new name is installed on this instance's class: later instances see
    /// the property and existing ones link it on first access. A name the
    /// class already defines is shadowed on this instance only, so other
    /// instances keep their values and observers. Either way, if `name`
    /// already resolved to another descriptor here, the old record is
    /// detached first (its observers are gone) and properties that depended
    /// on it are re-attached to the new one.
    pub fn create_property_with(
        &self,
        name: &str,
        property: Property,
    ) -> Result<Property, PropertyError> {
        check_name(name)?;
        property.set_name(name);

        let mut dependents = Vec::new();
        if let Some(old) = self.lookup(name)
            && !old.ptr_eq(&property)
        {
            dependents = self.dependents_of(old.id());
            old.unlink(self);
        }

        match self.0.class.property(name) {
            Some(existing) if !existing.ptr_eq(&property) => {
                self.0
                    .names
                    .borrow_mut()
                    .insert(Rc::from(name), property.clone());
            }
            Some(_) => {
                self.0.names.borrow_mut().remove(name);
            }
            None => {
                self.0.names.borrow_mut().remove(name);
                self.0.class.install(name, property.clone());
            }
        }
        property.link_record(self)?;
        property.link_deps(self)?;
        for dependent in dependents {
            dependent.relink_deps(self)?;
        }
        log::debug!(
            "created {} {name} on {self:?}",
            property.kind().name()
        );
        Ok(property)
    }

    /// Creates several properties at once.
    pub fn apply_property<S: AsRef<str>>(
        &self,
        properties: impl IntoIterator<Item = (S, Property)>,
    ) -> Result<(), PropertyError> {
        for (name, property) in properties {
            self.create_property_with(name.as_ref(), property)?;
        }
        Ok(())
    }

    /// Properties with a record on this instance that subscribe to `target`.
    fn dependents_of(&self, target: PropertyId) -> Vec<Property> {
        self.store()
            .records()
            .filter(|record| {
                matches!(
                    record.property.kind(),
                    PropertyKind::Alias(_) | PropertyKind::ReferenceList(_)
                ) && record.subscriptions.iter().any(|s| s.target == target)
            })
            .map(|record| record.property.clone())
            .collect()
    }
}

impl PartialEq for Dispatcher {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Dispatcher {}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} #{}>", self.0.class.name(), self.0.id.get())
    }
}
