// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property descriptors.
//!
//! A [`Property`] is a cheap, clonable handle to immutable descriptor data:
//! its kind (which selects validation and coercion), default value, flags and
//! optional comparator. Descriptors are built with [`PropertyBuilder`], obtained
//! from the kind constructors such as [`Property::numeric`].
//!
//! A descriptor holds no per-instance state. Values, observers and dependency
//! subscriptions live in the per-instance store of each
//! [`Dispatcher`](crate::Dispatcher) it is linked to.

use core::fmt;
use std::cell::OnceCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::id::PropertyId;
use crate::value::Value;

bitflags! {
    /// Behaviour flags of a descriptor.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u8 {
        /// `None` is accepted as a value.
        const ALLOW_NONE = 1 << 0;
        /// Every successful set dispatches, even if the value is unchanged.
        const FORCE_DISPATCH = 1 << 1;
        /// Path watchers rebuild downstream subscriptions when this changes.
        const REBIND = 1 << 2;
    }
}

/// Computes the value of an alias.
pub type Getter = Rc<dyn Fn(&Dispatcher) -> Result<Value, PropertyError>>;

/// Writes through an alias; returns `true` if the aliased state changed.
pub type Setter = Rc<dyn Fn(&Dispatcher, Value) -> Result<bool, PropertyError>>;

/// Decides whether two values are equal for change detection.
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> bool>;

/// Maps an out-of-range value to a replacement.
pub type ErrorHandler = Rc<dyn Fn(&Value) -> Value>;

// ============================================================================
// Bounds
// ============================================================================

/// What a bounded numeric does with an out-of-range value.
#[derive(Clone, Default)]
pub enum BoundsRecovery {
    /// Reject the value.
    #[default]
    Fail,
    /// Store this value instead.
    Value(Value),
    /// Store whatever the handler returns.
    Handler(ErrorHandler),
}

impl fmt::Debug for BoundsRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => f.write_str("Fail"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Range configuration of a bounded numeric property.
///
/// A missing bound leaves that side open. The replacement produced by the
/// recovery strategy must itself be in range.
///
/// # Example
///
/// ```
/// use trellis_property::{Bounds, Property, Value};
///
/// let clamped = Bounds::new()
///     .min(-5.0)
///     .max(5.0)
///     .error_handler(|v: &Value| {
///         Value::from(v.as_f64().unwrap_or(0.0).clamp(-5.0, 5.0))
///     });
/// let prop = Property::bounded_numeric(0, clamped).build();
/// assert_eq!(prop.kind().name(), "BoundedNumericProperty");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Bounds {
    min: Option<f64>,
    max: Option<f64>,
    recovery: BoundsRecovery,
}

impl Bounds {
    /// Creates unbounded bounds that reject nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Replaces out-of-range values with `value`.
    #[must_use]
    pub fn error_value(mut self, value: impl Into<Value>) -> Self {
        self.recovery = BoundsRecovery::Value(value.into());
        self
    }

    /// Replaces out-of-range values with the handler's result.
    #[must_use]
    pub fn error_handler(mut self, handler: impl Fn(&Value) -> Value + 'static) -> Self {
        self.recovery = BoundsRecovery::Handler(Rc::new(handler));
        self
    }

    /// Returns the declared lower bound.
    #[must_use]
    pub fn lower(&self) -> Option<f64> {
        self.min
    }

    /// Returns the declared upper bound.
    #[must_use]
    pub fn upper(&self) -> Option<f64> {
        self.max
    }

    /// Returns the recovery strategy.
    #[must_use]
    pub fn recovery(&self) -> &BoundsRecovery {
        &self.recovery
    }
}

// ============================================================================
// AliasSpec
// ============================================================================

/// Configuration of a computed (alias) property.
///
/// `bind` names the sibling properties the getter reads; a change to any of
/// them re-evaluates the alias. With `cache`, reads return the stored value
/// until a dependency changes. With `watch_before_use` (the default), the
/// alias re-evaluates on dependency changes even if it was never read;
/// otherwise it only marks itself stale until the first read.
#[derive(Clone)]
pub struct AliasSpec {
    pub(crate) getter: Getter,
    pub(crate) setter: Option<Setter>,
    pub(crate) bind: Vec<String>,
    pub(crate) cache: bool,
    pub(crate) watch_before_use: bool,
}

impl AliasSpec {
    /// Creates a read-only alias computed by `getter`.
    pub fn new(getter: impl Fn(&Dispatcher) -> Result<Value, PropertyError> + 'static) -> Self {
        Self {
            getter: Rc::new(getter),
            setter: None,
            bind: Vec::new(),
            cache: false,
            watch_before_use: true,
        }
    }

    /// Makes the alias writable.
    #[must_use]
    pub fn setter(
        mut self,
        setter: impl Fn(&Dispatcher, Value) -> Result<bool, PropertyError> + 'static,
    ) -> Self {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// Declares the properties the getter depends on.
    #[must_use]
    pub fn bind<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.bind = names.into_iter().map(Into::into).collect();
        self
    }

    /// Caches the computed value until a dependency changes.
    #[must_use]
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Re-evaluates on dependency changes even before the first read.
    #[must_use]
    pub fn watch_before_use(mut self, watch: bool) -> Self {
        self.watch_before_use = watch;
        self
    }

    /// Returns the dependency names.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.bind
    }

    /// Returns `true` if a setter was provided.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for AliasSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasSpec")
            .field("has_setter", &self.setter.is_some())
            .field("bind", &self.bind)
            .field("cache", &self.cache)
            .field("watch_before_use", &self.watch_before_use)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PropertyKind
// ============================================================================

/// Selects the validation and coercion rules of a descriptor.
#[derive(Clone, Debug)]
pub enum PropertyKind {
    /// Accepts anything; change detection uses identity.
    Object,
    /// Numbers, unit strings and [`Dimension`](trellis_units::Dimension)s.
    Numeric,
    /// Numbers within [`Bounds`].
    BoundedNumeric(Bounds),
    /// Strings only.
    String,
    /// Booleans only.
    Boolean,
    /// One of a fixed set of values.
    Options(Vec<Value>),
    /// Observable lists.
    List,
    /// Observable string-keyed dicts.
    Dict,
    /// RGBA colors, stored as a list of four floats.
    Color,
    /// Fixed-length numeric lists with unit-aware elements.
    VariableList {
        /// The stored length, 2 or 4.
        length: usize,
    },
    /// A composite list view over child properties.
    ReferenceList(Vec<Property>),
    /// A computed property.
    Alias(AliasSpec),
}

impl PropertyKind {
    /// Returns the conventional name of this kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "ObjectProperty",
            Self::Numeric => "NumericProperty",
            Self::BoundedNumeric(_) => "BoundedNumericProperty",
            Self::String => "StringProperty",
            Self::Boolean => "BooleanProperty",
            Self::Options(_) => "OptionProperty",
            Self::List => "ListProperty",
            Self::Dict => "DictProperty",
            Self::Color => "ColorProperty",
            Self::VariableList { .. } => "VariableListProperty",
            Self::ReferenceList(_) => "ReferenceListProperty",
            Self::Alias(_) => "AliasProperty",
        }
    }

    /// Returns `true` for kinds whose values are bound containers.
    pub(crate) fn is_container(&self) -> bool {
        matches!(
            self,
            Self::List | Self::Dict | Self::Color | Self::VariableList { .. }
        )
    }

    /// Returns `true` for kinds whose values may carry a scaled unit.
    pub(crate) fn is_unit_aware(&self) -> bool {
        matches!(self, Self::Numeric | Self::VariableList { .. })
    }

    fn default_value(&self) -> Value {
        match self {
            Self::Numeric | Self::BoundedNumeric(_) => Value::Int(0),
            Self::String => Value::Str(String::new()),
            Self::Boolean => Value::Bool(false),
            Self::List => Value::list(Vec::<Value>::new()),
            Self::Dict => Value::dict(Vec::<(String, Value)>::new()),
            Self::Color => Value::list([1.0, 1.0, 1.0, 1.0]),
            Self::VariableList { length } => Value::list(vec![Value::Int(0); *length]),
            Self::Options(options) => options.first().cloned().unwrap_or_default(),
            Self::Object | Self::ReferenceList(_) | Self::Alias(_) => Value::None,
        }
    }
}

// ============================================================================
// Property
// ============================================================================

pub(crate) struct Descriptor {
    pub(crate) id: PropertyId,
    pub(crate) name: OnceCell<Rc<str>>,
    pub(crate) kind: PropertyKind,
    pub(crate) default: Value,
    pub(crate) flags: PropertyFlags,
    pub(crate) comparator: Option<Comparator>,
}

/// A property descriptor.
///
/// Cloning the handle shares the descriptor; two handles are the same
/// property if [`Property::ptr_eq`] holds.
///
/// # Example
///
/// ```
/// use trellis_property::{Dispatcher, Property, Value};
///
/// let width = Property::numeric(100).build();
/// let widget = Dispatcher::bare();
/// width.link(&widget, "width").unwrap();
///
/// width.set(&widget, "55dp").unwrap();
/// assert_eq!(width.get_format(&widget).unwrap().suffix(), "dp");
/// ```
#[derive(Clone)]
pub struct Property(pub(crate) Rc<Descriptor>);

impl Property {
    /// Starts a property of `kind` with that kind's natural default: `0`,
    /// `""`, `false`, an empty list or dict, opaque white, the first option,
    /// or `None`.
    ///
    /// ```
    /// use trellis_property::{Dispatcher, Property, PropertyKind, Value};
    ///
    /// let color = Property::new(PropertyKind::Color).build();
    /// assert_eq!(color.default_value(), &Value::list([1.0, 1.0, 1.0, 1.0]));
    /// ```
    pub fn new(kind: PropertyKind) -> PropertyBuilder {
        let default = kind.default_value();
        PropertyBuilder::new(kind, default)
    }

    /// Starts an object property that accepts any value.
    pub fn object(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::Object, default.into())
    }

    /// Starts a numeric property.
    pub fn numeric(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::Numeric, default.into())
    }

    /// Starts a bounded numeric property.
    pub fn bounded_numeric(default: impl Into<Value>, bounds: Bounds) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::BoundedNumeric(bounds), default.into())
    }

    /// Starts a string property.
    pub fn string(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::String, default.into())
    }

    /// Starts a boolean property.
    pub fn boolean(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::Boolean, default.into())
    }

    /// Starts an options property restricted to `options`.
    pub fn options<T: Into<Value>>(
        default: impl Into<Value>,
        options: impl IntoIterator<Item = T>,
    ) -> PropertyBuilder {
        let options = options.into_iter().map(Into::into).collect();
        PropertyBuilder::new(PropertyKind::Options(options), default.into())
    }

    /// Starts a list property.
    pub fn list(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::List, default.into())
    }

    /// Starts a dict property.
    pub fn dict(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::Dict, default.into())
    }

    /// Starts a color property.
    pub fn color(default: impl Into<Value>) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::Color, default.into())
    }

    /// Starts a variable-list property of the given stored length.
    ///
    /// Only lengths 2 and 4 are supported; any other length fails when the
    /// property is linked.
    pub fn variable_list(default: impl Into<Value>, length: usize) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::VariableList { length }, default.into())
    }

    /// Starts a reference-list property over `children`.
    pub fn reference_list(children: impl IntoIterator<Item = Self>) -> PropertyBuilder {
        PropertyBuilder::new(
            PropertyKind::ReferenceList(children.into_iter().collect()),
            Value::None,
        )
    }

    /// Starts an alias property.
    pub fn alias(spec: AliasSpec) -> PropertyBuilder {
        PropertyBuilder::new(PropertyKind::Alias(spec), Value::None)
    }

    /// Returns the descriptor id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> PropertyId {
        self.0.id
    }

    /// Returns the name, if one was assigned.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.name.get().map(|name| &**name)
    }

    /// Assigns the name. Only the first assignment takes effect.
    ///
    /// Returns `true` if this call assigned it.
    pub fn set_name(&self, name: &str) -> bool {
        self.0.name.set(Rc::from(name)).is_ok()
    }

    pub(crate) fn require_name(&self) -> Result<&str, PropertyError> {
        self.name().ok_or(PropertyError::Unnamed)
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name().unwrap_or("<unnamed property>")
    }

    /// Returns the kind.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &PropertyKind {
        &self.0.kind
    }

    /// Returns the flags.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.0.flags
    }

    /// Returns the declared default value, before coercion.
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.0.default
    }

    /// Returns `true` if path watchers rebuild subscriptions through this property.
    #[must_use]
    pub fn is_rebindable(&self) -> bool {
        self.0.flags.contains(PropertyFlags::REBIND)
    }

    /// Returns `true` if `None` is accepted.
    #[must_use]
    pub fn allows_none(&self) -> bool {
        self.0.flags.contains(PropertyFlags::ALLOW_NONE)
    }

    pub(crate) fn force_dispatch(&self) -> bool {
        self.0.flags.contains(PropertyFlags::FORCE_DISPATCH)
    }

    /// Returns the names this property depends on: alias `bind` names or
    /// reference-list children.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<String> {
        match &self.0.kind {
            PropertyKind::Alias(spec) => spec.bind.clone(),
            PropertyKind::ReferenceList(children) => children
                .iter()
                .map(|child| child.display_name().to_owned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if both handles share one descriptor.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Change detection: the comparator if any, identity for object
    /// properties, structural equality otherwise.
    pub(crate) fn values_equal(&self, old: &Value, new: &Value) -> bool {
        if let Some(comparator) = &self.0.comparator {
            return comparator(old, new);
        }
        match self.0.kind {
            PropertyKind::Object => old.same(new),
            _ => old == new,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.0.id)
            .field("name", &self.name())
            .field("kind", &self.0.kind.name())
            .field("default", &self.0.default)
            .field("flags", &self.0.flags)
            .field("has_comparator", &self.0.comparator.is_some())
            .finish()
    }
}

// ============================================================================
// PropertyBuilder
// ============================================================================

/// Builder for [`Property`].
///
/// # Example
///
/// ```
/// use trellis_property::{Property, PropertyFlags};
///
/// let prop = Property::object(None::<i64>).rebind(true).build();
/// assert!(prop.flags().contains(PropertyFlags::ALLOW_NONE | PropertyFlags::REBIND));
/// ```
#[must_use]
pub struct PropertyBuilder {
    kind: PropertyKind,
    default: Value,
    flags: PropertyFlags,
    comparator: Option<Comparator>,
}

impl PropertyBuilder {
    fn new(kind: PropertyKind, default: Value) -> Self {
        Self {
            kind,
            default,
            flags: PropertyFlags::empty(),
            comparator: None,
        }
    }

    /// Replaces the default value.
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Accepts `None` as a value.
    pub fn allow_none(mut self, allow: bool) -> Self {
        self.flags.set(PropertyFlags::ALLOW_NONE, allow);
        self
    }

    /// Dispatches on every successful set, changed or not.
    pub fn force_dispatch(mut self, force: bool) -> Self {
        self.flags.set(PropertyFlags::FORCE_DISPATCH, force);
        self
    }

    /// Lets path watchers rebuild downstream subscriptions on change.
    pub fn rebind(mut self, rebind: bool) -> Self {
        self.flags.set(PropertyFlags::REBIND, rebind);
        self
    }

    /// Uses `comparator` instead of the default change detection.
    pub fn comparator(mut self, comparator: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.comparator = Some(Rc::new(comparator));
        self
    }

    /// Builds the descriptor.
    ///
    /// A `None` default implies [`PropertyFlags::ALLOW_NONE`], except for
    /// reference lists and aliases, whose values are derived.
    #[must_use]
    pub fn build(self) -> Property {
        let mut flags = self.flags;
        let derived = matches!(
            self.kind,
            PropertyKind::ReferenceList(_) | PropertyKind::Alias(_)
        );
        if self.default.is_none() && !derived {
            flags |= PropertyFlags::ALLOW_NONE;
        }
        Property(Rc::new(Descriptor {
            id: PropertyId::next(),
            name: OnceCell::new(),
            kind: self.kind,
            default: self.default,
            flags,
            comparator: self.comparator,
        }))
    }
}

impl fmt::Debug for PropertyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBuilder")
            .field("kind", &self.kind.name())
            .field("default", &self.default)
            .field("flags", &self.flags)
            .field("has_comparator", &self.comparator.is_some())
            .finish()
    }
}
