// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamically typed property values.

use core::any::Any;
use core::fmt;
use std::rc::Rc;

use trellis_units::Dimension;

use crate::container::{ObservableDict, ObservableList};
use crate::dispatcher::Dispatcher;

/// A value held by a property.
///
/// Equality is structural for scalars and containers: `Int` and `Float`
/// compare numerically, lists and dicts compare their contents. Dispatchers
/// and opaque objects compare by identity. Use [`Value::same`] for a pure
/// identity test.
///
/// # Example
///
/// ```
/// use trellis_property::Value;
///
/// assert_eq!(Value::from(2), Value::from(2.0));
/// assert_ne!(Value::from("2"), Value::from(2));
///
/// let a = Value::list([1, 2]);
/// let b = Value::list([1, 2]);
/// assert_eq!(a, b);
/// assert!(!a.same(&b));
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    None,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
    /// A number tagged with a unit.
    Dimension(Dimension),
    /// A shared, observable list.
    List(ObservableList),
    /// A shared, observable string-keyed dict.
    Dict(ObservableDict),
    /// Another dispatcher instance.
    Dispatcher(Dispatcher),
    /// Any other shared object.
    Object(Opaque),
}

impl Value {
    /// Creates a fresh, unbound list value.
    pub fn list<T: Into<Self>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::List(ObservableList::new(items.into_iter().map(Into::into).collect()))
    }

    /// Creates a fresh, unbound dict value.
    pub fn dict<K: Into<String>, V: Into<Self>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Dict(ObservableDict::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Wraps an arbitrary object.
    pub fn object<T: Any>(value: T) -> Self {
        Self::Object(Opaque::new(value))
    }

    /// Returns `true` for [`Value::None`].
    #[must_use]
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number as a float, if this is an `Int` or a `Float`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the dimension, if this is one.
    #[must_use]
    pub fn as_dimension(&self) -> Option<Dimension> {
        match self {
            Self::Dimension(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the list handle, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&ObservableList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the dict handle, if this is a dict.
    #[must_use]
    pub fn as_dict(&self) -> Option<&ObservableDict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the dispatcher, if this is one.
    #[must_use]
    pub fn as_dispatcher(&self) -> Option<&Dispatcher> {
        match self {
            Self::Dispatcher(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the opaque object, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Opaque> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Identity test: pointer identity for shared values, equality for scalars.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            (Self::Dict(a), Self::Dict(b)) => a.ptr_eq(b),
            (Self::Dispatcher(a), Self::Dispatcher(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::List(_) | Self::Dict(_) | Self::Dispatcher(_) | Self::Object(_), _)
            | (_, Self::List(_) | Self::Dict(_) | Self::Dispatcher(_) | Self::Object(_)) => false,
            _ => self == other,
        }
    }

    /// A short name for the variant, used in validation messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Dimension(_) => "dimension",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Dispatcher(_) => "dispatcher",
            Self::Object(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Dimension(a), Self::Dimension(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.contents_eq(b),
            (Self::Dict(a), Self::Dict(b)) => a.contents_eq(b),
            (Self::Dispatcher(a), Self::Dispatcher(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Dimension(d) => write!(f, "{d}"),
            Self::List(l) => fmt::Debug::fmt(l, f),
            Self::Dict(d) => fmt::Debug::fmt(d, f),
            Self::Dispatcher(d) => fmt::Debug::fmt(d, f),
            Self::Object(o) => fmt::Debug::fmt(o, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A shared handle to an arbitrary object, compared by identity.
#[derive(Clone)]
pub struct Opaque {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl Opaque {
    /// Wraps `value`.
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Returns `true` if both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} at {:p}>", self.type_name, Rc::as_ptr(&self.inner))
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Dimension> for Value {
    fn from(value: Dimension) -> Self {
        Self::Dimension(value)
    }
}

impl From<ObservableList> for Value {
    fn from(value: ObservableList) -> Self {
        Self::List(value)
    }
}

impl From<ObservableDict> for Value {
    fn from(value: ObservableDict) -> Self {
        Self::Dict(value)
    }
}

impl From<Dispatcher> for Value {
    fn from(value: Dispatcher) -> Self {
        Self::Dispatcher(value)
    }
}

impl From<Opaque> for Value {
    fn from(value: Opaque) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::list(value)
    }
}

impl<T: Into<Self>, const N: usize> From<[T; N]> for Value {
    fn from(value: [T; N]) -> Self {
        Self::list(value)
    }
}
