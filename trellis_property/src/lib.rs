// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Property: reactive properties with synchronous change dispatch.
//!
//! A [`Property`] is a shared descriptor: a kind (numeric, string, list,
//! alias, ...), a default value and a few flags. Descriptors are declared on
//! a [`DispatcherClass`] and every [`Dispatcher`] instance keeps its own
//! record per property: the current value, the observers and, for computed
//! properties, the subscriptions to their dependencies.
//!
//! ## Core Concepts
//!
//! - **Validation**: every write is checked and coerced by the property
//!   kind. A rejected write leaves the stored value untouched.
//! - **Change dispatch**: observers run synchronously, in registration order,
//!   when a write changes the value. Re-entrant writes from observers are
//!   coalesced into one more pass.
//! - **Containers**: list and dict values are [`ObservableList`] and
//!   [`ObservableDict`] handles; every in-place mutation dispatches once.
//! - **Computed properties**: aliases ([`AliasSpec`]) and reference lists
//!   follow the properties they are built from.
//! - **Units**: numeric properties accept values such as `"55dp"`; the
//!   [`UnitContext`] redispatches them when the display metrics change.
//! - **Rebinding**: a [`PathWatch`] follows chains such as `button.state`
//!   across object swaps.
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis_property::{AliasSpec, ClassBuilder, Dispatcher, Property, Value};
//! use std::{cell::RefCell, rc::Rc};
//!
//! let right = AliasSpec::new(|d| {
//!     let x = d.get("x")?.as_f64().unwrap_or_default();
//!     let width = d.get("width")?.as_f64().unwrap_or_default();
//!     Ok(Value::from(x + width))
//! })
//! .setter(|d, value| {
//!     let width = d.get("width")?.as_f64().unwrap_or_default();
//!     d.set("x", value.as_f64().unwrap_or_default() - width)?;
//!     // Changing `x` already re-evaluated and dispatched `right`.
//!     Ok(false)
//! })
//! .bind(["x", "width"]);
//!
//! let class = ClassBuilder::new("Widget")
//!     .property("x", Property::numeric(0).build())
//!     .property("width", Property::numeric(100).build())
//!     .property("right", Property::alias(right).build())
//!     .build()
//!     .unwrap();
//!
//! let widget = Dispatcher::with_args(&class, [("x", 10)]).unwrap();
//! assert_eq!(widget.get("right").unwrap(), Value::from(110));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! widget
//!     .bind("right", move |_, value| log.borrow_mut().push(value.clone()))
//!     .unwrap();
//!
//! widget.set("width", 50).unwrap();
//! widget.set("right", 300).unwrap();
//! assert_eq!(widget.get("x").unwrap(), Value::from(250));
//! assert_eq!(*seen.borrow(), [Value::from(60), Value::from(300)]);
//! ```
//!
//! ## Threading
//!
//! Instances, descriptors and containers are single-threaded `Rc` handles.
//! The display metrics are the one process-wide piece of state: a change
//! made on one thread redispatches that thread's unit-aware records, and
//! other threads pick it up with [`UnitContext::refresh`].

mod access;
mod alias;
mod class;
mod coerce;
mod color;
mod container;
mod descriptor;
mod dispatch;
mod dispatcher;
mod error;
mod id;
mod link;
mod path;
mod reference;
mod store;
mod units;
mod value;

pub use class::{
    ClassBuilder, CycleHandling, DispatcherClass, InitArgs, Initializer, RESERVED_NAMES,
    is_reserved,
};
pub use container::{ObservableDict, ObservableList};
pub use descriptor::{
    AliasSpec, Bounds, BoundsRecovery, Comparator, ErrorHandler, Getter, Property,
    PropertyBuilder, PropertyFlags, PropertyKind, Setter,
};
pub use dispatcher::{Dispatcher, WeakDispatcher};
pub use error::{NameList, PropertyError};
pub use id::{InstanceId, ObserverId, PropertyId};
pub use path::PathWatch;
pub use units::{DENSITY_ENV, DPI_ENV, FONTSCALE_ENV, UnitContext};
pub use value::{Opaque, Value};

pub use trellis_units::{Dimension, Metrics, Unit};
