// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatcher classes.
//!
//! A [`DispatcherClass`] is the property table shared by all instances of a
//! kind of object, plus the initializers that run when an instance is
//! constructed. Classes form a single-inheritance chain: a lookup that misses
//! the class's own table continues in its parent, so a property created on a
//! parent class later is visible through every subclass.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::descriptor::{Property, PropertyKind};
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::id::PropertyId;
use crate::value::Value;

/// Names that may not be used for properties.
///
/// Names starting with `__` and the empty name are rejected as well.
pub const RESERVED_NAMES: &[&str] = &[
    "bind",
    "fbind",
    "unbind",
    "funbind",
    "dispatch",
    "property",
    "properties",
    "create_property",
    "apply_property",
    "setter",
    "getter",
    "get",
    "set",
    "uid",
    "proxy_ref",
    "events",
];

/// Returns `true` if `name` cannot be used for a property.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    name.is_empty() || name.starts_with("__") || RESERVED_NAMES.contains(&name)
}

pub(crate) fn check_name(name: &str) -> Result<(), PropertyError> {
    if is_reserved(name) {
        return Err(PropertyError::ReservedName { name: name.into() });
    }
    Ok(())
}

// ============================================================================
// PropertyTable
// ============================================================================

/// Name to descriptor table that remembers declaration order.
#[derive(Default)]
pub(crate) struct PropertyTable {
    entries: Vec<(Rc<str>, Property)>,
    by_name: HashMap<Rc<str>, usize>,
}

impl PropertyTable {
    pub(crate) fn get(&self, name: &str) -> Option<&Property> {
        self.by_name.get(name).map(|&i| &self.entries[i].1)
    }

    /// Inserts or replaces `name`, keeping the original position on replace.
    pub(crate) fn insert(&mut self, name: &str, property: Property) -> Option<Property> {
        if let Some(&i) = self.by_name.get(name) {
            return Some(core::mem::replace(&mut self.entries[i].1, property));
        }
        let name: Rc<str> = Rc::from(name);
        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push((name, property));
        None
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Property)> + '_ {
        self.entries.iter().map(|(name, prop)| (&**name, prop))
    }
}

// ============================================================================
// Initializers
// ============================================================================

/// Constructor arguments handed to a class initializer.
#[derive(Debug, Default)]
pub struct InitArgs {
    values: Vec<(String, Value)>,
}

impl InitArgs {
    /// Returns the argument passed under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterates over the arguments in the order they were passed.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no argument was passed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Runs when an instance is constructed, after its properties are linked.
pub type Initializer = Rc<dyn Fn(&Dispatcher, &InitArgs) -> Result<(), PropertyError>>;

#[derive(Clone)]
pub(crate) struct InitializerEntry {
    accepts: Vec<String>,
    run: Initializer,
}

impl InitializerEntry {
    pub(crate) fn accepts(&self, name: &str) -> bool {
        self.accepts.iter().any(|n| n == name)
    }

    pub(crate) fn run(&self, dispatcher: &Dispatcher, args: &[(String, Value)]) -> Result<(), PropertyError> {
        let args = InitArgs {
            values: args
                .iter()
                .filter(|(name, _)| self.accepts(name))
                .cloned()
                .collect(),
        };
        (self.run)(dispatcher, &args)
    }
}

// ============================================================================
// DispatcherClass
// ============================================================================

/// How class construction treats dependency cycles between properties.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum CycleHandling {
    /// Reject the class with [`PropertyError::DependencyCycle`].
    #[default]
    Error,
    /// Accept the class; re-entrant dispatch is left to the coalescing guard.
    Allow,
}

/// The property table and initializers shared by instances of one class.
pub struct DispatcherClass {
    name: String,
    parent: Option<Rc<DispatcherClass>>,
    table: RefCell<PropertyTable>,
    initializers: Vec<InitializerEntry>,
}

impl DispatcherClass {
    /// Creates a class without properties or parent.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parent: None,
            table: RefCell::new(PropertyTable::default()),
            initializers: Vec::new(),
        })
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent class.
    #[must_use]
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// Returns `true` if `self` is `other` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Self) -> bool {
        core::ptr::eq(self, other) || self.parent.as_ref().is_some_and(|p| p.is_subclass_of(other))
    }

    /// Looks up a property by name, walking the parent chain.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Property> {
        if let Some(property) = self.table.borrow().get(name) {
            return Some(property.clone());
        }
        self.parent.as_ref()?.property(name)
    }

    /// Returns every property with its name, parents' declarations first;
    /// an override keeps the position of the declaration it replaces.
    #[must_use]
    pub fn properties(&self) -> Vec<(String, Property)> {
        let mut merged = PropertyTable::default();
        self.collect_into(&mut merged);
        merged
            .iter()
            .map(|(name, prop)| (name.to_owned(), prop.clone()))
            .collect()
    }

    /// Returns the property names in declaration order.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        self.properties().into_iter().map(|(name, _)| name).collect()
    }

    fn collect_into(&self, merged: &mut PropertyTable) {
        if let Some(parent) = &self.parent {
            parent.collect_into(merged);
        }
        for (name, prop) in self.table.borrow().iter() {
            merged.insert(name, prop.clone());
        }
    }

    /// Returns `true` if some initializer accepts the constructor argument `name`.
    #[must_use]
    pub fn accepts_arg(&self, name: &str) -> bool {
        self.initializers.iter().any(|init| init.accepts(name))
    }

    pub(crate) fn initializers(&self) -> &[InitializerEntry] {
        &self.initializers
    }

    /// Publishes `property` under `name` on this class.
    pub(crate) fn install(&self, name: &str, property: Property) -> Option<Property> {
        log::debug!("installing {name} on class {}", self.name);
        self.table.borrow_mut().insert(name, property)
    }
}

impl fmt::Debug for DispatcherClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("properties", &self.property_names())
            .field("initializers", &self.initializers.len())
            .finish()
    }
}

// ============================================================================
// ClassBuilder
// ============================================================================

/// Builder for [`DispatcherClass`].
///
/// # Example
///
/// ```
/// use trellis_property::{AliasSpec, ClassBuilder, Dispatcher, Property, Value};
///
/// let base = ClassBuilder::new("Widget")
///     .property("x", Property::numeric(0).build())
///     .property("width", Property::numeric(100).build())
///     .build()
///     .unwrap();
///
/// let right = AliasSpec::new(|w: &Dispatcher| {
///     let x = w.get("x")?.as_f64().unwrap_or(0.0);
///     let width = w.get("width")?.as_f64().unwrap_or(0.0);
///     Ok(Value::from(x + width))
/// })
/// .bind(["x", "width"]);
///
/// let class = ClassBuilder::new("Box")
///     .extends(&base)
///     .property("right", Property::alias(right).build())
///     .build()
///     .unwrap();
///
/// let b = Dispatcher::with_args(&class, [("x", 5)]).unwrap();
/// assert_eq!(b.get("right").unwrap(), Value::from(105.0));
/// ```
#[must_use]
pub struct ClassBuilder {
    name: String,
    parent: Option<Rc<DispatcherClass>>,
    properties: Vec<(String, Property)>,
    initializers: Vec<InitializerEntry>,
    cycle_handling: CycleHandling,
}

impl ClassBuilder {
    /// Starts a class named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: Vec::new(),
            initializers: Vec::new(),
            cycle_handling: CycleHandling::default(),
        }
    }

    /// Inherits properties and initializers from `parent`.
    pub fn extends(mut self, parent: &Rc<DispatcherClass>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declares (or overrides) a property.
    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.push((name.into(), property));
        self
    }

    /// Adds an initializer that receives the constructor arguments in `accepts`.
    ///
    /// Those names are then valid constructor arguments even though they are
    /// not properties.
    pub fn initializer<S: Into<String>>(
        mut self,
        accepts: impl IntoIterator<Item = S>,
        run: impl Fn(&Dispatcher, &InitArgs) -> Result<(), PropertyError> + 'static,
    ) -> Self {
        self.initializers.push(InitializerEntry {
            accepts: accepts.into_iter().map(Into::into).collect(),
            run: Rc::new(run),
        });
        self
    }

    /// Sets how dependency cycles are treated.
    pub fn cycle_handling(mut self, handling: CycleHandling) -> Self {
        self.cycle_handling = handling;
        self
    }

    /// Builds the class.
    ///
    /// Fails on reserved names, on alias dependencies that name no property,
    /// and (unless allowed) on dependency cycles.
    pub fn build(self) -> Result<Rc<DispatcherClass>, PropertyError> {
        let mut table = PropertyTable::default();
        for (name, property) in &self.properties {
            check_name(name)?;
            property.set_name(name);
            table.insert(name, property.clone());
        }

        let mut initializers = self
            .parent
            .as_ref()
            .map(|p| p.initializers.clone())
            .unwrap_or_default();
        initializers.extend(self.initializers);

        let class = Rc::new(DispatcherClass {
            name: self.name,
            parent: self.parent,
            table: RefCell::new(table),
            initializers,
        });

        check_dependencies(&class, self.cycle_handling)?;
        log::debug!(
            "built class {} with properties {:?}",
            class.name,
            class.property_names()
        );
        Ok(class)
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field(
                "properties",
                &self.properties.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("initializers", &self.initializers.len())
            .field("cycle_handling", &self.cycle_handling)
            .finish()
    }
}

/// Resolves the dependencies of every property of `class` and rejects
/// unknown names and, depending on `handling`, cycles.
fn check_dependencies(class: &DispatcherClass, handling: CycleHandling) -> Result<(), PropertyError> {
    let properties = class.properties();
    let mut edges: HashMap<PropertyId, Vec<PropertyId>> = HashMap::new();

    for (name, property) in &properties {
        let targets: Vec<Property> = match property.kind() {
            PropertyKind::Alias(spec) => spec
                .dependencies()
                .iter()
                .map(|dep| {
                    class.property(dep).ok_or_else(|| PropertyError::UnknownProperty {
                        owner: class.name.clone(),
                        name: dep.clone(),
                    })
                })
                .collect::<Result<_, _>>()?,
            PropertyKind::ReferenceList(children) => children
                .iter()
                .map(|child| {
                    let name = child.require_name()?;
                    Ok(class.property(name).unwrap_or_else(|| child.clone()))
                })
                .collect::<Result<_, PropertyError>>()?,
            _ => continue,
        };

        for target in targets {
            if handling == CycleHandling::Error
                && would_create_cycle(&edges, property.id(), target.id())
            {
                return Err(PropertyError::DependencyCycle {
                    property: name.clone(),
                    dependency: target.display_name().to_owned(),
                });
            }
            edges.entry(property.id()).or_default().push(target.id());
        }
    }
    Ok(())
}

/// Returns `true` if `from` is reachable from `to`, i.e. adding the edge
/// `from -> to` closes a cycle.
fn would_create_cycle(
    edges: &HashMap<PropertyId, Vec<PropertyId>>,
    from: PropertyId,
    to: PropertyId,
) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![to];
    while let Some(current) = stack.pop() {
        if current == from {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = edges.get(&current) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AliasSpec;

    #[test]
    fn reserved_names() {
        assert!(is_reserved("bind"));
        assert!(is_reserved("__class__"));
        assert!(is_reserved(""));
        assert!(!is_reserved("width"));
        assert!(!is_reserved("_private"));
    }

    #[test]
    fn reserved_name_rejected_at_build() {
        let err = ClassBuilder::new("Bad")
            .property("dispatch", Property::numeric(0).build())
            .build()
            .unwrap_err();
        assert!(matches!(err, PropertyError::ReservedName { name } if name == "dispatch"));
    }

    #[test]
    fn inheritance_and_override() {
        let parent = ClassBuilder::new("Parent")
            .property("a", Property::numeric(1).build())
            .property("b", Property::string("b").build())
            .build()
            .unwrap();
        let child = ClassBuilder::new("Child")
            .extends(&parent)
            .property("b", Property::object(Value::None).build())
            .property("c", Property::boolean(true).build())
            .build()
            .unwrap();

        assert_eq!(child.property_names(), ["a", "b", "c"]);
        assert!(matches!(child.property("b").unwrap().kind(), PropertyKind::Object));
        assert!(matches!(parent.property("b").unwrap().kind(), PropertyKind::String));
        assert!(child.is_subclass_of(&parent));
        assert!(!parent.is_subclass_of(&child));
    }

    #[test]
    fn parent_install_is_visible_in_child() {
        let parent = DispatcherClass::empty("Parent");
        let child = ClassBuilder::new("Child").extends(&parent).build().unwrap();
        assert!(child.property("late").is_none());
        parent.install("late", Property::numeric(0).build());
        assert!(child.property("late").is_some());
    }

    #[test]
    fn unknown_alias_dependency() {
        let err = ClassBuilder::new("W")
            .property(
                "alias",
                Property::alias(AliasSpec::new(|_| Ok(Value::None)).bind(["missing"])).build(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, PropertyError::UnknownProperty { name, .. } if name == "missing"));
    }

    fn cyclic_builder() -> ClassBuilder {
        ClassBuilder::new("Cyclic")
            .property(
                "a",
                Property::alias(AliasSpec::new(|_| Ok(Value::None)).bind(["b"])).build(),
            )
            .property(
                "b",
                Property::alias(AliasSpec::new(|_| Ok(Value::None)).bind(["a"])).build(),
            )
    }

    #[test]
    fn dependency_cycle_rejected() {
        let err = cyclic_builder().build().unwrap_err();
        assert!(matches!(err, PropertyError::DependencyCycle { .. }));

        assert!(
            cyclic_builder()
                .cycle_handling(CycleHandling::Allow)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = ClassBuilder::new("Loop")
            .property(
                "a",
                Property::alias(AliasSpec::new(|_| Ok(Value::None)).bind(["a"])).build(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, PropertyError::DependencyCycle { property, .. } if property == "a"));
    }

    #[test]
    fn initializers_are_inherited() {
        let parent = ClassBuilder::new("Named")
            .initializer(["name"], |_, _| Ok(()))
            .build()
            .unwrap();
        let child = ClassBuilder::new("Child").extends(&parent).build().unwrap();
        assert!(child.accepts_arg("name"));
        assert!(!child.accepts_arg("other"));
    }
}
