// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Behavior of the property kinds on a bare dispatcher.
//!
//! Most tests link descriptors directly with `link` instead of going through a
//! class. Nothing here changes the metrics; those tests live in `metrics.rs`.

use std::cell::Cell;
use std::rc::Rc;

use trellis_property::{
    Bounds, Dimension, Dispatcher, Property, PropertyError, Unit, UnitContext, Value,
};

fn linked(name: &str, property: &Property) -> Dispatcher {
    let d = Dispatcher::bare();
    property.link(&d, name).unwrap();
    d
}

fn counter() -> (Rc<Cell<usize>>, impl Fn(&Dispatcher, &Value) + 'static) {
    let count = Rc::new(Cell::new(0));
    let inner = count.clone();
    (count, move |_: &Dispatcher, _: &Value| inner.set(inner.get() + 1))
}

fn floats(value: &Value) -> Vec<f64> {
    value
        .as_list()
        .unwrap()
        .to_vec()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect()
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn observer_fires_only_on_change() {
    let prop = Property::object(Value::None).build();
    let d = linked("obj", &prop);
    let (count, observer) = counter();
    prop.bind(&d, observer).unwrap();

    prop.set(&d, 10).unwrap();
    assert_eq!(count.get(), 1);
    prop.set(&d, 10).unwrap();
    assert_eq!(count.get(), 1);
    prop.set(&d, 11).unwrap();
    assert_eq!(count.get(), 2);
}

#[test]
fn eager_link_requires_a_name() {
    let prop = Property::numeric(0).build();
    let d = Dispatcher::bare();
    assert!(matches!(prop.link_eagerly(&d), Err(PropertyError::Unnamed)));

    assert!(prop.set_name("value"));
    assert!(!prop.set_name("other"));
    prop.link_eagerly(&d).unwrap();
    assert_eq!(d.get("value").unwrap(), Value::from(0));
}

#[test]
fn string_property_rejects_other_types() {
    let prop = Property::string("").build();
    let d = linked("text", &prop);
    prop.set(&d, "hello").unwrap();
    let err = prop.set(&d, 88).unwrap_err();
    assert!(matches!(err, PropertyError::Validation { .. }));
    assert!(err.to_string().starts_with("text: "));
    assert_eq!(prop.get(&d).unwrap(), Value::from("hello"));
}

#[test]
fn numeric_property_rejects_non_numbers() {
    let prop = Property::numeric(0).build();
    let d = linked("a", &prop);
    prop.set(&d, 99).unwrap();
    prop.set(&d, 9.5).unwrap();
    assert!(prop.set(&d, "99 apples").is_err());
    assert!(prop.set(&d, Value::list([1, 2])).is_err());
    assert!(prop.set(&d, true).is_err());
    assert_eq!(prop.get(&d).unwrap(), Value::from(9.5));
}

#[test]
fn numeric_strings_with_units() {
    let prop = Property::numeric(0).build();
    let d = linked("a", &prop);
    let density = UnitContext::density();

    prop.set(&d, "55dp").unwrap();
    let value = prop.get(&d).unwrap().as_f64().unwrap();
    assert!((value - 55.0 * density).abs() < 1e-2);
    assert_eq!(prop.get_format(&d).unwrap(), Unit::Dp);

    prop.set(&d, "99in").unwrap();
    let value = prop.get(&d).unwrap().as_f64().unwrap();
    assert!((value - 9504.0 * density).abs() < 1e-2);
    assert_eq!(prop.get_format(&d).unwrap(), Unit::In);

    prop.set(&d, Dimension::sp(2.0)).unwrap();
    assert_eq!(prop.get_dimension(&d).unwrap(), Some(Dimension::sp(2.0)));
}

#[test]
fn numeric_string_without_unit_is_a_number() {
    let prop = Property::numeric(0).build();
    let d = linked("a", &prop);
    prop.set(&d, "2").unwrap();
    assert_eq!(prop.get(&d).unwrap(), Value::from(2));
    assert_eq!(prop.get_format(&d).unwrap(), Unit::Px);
}

#[test]
fn none_only_when_allowed() {
    let strict = Property::numeric(0).build();
    let relaxed = Property::numeric(0).allow_none(true).build();
    let implied = Property::object(Value::None).build();
    let d = linked("strict", &strict);
    relaxed.link(&d, "relaxed").unwrap();
    implied.link(&d, "implied").unwrap();

    assert!(strict.set(&d, Value::None).is_err());
    relaxed.set(&d, Value::None).unwrap();
    assert!(relaxed.get(&d).unwrap().is_none());
    assert!(implied.get(&d).unwrap().is_none());
}

#[test]
fn options_property() {
    let prop = Property::options("normal", ["normal", "down"]).build();
    let d = linked("state", &prop);
    prop.set(&d, "down").unwrap();
    assert!(prop.set(&d, "pressed").is_err());
    assert_eq!(prop.get(&d).unwrap(), Value::from("down"));
}

#[test]
fn custom_comparator_controls_change_detection() {
    let prop = Property::string("")
        .comparator(|a, b| {
            a.as_str().map(str::to_lowercase) == b.as_str().map(str::to_lowercase)
        })
        .build();
    let d = linked("name", &prop);
    let (count, observer) = counter();
    prop.bind(&d, observer).unwrap();

    prop.set(&d, "Hello").unwrap();
    assert!(!prop.set(&d, "HELLO").unwrap());
    assert_eq!(count.get(), 1);
}

// ============================================================================
// Bounded numeric
// ============================================================================

#[test]
fn bounded_numeric_rejects_out_of_range() {
    let prop = Property::bounded_numeric(0.0, Bounds::new().min(0.0).max(3.5)).build();
    let d = linked("bnp", &prop);
    prop.set(&d, 1).unwrap();
    prop.set(&d, 0.0).unwrap();
    prop.set(&d, 3.1).unwrap();
    prop.set(&d, 3.5).unwrap();
    assert!(prop.set(&d, 3.6).is_err());
    assert!(prop.set(&d, -3).is_err());
    assert_eq!(prop.get(&d).unwrap(), Value::from(3.5));
}

#[test]
fn bounded_numeric_error_value() {
    let bounds = Bounds::new().min(-5.0).max(5.0).error_value(1);
    let prop = Property::bounded_numeric(0, bounds).build();
    let d = linked("bnp", &prop);

    for (input, expected) in [(1, 1), (5, 5), (6, 1), (-5, -5), (-6, 1)] {
        prop.set(&d, input).unwrap();
        assert_eq!(prop.get(&d).unwrap(), Value::from(expected));
    }
}

#[test]
fn bounded_numeric_error_handler() {
    let bounds = Bounds::new().min(-5.0).max(5.0).error_handler(|value| {
        Value::from(if value.as_f64().unwrap_or(0.0) > 5.0 { 5 } else { -5 })
    });
    let prop = Property::bounded_numeric(0, bounds).build();
    let d = linked("bnp", &prop);

    for (input, expected) in [(1, 1), (5, 5), (10, 5), (-5, -5), (-10, -5)] {
        prop.set(&d, input).unwrap();
        assert_eq!(prop.get(&d).unwrap(), Value::from(expected));
    }
}

#[test]
fn bounded_numeric_bad_recovery_is_an_error() {
    let bounds = Bounds::new().min(0.0).max(1.0).error_value(7);
    let prop = Property::bounded_numeric(0, bounds).build();
    let d = linked("bnp", &prop);
    assert!(prop.set(&d, 3).is_err());
    assert_eq!(prop.get(&d).unwrap(), Value::from(0));
}

#[test]
fn bounded_numeric_refuses_scaled_units() {
    let prop = Property::bounded_numeric(0, Bounds::new().min(0.0).max(15.0)).build();
    let d = linked("bnp", &prop);
    let (count, observer) = counter();
    prop.bind(&d, observer).unwrap();

    for scaled in [
        Value::from("10dp"),
        Value::from(Dimension::new(1.0, Unit::Sp)),
        Value::list([Value::from(2), Value::from("cm")]),
    ] {
        let err = prop.set(&d, scaled).unwrap_err();
        assert!(matches!(err, PropertyError::Validation { .. }));
    }
    assert_eq!(prop.get(&d).unwrap(), Value::from(0));
    assert_eq!(count.get(), 0);

    prop.set(&d, "12px").unwrap();
    assert_eq!(prop.get(&d).unwrap(), Value::from(12.0));
    assert_eq!(prop.get_format(&d).unwrap(), Unit::Px);
    assert!(prop.set(&d, "16px").is_err());
    assert_eq!(count.get(), 1);
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn list_property_mutations_dispatch() {
    let prop = Property::list(Value::list([1, 2, 3])).build();
    let d = linked("items", &prop);
    let (count, observer) = counter();
    prop.bind(&d, observer).unwrap();

    let value = prop.get(&d).unwrap();
    let list = value.as_list().unwrap();
    assert!(list.is_bound());
    list.set(0, 10).unwrap();
    list.set_slice(1..3, [20, 30, 40]).unwrap();
    list.remove(0).unwrap();
    list.sort_by(|a, b| {
        b.as_f64()
            .partial_cmp(&a.as_f64())
            .unwrap_or(core::cmp::Ordering::Equal)
    })
    .unwrap();
    assert_eq!(count.get(), 4);
    assert_eq!(prop.get(&d).unwrap(), Value::list([40, 30, 20]));
}

#[test]
fn list_property_check() {
    let prop = Property::list(Vec::<i64>::new()).build();
    let d = linked("items", &prop);
    prop.set(&d, Value::list([1, 2])).unwrap();
    assert!(prop.set(&d, "not a list").is_err());
    assert!(prop.set(&d, Value::None).is_err());
    assert_eq!(prop.get(&d).unwrap(), Value::list([1, 2]));
}

#[test]
fn assigned_list_is_copied() {
    let prop = Property::list(Vec::<i64>::new()).build();
    let d = linked("items", &prop);
    let source = Value::list([1, 2]);
    prop.set(&d, source.clone()).unwrap();
    source.as_list().unwrap().push(3).unwrap();
    assert_eq!(prop.get(&d).unwrap(), Value::list([1, 2]));
}

#[test]
fn dict_proxy_operations_dispatch_once_each() {
    let prop = Property::dict(Value::dict(Vec::<(String, Value)>::new())).build();
    let d = linked("x", &prop);
    let (count, observer) = counter();
    prop.bind(&d, observer).unwrap();

    let value = prop.get(&d).unwrap();
    let dict = value.as_dict().unwrap();

    dict.insert("toto", 1).unwrap();
    assert_eq!(count.get(), 1);
    dict.insert("toto", 2).unwrap();
    assert_eq!(count.get(), 2);
    dict.insert("youupi", 2).unwrap();
    assert_eq!(count.get(), 3);
    dict.remove("toto").unwrap();
    assert_eq!(count.get(), 4);
    dict.update([("bleh", 5)]).unwrap();
    assert_eq!(count.get(), 5);

    dict.remove("missing").unwrap();
    dict.set_default("bleh", 0).unwrap();
    assert_eq!(count.get(), 5);
    assert_eq!(dict.keys(), ["bleh", "youupi"]);
}

#[test]
fn container_properties_with_none_default() {
    let d = Dispatcher::bare();
    let l1 = Property::list(Value::None).build();
    let d1 = Property::dict(Value::None).build();
    l1.link(&d, "l1").unwrap();
    d1.link(&d, "d1").unwrap();
    assert!(l1.get(&d).unwrap().is_none());
    assert!(d1.get(&d).unwrap().is_none());

    let l2 = Property::list(Value::list([1, 2, 3])).allow_none(true).build();
    let d2 = Property::dict(Value::dict([("a", 1), ("b", 2)]))
        .allow_none(true)
        .build();
    l2.link(&d, "l2").unwrap();
    d2.link(&d, "d2").unwrap();
    l2.set(&d, Value::None).unwrap();
    d2.set(&d, Value::None).unwrap();
    assert!(l2.get(&d).unwrap().is_none());
    assert!(d2.get(&d).unwrap().is_none());
}

#[test]
fn container_of_dropped_owner_is_detached() {
    let prop = Property::list(Value::list([1])).build();
    let d = linked("items", &prop);
    let value = prop.get(&d).unwrap();
    drop(d);
    let list = value.as_list().unwrap();
    list.push(2).unwrap();
    assert_eq!(list.len(), 2);
}

// ============================================================================
// Colors
// ============================================================================

#[test]
fn color_property() {
    let d = Dispatcher::bare();
    let color = Property::color([1, 1, 1, 1]).build();
    let color2 = Property::color([1, 1, 1, 1]).build();
    color.link(&d, "color").unwrap();
    color2.link(&d, "color2").unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [1.0, 1.0, 1.0, 1.0]);

    color.set(&d, "yellow").unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [1.0, 1.0, 0.0, 1.0]);

    color.set(&d, "#00ff00").unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [0.0, 1.0, 0.0, 1.0]);

    color.set(&d, "#7f7fff7f").unwrap();
    let third = 127.0 / 255.0;
    assert_eq!(floats(&color.get(&d).unwrap()), [third, third, 1.0, third]);

    color.set(&d, Value::list([1, 1, 0])).unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [1.0, 1.0, 0.0, 1.0]);
    color.set(&d, Value::list([1, 1, 0, 0])).unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [1.0, 1.0, 0.0, 0.0]);

    color.set(&d, Value::list([1, 1, 1, 1])).unwrap();
    let value = color.get(&d).unwrap();
    value.as_list().unwrap().set(0, 0.5).unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [0.5, 1.0, 1.0, 1.0]);

    assert_eq!(floats(&color2.get(&d).unwrap()), [1.0, 1.0, 1.0, 1.0]);
    color2.set(&d, color.get(&d).unwrap()).unwrap();
    assert_eq!(floats(&color2.get(&d).unwrap()), [0.5, 1.0, 1.0, 1.0]);

    color.set(&d, Value::list([1, 1, 1, 1])).unwrap();
    let value = color.get(&d).unwrap();
    value.as_list().unwrap().set_slice(.., [0, 1, 0, 1]).unwrap();
    assert_eq!(floats(&color.get(&d).unwrap()), [0.0, 1.0, 0.0, 1.0]);
}

#[test]
fn color_property_rejects_garbage() {
    let color = Property::color([1, 1, 1, 1]).build();
    let d = linked("color", &color);
    assert!(color.set(&d, "#12345").is_err());
    assert!(color.set(&d, "notacolor").is_err());
    assert!(color.set(&d, Value::list([1, 2])).is_err());
    assert!(color.set(&d, 3).is_err());
}

// ============================================================================
// Reference lists
// ============================================================================

#[test]
fn reference_list_follows_and_writes_children() {
    let d = Dispatcher::bare();
    let x = Property::numeric(0).build();
    let y = Property::numeric(0).build();
    x.link(&d, "x").unwrap();
    y.link(&d, "y").unwrap();
    let pos = Property::reference_list([x.clone(), y.clone()]).build();
    pos.link(&d, "pos").unwrap();
    pos.link_deps(&d).unwrap();

    assert_eq!(pos.get(&d).unwrap(), Value::list([0, 0]));
    x.set(&d, 50).unwrap();
    assert_eq!(pos.get(&d).unwrap(), Value::list([50, 0]));
    y.set(&d, 50).unwrap();
    assert_eq!(pos.get(&d).unwrap(), Value::list([50, 50]));

    pos.set(&d, Value::list([0, 0])).unwrap();
    assert_eq!(x.get(&d).unwrap(), Value::from(0));
    assert_eq!(y.get(&d).unwrap(), Value::from(0));

    let (count, observer) = counter();
    pos.bind(&d, observer).unwrap();
    x.set(&d, 99).unwrap();
    assert_eq!(count.get(), 1);
}

#[test]
fn reference_list_in_place_update() {
    let d = Dispatcher::bare();
    let x = Property::numeric(0).build();
    let y = Property::numeric(0).build();
    x.link(&d, "x").unwrap();
    y.link(&d, "y").unwrap();
    let pos = Property::reference_list([x, y]).build();
    pos.link(&d, "pos").unwrap();
    pos.link_deps(&d).unwrap();

    pos.get(&d).unwrap().as_list().unwrap().set(0, 10).unwrap();
    assert_eq!(pos.get(&d).unwrap(), Value::list([10, 0]));

    pos.get(&d)
        .unwrap()
        .as_list()
        .unwrap()
        .set_slice(.., [20, 30])
        .unwrap();
    assert_eq!(pos.get(&d).unwrap(), Value::list([20, 30]));
}

// ============================================================================
// Units
// ============================================================================

#[test]
fn variable_list_arity() {
    let prop = Property::variable_list(Value::list([0, 0, 0, 0]), 4).build();
    let d = linked("padding", &prop);

    prop.set(&d, 5).unwrap();
    assert_eq!(floats(&prop.get(&d).unwrap()), [5.0; 4]);
    prop.set(&d, Value::list([1, 2])).unwrap();
    assert_eq!(floats(&prop.get(&d).unwrap()), [1.0, 2.0, 1.0, 2.0]);
    assert!(prop.set(&d, Value::list([1, 2, 3])).is_err());
    assert_eq!(floats(&prop.get(&d).unwrap()), [1.0, 2.0, 1.0, 2.0]);

    let value = prop.get(&d).unwrap();
    let list = value.as_list().unwrap();
    list.set(0, "4dp").unwrap();
    assert_eq!(floats(&prop.get(&d).unwrap())[0], 4.0 * UnitContext::density());
    assert!(list.push(9).is_err());
    assert_eq!(list.len(), 4);
}
