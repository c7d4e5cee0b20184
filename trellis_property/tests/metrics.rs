// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Changing the display metrics.
//!
//! The metrics are process-wide, so every test here takes `exclusive`
//! first and starts from the default metrics.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::thread;

use parking_lot::{Mutex, MutexGuard};
use trellis_property::{ClassBuilder, Dispatcher, Metrics, Property, UnitContext, Value};

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn exclusive() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock();
    UnitContext::set_metrics(Metrics::default()).unwrap();
    guard
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

#[test]
fn numeric_property_follows_density() {
    let _metrics = exclusive();
    let class = ClassBuilder::new("Number")
        .property("with_dp", Property::numeric(5).build())
        .property("no_dp", Property::numeric(10).build())
        .property("default_dp", Property::numeric("10dp").build())
        .build()
        .unwrap();
    let number = Dispatcher::new(&class).unwrap();

    let counts = Rc::new(RefCell::new(BTreeMap::<String, usize>::new()));
    for name in ["with_dp", "no_dp", "default_dp"] {
        let counts = counts.clone();
        number
            .fbind(name, vec![Value::from(name)], move |args, _, _| {
                let key = args[0].as_str().unwrap_or_default().to_owned();
                *counts.borrow_mut().entry(key).or_insert(0) += 1;
            })
            .unwrap();
    }
    let count = |name: &str| counts.borrow().get(name).copied().unwrap_or(0);
    let get = |name: &str| number.get(name).unwrap().as_f64().unwrap();

    assert_eq!((get("with_dp"), get("no_dp"), get("default_dp")), (5.0, 10.0, 10.0));

    number.set("with_dp", 10).unwrap();
    assert_eq!(count("with_dp"), 1);

    UnitContext::set_density(2.0).unwrap();
    assert_eq!((count("with_dp"), count("no_dp"), count("default_dp")), (1, 0, 1));
    assert_eq!((get("with_dp"), get("no_dp"), get("default_dp")), (10.0, 10.0, 20.0));

    number.set("with_dp", "20dp").unwrap();
    number.set("no_dp", 20).unwrap();
    assert_eq!((count("with_dp"), count("no_dp"), count("default_dp")), (2, 1, 1));
    assert_eq!((get("with_dp"), get("no_dp"), get("default_dp")), (40.0, 20.0, 20.0));

    UnitContext::set_density(1.0).unwrap();
    assert_eq!((count("with_dp"), count("no_dp"), count("default_dp")), (3, 1, 2));
    assert_eq!((get("with_dp"), get("no_dp"), get("default_dp")), (20.0, 20.0, 10.0));
}

fn dp_list() -> Value {
    Value::list([
        Value::from("10dp"),
        Value::list([Value::from(20), Value::from("dp")]),
        Value::from(3),
        Value::from(4.0),
    ])
}

#[test]
fn variable_list_default_follows_density() {
    let _metrics = exclusive();
    let class = ClassBuilder::new("Number")
        .property("a", Property::variable_list(dp_list(), 4).build())
        .build()
        .unwrap();
    let number = Dispatcher::new(&class).unwrap();
    let (count, observer) = counter();
    number.bind("a", observer).unwrap();

    assert_eq!(floats(&number.get("a").unwrap()), [10.0, 20.0, 3.0, 4.0]);
    assert_eq!(count.get(), 0);

    UnitContext::set_density(2.0).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(floats(&number.get("a").unwrap()), [20.0, 40.0, 3.0, 4.0]);

    UnitContext::set_density(1.0).unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(floats(&number.get("a").unwrap()), [10.0, 20.0, 3.0, 4.0]);
}

#[test]
fn variable_list_assignment_follows_density() {
    let _metrics = exclusive();
    let class = ClassBuilder::new("Number")
        .property("a", Property::variable_list(Value::list([0, 20, 3, 4]), 4).build())
        .build()
        .unwrap();
    let number = Dispatcher::new(&class).unwrap();
    let (count, observer) = counter();
    number.bind("a", observer).unwrap();

    UnitContext::set_density(3.0).unwrap();
    UnitContext::set_density(1.0).unwrap();
    assert_eq!(count.get(), 0);

    number.set("a", dp_list()).unwrap();
    assert_eq!(floats(&number.get("a").unwrap()), [10.0, 20.0, 3.0, 4.0]);
    assert_eq!(count.get(), 1);

    UnitContext::set_density(2.0).unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(floats(&number.get("a").unwrap()), [20.0, 40.0, 3.0, 4.0]);

    UnitContext::set_density(1.0).unwrap();
    assert_eq!(count.get(), 3);
    assert_eq!(floats(&number.get("a").unwrap()), [10.0, 20.0, 3.0, 4.0]);
}

#[test]
fn metrics_are_shared_across_threads() {
    let _metrics = exclusive();
    UnitContext::set_density(2.0).unwrap();

    let (density, padding) = thread::spawn(|| {
        let prop = Property::numeric("10dp").build();
        let d = Dispatcher::bare();
        prop.link(&d, "padding").unwrap();
        (UnitContext::density(), prop.get(&d).unwrap().as_f64().unwrap())
    })
    .join()
    .unwrap();
    assert_eq!((density, padding), (2.0, 20.0));
}

#[test]
fn other_threads_catch_up_on_refresh() {
    let _metrics = exclusive();
    let class = ClassBuilder::new("Number")
        .property("a", Property::variable_list(dp_list(), 4).build())
        .build()
        .unwrap();
    let number = Dispatcher::new(&class).unwrap();
    let (count, observer) = counter();
    number.bind("a", observer).unwrap();

    thread::spawn(|| UnitContext::set_density(2.0).unwrap())
        .join()
        .unwrap();
    assert_eq!(UnitContext::density(), 2.0);
    assert_eq!(count.get(), 0);
    assert_eq!(floats(&number.get("a").unwrap()), [10.0, 20.0, 3.0, 4.0]);

    UnitContext::refresh().unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(floats(&number.get("a").unwrap()), [20.0, 40.0, 3.0, 4.0]);

    UnitContext::refresh().unwrap();
    assert_eq!(count.get(), 1);
}

#[test]
fn initialize_after_a_change_is_ignored() {
    let _metrics = exclusive();
    assert!(!UnitContext::initialize(Metrics::new(4.0)));
    assert_eq!(UnitContext::metrics(), Metrics::default());
}
