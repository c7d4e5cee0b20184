// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The unit context: current display metrics and unit-aware records.
//!
//! Numeric and variable-list properties may hold values in scaled units such
//! as `dp`. Their resolved pixel values depend on the current [`Metrics`].
//!
//! The metrics are shared by the whole process. Unit-aware records belong to
//! the thread that owns their instance, so every thread keeps its own
//! registry of them, in link order, along with the metrics those records were
//! last dispatched for. Changing the metrics redispatches the calling
//! thread's affected records right away; other threads catch up with
//! [`UnitContext::refresh`].

use std::cell::RefCell;

use parking_lot::RwLock;
use trellis_units::Metrics;

use crate::descriptor::Property;
use crate::dispatcher::{Dispatcher, WeakDispatcher};
use crate::error::PropertyError;
use crate::id::{InstanceId, PropertyId};

/// Environment variable read by [`UnitContext::metrics_from_env`] for the density.
pub const DENSITY_ENV: &str = "TRELLIS_METRICS_DENSITY";
/// Environment variable read by [`UnitContext::metrics_from_env`] for the font scale.
pub const FONTSCALE_ENV: &str = "TRELLIS_METRICS_FONTSCALE";
/// Environment variable read by [`UnitContext::metrics_from_env`] for the dpi.
pub const DPI_ENV: &str = "TRELLIS_METRICS_DPI";

struct Shared {
    metrics: Metrics,
    initialized: bool,
}

static SHARED: RwLock<Shared> = parking_lot::const_rwlock(Shared {
    metrics: Metrics::new(1.0),
    initialized: false,
});

struct Target {
    instance: InstanceId,
    handle: WeakDispatcher,
    property: Property,
}

struct Registry {
    /// Metrics the registered records currently reflect.
    seen: Metrics,
    targets: Vec<Target>,
}

thread_local! {
    // Never first touched while `SHARED` is write-locked.
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry {
        seen: UnitContext::metrics(),
        targets: Vec::new(),
    });
}

/// Access to the process-wide metrics and this thread's unit-aware records.
///
/// # Example
///
/// ```
/// use trellis_property::{ClassBuilder, Dispatcher, Property, UnitContext, Value};
///
/// let class = ClassBuilder::new("Label")
///     .property("padding", Property::numeric("10dp").build())
///     .build()
///     .unwrap();
/// let label = Dispatcher::new(&class).unwrap();
/// assert_eq!(label.get("padding").unwrap(), Value::from(10.0));
///
/// UnitContext::set_density(2.0).unwrap();
/// assert_eq!(label.get("padding").unwrap(), Value::from(20.0));
/// ```
#[derive(Copy, Clone, Debug)]
pub struct UnitContext;

impl UnitContext {
    /// Returns the current metrics.
    #[must_use]
    pub fn metrics() -> Metrics {
        SHARED.read().metrics
    }

    /// Returns the current density.
    #[must_use]
    pub fn density() -> f64 {
        Self::metrics().density()
    }

    /// Reads metrics from the `TRELLIS_METRICS_*` environment variables.
    ///
    /// Missing or invalid values fall back to the defaults.
    #[must_use]
    pub fn metrics_from_env() -> Metrics {
        metrics_from_lookup(|key| std::env::var(key).ok())
    }

    /// Installs the startup metrics without redispatching anything.
    ///
    /// Does nothing if the metrics were already initialized or set anywhere
    /// in the process; returns `true` if this call installed them.
    pub fn initialize(metrics: Metrics) -> bool {
        let first = {
            let mut shared = SHARED.write();
            if shared.initialized {
                false
            } else {
                shared.initialized = true;
                shared.metrics = metrics;
                true
            }
        };
        if first {
            REGISTRY.with_borrow_mut(|registry| registry.seen = metrics);
            log::debug!("unit context initialized with {metrics:?}");
        }
        first
    }

    /// Replaces the process-wide metrics and redispatches the affected
    /// records of the calling thread.
    ///
    /// Setting metrics equal to the current ones does nothing beyond a
    /// [`refresh`](Self::refresh). An observer error stops the fan-out and is
    /// returned.
    pub fn set_metrics(metrics: Metrics) -> Result<(), PropertyError> {
        Self::update(|_| metrics)
    }

    /// Redispatches this thread's records that still reflect older metrics.
    ///
    /// Threads other than the one that changed the metrics call this to
    /// bring their records up to date. Every live record whose stored value
    /// carries a scaled unit is redispatched, in link order.
    pub fn refresh() -> Result<(), PropertyError> {
        let metrics = Self::metrics();
        let targets: Vec<(Dispatcher, Property)> = REGISTRY.with_borrow_mut(|registry| {
            if registry.seen == metrics {
                return Vec::new();
            }
            registry.seen = metrics;
            registry.targets.retain(|target| target.handle.is_alive());
            registry
                .targets
                .iter()
                .filter_map(|target| Some((target.handle.upgrade()?, target.property.clone())))
                .collect()
        });
        if !targets.is_empty() {
            log::debug!(
                "refreshing {} unit-aware records for {metrics:?}",
                targets.len()
            );
        }
        for (dispatcher, property) in targets {
            property.metrics_changed(&dispatcher)?;
        }
        Ok(())
    }

    /// Changes the density.
    pub fn set_density(density: f64) -> Result<(), PropertyError> {
        Self::update(|metrics| metrics.with_density(density))
    }

    /// Changes the font scale.
    pub fn set_fontscale(fontscale: f64) -> Result<(), PropertyError> {
        Self::update(|metrics| metrics.with_fontscale(fontscale))
    }

    /// Fixes the dpi.
    pub fn set_dpi(dpi: f64) -> Result<(), PropertyError> {
        Self::update(|metrics| metrics.with_dpi(dpi))
    }

    /// Applies `change` under the write lock, then refreshes this thread.
    fn update(change: impl FnOnce(Metrics) -> Metrics) -> Result<(), PropertyError> {
        {
            let mut shared = SHARED.write();
            shared.initialized = true;
            let metrics = change(shared.metrics);
            if shared.metrics != metrics {
                shared.metrics = metrics;
                log::debug!("metrics changed to {metrics:?}");
            }
        }
        Self::refresh()
    }

    pub(crate) fn register(dispatcher: &Dispatcher, property: &Property) {
        let instance = dispatcher.id();
        REGISTRY.with_borrow_mut(|registry| {
            let known = registry
                .targets
                .iter()
                .any(|t| t.instance == instance && t.property.ptr_eq(property));
            if !known {
                registry.targets.push(Target {
                    instance,
                    handle: dispatcher.downgrade(),
                    property: property.clone(),
                });
            }
        });
    }

    pub(crate) fn forget(instance: InstanceId, property: PropertyId) {
        REGISTRY.with_borrow_mut(|registry| {
            registry
                .targets
                .retain(|t| t.instance != instance || t.property.id() != property);
        });
    }

    /// Drops every record of `instance`. Safe to call during thread teardown
    /// and while a fan-out holds the registry; dead entries are also pruned
    /// lazily.
    pub(crate) fn forget_instance(instance: InstanceId) {
        let _ = REGISTRY.try_with(|registry| {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.targets.retain(|t| t.instance != instance);
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn target_count() -> usize {
        REGISTRY.with_borrow(|registry| registry.targets.len())
    }
}

fn metrics_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Metrics {
    let read = |key: &str| {
        lookup(key)?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
    };
    let mut metrics = Metrics::default();
    if let Some(density) = read(DENSITY_ENV) {
        metrics = metrics.with_density(density);
    }
    if let Some(fontscale) = read(FONTSCALE_ENV) {
        metrics = metrics.with_fontscale(fontscale);
    }
    if let Some(dpi) = read(DPI_ENV) {
        metrics = metrics.with_dpi(dpi);
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lookup() {
        let metrics = metrics_from_lookup(|key| match key {
            DENSITY_ENV => Some("2".into()),
            FONTSCALE_ENV => Some(" 1.5 ".into()),
            DPI_ENV => Some("garbage".into()),
            _ => None,
        });
        assert_eq!(metrics.density(), 2.0);
        assert_eq!(metrics.fontscale(), 1.5);
        assert!(!metrics.has_fixed_dpi());

        let fallback = metrics_from_lookup(|_| Some("-1".into()));
        assert_eq!(fallback, Metrics::default());
    }

    #[test]
    fn dropped_instances_are_forgotten() {
        let prop = Property::numeric("1dp").build();
        let dispatcher = Dispatcher::bare();
        prop.link(&dispatcher, "size").unwrap();
        assert_eq!(UnitContext::target_count(), 1);
        drop(dispatcher);
        assert_eq!(UnitContext::target_count(), 0);
    }
}
