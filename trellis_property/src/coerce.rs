// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Validation and coercion of assigned values, per property kind.

use trellis_units::{Dimension, Metrics, Unit};

use crate::color;
use crate::container::{ObservableDict, ObservableList, Owner};
use crate::descriptor::{Bounds, BoundsRecovery, Property, PropertyKind};
use crate::dispatcher::Dispatcher;
use crate::error::PropertyError;
use crate::store::Extra;
use crate::units::UnitContext;
use crate::value::Value;

/// A coerced value ready to be stored.
pub(crate) struct Stored {
    pub(crate) value: Value,
    /// Unresolved elements, for variable lists.
    pub(crate) raw: Option<Vec<Value>>,
}

impl Stored {
    fn plain(value: Value) -> Self {
        Self { value, raw: None }
    }
}

impl Property {
    /// Validates `value` against this property's kind and converts it to the
    /// stored representation. Containers come back bound to `dispatcher`.
    pub(crate) fn coerce(&self, dispatcher: &Dispatcher, value: Value) -> Result<Stored, PropertyError> {
        if value.is_none() {
            return if self.allows_none() {
                Ok(Stored::plain(Value::None))
            } else {
                Err(self.invalid(format!("{} does not accept None", self.kind().name())))
            };
        }

        let value = match self.kind() {
            PropertyKind::Object | PropertyKind::ReferenceList(_) | PropertyKind::Alias(_) => value,
            PropertyKind::Numeric => numeric(value).map_err(|m| self.invalid(m))?,
            PropertyKind::BoundedNumeric(bounds) => self.bounded(dispatcher, bounds, value)?,
            PropertyKind::String => match value {
                Value::Str(_) => value,
                other => {
                    return Err(self.invalid(format!(
                        "StringProperty accepts only str, got {}",
                        other.type_name()
                    )));
                }
            },
            PropertyKind::Boolean => match value {
                Value::Bool(_) => value,
                other => {
                    return Err(self.invalid(format!(
                        "BooleanProperty accepts only bool, got {}",
                        other.type_name()
                    )));
                }
            },
            PropertyKind::Options(options) => {
                if !options.contains(&value) {
                    return Err(self.invalid(format!(
                        "{value} is not one of the options {options:?}"
                    )));
                }
                value
            }
            PropertyKind::List => match value {
                Value::List(source) => {
                    Value::List(ObservableList::bound(source.to_vec(), self.owner(dispatcher)))
                }
                other => {
                    return Err(self.invalid(format!(
                        "ListProperty accepts only list, got {}",
                        other.type_name()
                    )));
                }
            },
            PropertyKind::Dict => match value {
                Value::Dict(source) => {
                    Value::Dict(ObservableDict::bound(source.to_map(), self.owner(dispatcher)))
                }
                other => {
                    return Err(self.invalid(format!(
                        "DictProperty accepts only dict, got {}",
                        other.type_name()
                    )));
                }
            },
            PropertyKind::Color => {
                let rgba = color::parse(&value).map_err(|m| self.invalid(m))?;
                let components = rgba.iter().copied().map(Value::Float).collect();
                Value::List(ObservableList::bound(components, self.owner(dispatcher)))
            }
            PropertyKind::VariableList { length } => {
                let raw = variable_list(&value, *length).map_err(|m| self.invalid(m))?;
                let resolved = resolve_all(&raw, &UnitContext::metrics());
                return Ok(Stored {
                    value: Value::List(ObservableList::bound(resolved, self.owner(dispatcher))),
                    raw: Some(raw),
                });
            }
        };
        Ok(Stored::plain(value))
    }

    pub(crate) fn owner(&self, dispatcher: &Dispatcher) -> Owner {
        Owner::new(dispatcher.downgrade(), self.clone())
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> PropertyError {
        PropertyError::validation(self.display_name(), message)
    }

    /// Returns the bounds in effect on `dispatcher`.
    pub(crate) fn current_bounds(
        &self,
        dispatcher: &Dispatcher,
        bounds: &Bounds,
    ) -> (Option<f64>, Option<f64>) {
        dispatcher
            .store()
            .get(self.id())
            .and_then(|record| match record.extra {
                Extra::Bounds { min, max } => Some((min, max)),
                _ => None,
            })
            .unwrap_or((bounds.lower(), bounds.upper()))
    }

    fn bounded(
        &self,
        dispatcher: &Dispatcher,
        bounds: &Bounds,
        value: Value,
    ) -> Result<Value, PropertyError> {
        let value = unscaled(value).map_err(|m| self.invalid(m))?;
        let (min, max) = self.current_bounds(dispatcher, bounds);
        let check = |value: &Value| check_range(value, min, max);

        let Err(message) = check(&value) else {
            return Ok(value);
        };
        let replacement = match bounds.recovery() {
            BoundsRecovery::Fail => return Err(self.invalid(message)),
            BoundsRecovery::Value(replacement) => replacement.clone(),
            BoundsRecovery::Handler(handler) => handler(&value),
        };
        let replacement = unscaled(replacement).map_err(|m| self.invalid(m))?;
        check(&replacement).map_err(|m| self.invalid(format!("replacement {m}")))?;
        log::warn!(
            "{}: {message}; using {replacement} instead",
            self.display_name()
        );
        Ok(replacement)
    }
}

fn check_range(value: &Value, min: Option<f64>, max: Option<f64>) -> Result<(), String> {
    let Some(x) = value.as_f64() else {
        return Err(format!("{value} is not a number"));
    };
    if let Some(min) = min
        && x < min
    {
        return Err(format!("value {x} is below the minimum bound {min}"));
    }
    if let Some(max) = max
        && x > max
    {
        return Err(format!("value {x} is above the maximum bound {max}"));
    }
    Ok(())
}

/// Bounds compare plain numbers, so a bounded value must not depend on the
/// metrics. Pixel dimensions collapse to floats; scaled units are refused.
fn unscaled(value: Value) -> Result<Value, String> {
    match numeric(value)? {
        Value::Dimension(dimension) if dimension.is_scaled() => Err(format!(
            "BoundedNumericProperty accepts only plain numbers, got {dimension}"
        )),
        Value::Dimension(dimension) => Ok(Value::Float(dimension.value())),
        plain => Ok(plain),
    }
}

/// Accepts numbers, unit strings, dimensions and `[number, "unit"]` pairs.
///
/// A string without a unit suffix becomes a plain float.
pub(crate) fn numeric(value: Value) -> Result<Value, String> {
    match value {
        Value::Int(_) | Value::Float(_) | Value::Dimension(_) => Ok(value),
        Value::Str(text) => {
            let dimension = Dimension::parse(&text)
                .map_err(|e| format!("{text:?} is not a number or dimension: {e}"))?;
            if text.trim_end().ends_with(|c: char| c.is_ascii_alphabetic()) {
                Ok(Value::Dimension(dimension))
            } else {
                Ok(Value::Float(dimension.value()))
            }
        }
        Value::List(list) => unit_pair(&list.to_vec())
            .map(Value::Dimension)
            .ok_or_else(|| format!("{list:?} is not a [number, \"unit\"] pair")),
        other => Err(format!(
            "NumericProperty accepts only int, float or a dimension, got {}",
            other.type_name()
        )),
    }
}

fn unit_pair(items: &[Value]) -> Option<Dimension> {
    let [number, unit] = items else {
        return None;
    };
    let unit = Unit::from_suffix(unit.as_str()?)?;
    Some(Dimension::new(number.as_f64()?, unit))
}

/// Normalizes a variable-list assignment to exactly `length` elements.
///
/// One element is repeated; two elements for a length of four become
/// `[a, b, a, b]`. A lone `[number, "unit"]` pair counts as one element.
pub(crate) fn variable_list(value: &Value, length: usize) -> Result<Vec<Value>, String> {
    if !matches!(length, 2 | 4) {
        return Err(format!(
            "VariableListProperty length must be 2 or 4, got {length}"
        ));
    }
    let items = match value {
        Value::List(list) => {
            let items = list.to_vec();
            if unit_pair(&items).is_some() {
                vec![value.clone()]
            } else {
                items
            }
        }
        scalar => vec![scalar.clone()],
    };
    let elements = items
        .into_iter()
        .map(|item| match item {
            Value::Int(_) | Value::Float(_) | Value::Dimension(_) | Value::Str(_) | Value::List(_) => {
                numeric(item)
            }
            other => Err(format!(
                "VariableListProperty elements must be numbers or dimensions, got {}",
                other.type_name()
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match (elements.as_slice(), length) {
        ([single], _) => Ok(vec![single.clone(); length]),
        ([a, b], 4) => Ok(vec![a.clone(), b.clone(), a.clone(), b.clone()]),
        (elements, length) if elements.len() == length => Ok(elements.to_vec()),
        (elements, _) => Err(format!(
            "VariableListProperty of length {length} accepts 1, 2 or {length} values, got {}",
            elements.len()
        )),
    }
}

/// Resolves a unit-tagged value to pixels; other values are returned as is.
pub(crate) fn resolve(value: &Value, metrics: &Metrics) -> Value {
    match value {
        Value::Dimension(dimension) => Value::Float(dimension.to_px(metrics)),
        other => other.clone(),
    }
}

pub(crate) fn resolve_all(values: &[Value], metrics: &Metrics) -> Vec<Value> {
    values.iter().map(|v| resolve(v, metrics)).collect()
}

/// Returns `true` if `value` carries a unit other than pixels.
pub(crate) fn is_scaled(value: &Value) -> bool {
    matches!(value, Value::Dimension(dimension) if dimension.is_scaled())
}
