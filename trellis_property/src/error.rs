// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use core::fmt;
use std::error::Error;

use thiserror::Error;

/// Errors raised by property operations.
#[derive(Debug, Error)]
pub enum PropertyError {
    /// A value was rejected by the property's validation rules.
    #[error("{property}: {message}")]
    Validation {
        /// Name of the property that rejected the value.
        property: String,
        /// What was wrong with the value.
        message: String,
    },

    /// A set was attempted on an alias without a setter.
    #[error("{property} is read-only")]
    ReadOnly {
        /// Name of the read-only property.
        property: String,
    },

    /// An instance was constructed with names that are not properties.
    #[error(
        "Properties {invalid} passed to constructor may not be existing property names. Valid properties are {valid}"
    )]
    UnknownProperties {
        /// The offending names.
        invalid: NameList,
        /// The property names the class declares.
        valid: NameList,
    },

    /// A name-based lookup did not find a property.
    #[error("{owner} has no property '{name}'")]
    UnknownProperty {
        /// Class name of the instance that was searched.
        owner: String,
        /// The name that was looked up.
        name: String,
    },

    /// A reserved or internal name was used for a property.
    #[error("'{name}' is a reserved name and cannot be used for a property")]
    ReservedName {
        /// The rejected name.
        name: String,
    },

    /// Declared dependencies form a cycle.
    #[error("{property} depends on {dependency}, which closes a dependency cycle")]
    DependencyCycle {
        /// The property whose dependency closes the cycle.
        property: String,
        /// The dependency that closes the cycle.
        dependency: String,
    },

    /// A descriptor was used by name before it received one.
    #[error("property has no name; call `set_name` or `link` first")]
    Unnamed,

    /// A list mutation addressed an index outside the list.
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Length of the list at the time of the mutation.
        len: usize,
    },

    /// An error raised by a class initializer, passed through unchanged.
    #[error(transparent)]
    Construction(Box<dyn Error + 'static>),

    /// An error raised by an observer, getter or setter, passed through unchanged.
    #[error(transparent)]
    Callback(Box<dyn Error + 'static>),
}

impl PropertyError {
    /// Wraps an initializer failure.
    pub fn construction(error: impl Into<Box<dyn Error + 'static>>) -> Self {
        Self::Construction(error.into())
    }

    /// Wraps a failure raised by user code running inside a dispatch.
    pub fn callback(error: impl Into<Box<dyn Error + 'static>>) -> Self {
        Self::Callback(error.into())
    }

    pub(crate) fn validation(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            property: property.into(),
            message: message.into(),
        }
    }
}

/// A list of names, displayed as `['a', 'b']`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    /// Creates a sorted list of names.
    pub fn sorted(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        Self(names)
    }

    /// Returns the names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for NameList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{name}'")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_properties_message() {
        let err = PropertyError::UnknownProperties {
            invalid: NameList::sorted(["unkn"]),
            valid: NameList::sorted(["width"]),
        };
        assert_eq!(
            err.to_string(),
            "Properties ['unkn'] passed to constructor may not be existing property names. \
             Valid properties are ['width']"
        );
    }

    #[test]
    fn name_list_is_sorted() {
        let list = NameList::sorted(["b", "a", "c"]);
        assert_eq!(list.to_string(), "['a', 'b', 'c']");
        assert_eq!(NameList::default().to_string(), "[]");
    }

    #[test]
    fn construction_error_is_transparent() {
        let err = PropertyError::construction("this is a typeerror unrelated to object");
        assert_eq!(err.to_string(), "this is a typeerror unrelated to object");
    }
}
