// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Units and unit-tagged dimensions.

use core::fmt;
use core::str::FromStr;

use crate::metrics::Metrics;

/// A measurement unit.
///
/// Every unit except [`Unit::Px`] depends on the current [`Metrics`]; a value
/// stored in such a unit has to be resolved again whenever the metrics change.
///
/// # Example
///
/// ```
/// use trellis_units::Unit;
///
/// assert_eq!("dp".parse::<Unit>(), Ok(Unit::Dp));
/// assert_eq!(Unit::In.suffix(), "in");
/// assert!(!Unit::Px.is_scaled());
/// assert!(Unit::Sp.is_scaled());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    /// Physical pixels.
    #[default]
    Px,
    /// Density-independent pixels, scaled by the density.
    Dp,
    /// Scale-independent pixels, scaled by the density and the font scale.
    Sp,
    /// Points (1/72 inch).
    Pt,
    /// Inches.
    In,
    /// Centimeters.
    Cm,
    /// Millimeters.
    Mm,
}

impl Unit {
    /// All units, in suffix-matching order.
    pub const ALL: [Self; 7] = [
        Self::Px,
        Self::Dp,
        Self::Sp,
        Self::Pt,
        Self::In,
        Self::Cm,
        Self::Mm,
    ];

    /// Returns the textual suffix of this unit.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Px => "px",
            Self::Dp => "dp",
            Self::Sp => "sp",
            Self::Pt => "pt",
            Self::In => "in",
            Self::Cm => "cm",
            Self::Mm => "mm",
        }
    }

    /// Returns `true` if resolving this unit depends on the metrics.
    #[must_use]
    pub const fn is_scaled(self) -> bool {
        !matches!(self, Self::Px)
    }

    /// Looks up a unit by suffix.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.suffix() == suffix)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Unit {
    type Err = ParseDimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_suffix(s).ok_or(ParseDimensionError::UnknownUnit)
    }
}

/// Error returned when a dimension string cannot be parsed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseDimensionError {
    /// The input was empty (or only whitespace).
    Empty,
    /// The numeric part was not a valid number.
    InvalidNumber,
    /// The suffix did not name a known unit.
    UnknownUnit,
}

impl fmt::Display for ParseDimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty dimension"),
            Self::InvalidNumber => f.write_str("invalid number in dimension"),
            Self::UnknownUnit => f.write_str("unknown unit suffix"),
        }
    }
}

impl core::error::Error for ParseDimensionError {}

/// A number tagged with a [`Unit`].
///
/// # Example
///
/// ```
/// use trellis_units::{Dimension, Metrics, Unit};
///
/// let d = Dimension::parse("99in").unwrap();
/// assert_eq!(d.value(), 99.0);
/// assert_eq!(d.unit(), Unit::In);
/// assert_eq!(d.to_px(&Metrics::default()), 9504.0);
///
/// // Plain numbers are pixels.
/// assert_eq!(Dimension::parse("2").unwrap(), Dimension::px(2.0));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Dimension {
    value: f64,
    unit: Unit,
}

impl Dimension {
    /// Creates a dimension from a value and a unit.
    #[must_use]
    pub const fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Creates a pixel dimension.
    #[must_use]
    pub const fn px(value: f64) -> Self {
        Self::new(value, Unit::Px)
    }

    /// Creates a density-independent dimension.
    #[must_use]
    pub const fn dp(value: f64) -> Self {
        Self::new(value, Unit::Dp)
    }

    /// Creates a scale-independent dimension.
    #[must_use]
    pub const fn sp(value: f64) -> Self {
        Self::new(value, Unit::Sp)
    }

    /// Returns the unresolved numeric part.
    #[must_use]
    #[inline]
    pub const fn value(self) -> f64 {
        self.value
    }

    /// Returns the unit.
    #[must_use]
    #[inline]
    pub const fn unit(self) -> Unit {
        self.unit
    }

    /// Returns `true` if resolving this dimension depends on the metrics.
    #[must_use]
    #[inline]
    pub const fn is_scaled(self) -> bool {
        self.unit.is_scaled()
    }

    /// Resolves this dimension to pixels under `metrics`.
    #[must_use]
    pub fn to_px(self, metrics: &Metrics) -> f64 {
        self.value * metrics.scale(self.unit)
    }

    /// Parses `"<number><unit>"`, or a bare number as pixels.
    ///
    /// Surrounding whitespace is ignored, as is whitespace between the number
    /// and the suffix.
    pub fn parse(text: &str) -> Result<Self, ParseDimensionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseDimensionError::Empty);
        }

        let split = text
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_alphabetic())
            .last()
            .map(|(i, _)| i);

        let (number, unit) = match split {
            Some(i) if i > 0 => {
                let suffix = &text[i..];
                let unit = Unit::from_suffix(suffix).ok_or(ParseDimensionError::UnknownUnit)?;
                (text[..i].trim_end(), unit)
            }
            Some(_) => return Err(ParseDimensionError::InvalidNumber),
            None => (text, Unit::Px),
        };

        let value = number
            .parse::<f64>()
            .map_err(|_| ParseDimensionError::InvalidNumber)?;
        Ok(Self::new(value, unit))
    }
}

impl FromStr for Dimension {
    type Err = ParseDimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}
