// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Units: measurement units and display metrics.
//!
//! Numeric properties in `trellis_property` accept values such as `"55dp"` or
//! `"2in"`. This crate provides the vocabulary for those values:
//!
//! - [`Unit`]: the closed set of supported units (`px`, `dp`, `sp`, `pt`,
//!   `in`, `cm`, `mm`).
//! - [`Dimension`]: a number tagged with a unit, parsed from text with
//!   [`Dimension::parse`].
//! - [`Metrics`]: the scale record (density, font scale, dpi) that turns a
//!   [`Dimension`] into pixels.
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis_units::{Dimension, Metrics, Unit};
//!
//! let d = Dimension::parse("55dp").unwrap();
//! assert_eq!(d.unit(), Unit::Dp);
//!
//! let metrics = Metrics::new(2.0);
//! assert_eq!(d.to_px(&metrics), 110.0);
//!
//! // Inches follow the dpi, which tracks density unless overridden.
//! let inch = Dimension::parse("1in").unwrap();
//! assert_eq!(inch.to_px(&metrics), 192.0);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and does not allocate.

#![no_std]

mod metrics;
mod unit;

pub use metrics::{BASE_DPI, Metrics};
pub use unit::{Dimension, ParseDimensionError, Unit};
