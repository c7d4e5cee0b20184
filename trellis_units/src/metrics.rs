// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display metrics.

use crate::unit::Unit;

/// Dots per inch at density 1.
pub const BASE_DPI: f64 = 96.0;

/// The scale record used to resolve [`Dimension`](crate::Dimension)s.
///
/// The dpi follows the density (`BASE_DPI * density`) unless it was set
/// explicitly with [`Metrics::with_dpi`].
///
/// # Example
///
/// ```
/// use trellis_units::{Metrics, Unit};
///
/// let metrics = Metrics::new(2.0).with_fontscale(1.5);
/// assert_eq!(metrics.scale(Unit::Dp), 2.0);
/// assert_eq!(metrics.scale(Unit::Sp), 3.0);
/// assert_eq!(metrics.dpi(), 192.0);
///
/// let fixed = metrics.with_dpi(300.0);
/// assert_eq!(fixed.scale(Unit::In), 300.0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Metrics {
    density: f64,
    fontscale: f64,
    dpi: Option<f64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Metrics {
    /// Creates metrics with the given density and default font scale.
    #[must_use]
    pub const fn new(density: f64) -> Self {
        Self {
            density,
            fontscale: 1.0,
            dpi: None,
        }
    }

    /// Returns a copy with the given density.
    #[must_use]
    pub fn with_density(self, density: f64) -> Self {
        Self { density, ..self }
    }

    /// Returns a copy with the given font scale.
    #[must_use]
    pub fn with_fontscale(self, fontscale: f64) -> Self {
        Self { fontscale, ..self }
    }

    /// Returns a copy with an explicit dpi that no longer follows the density.
    #[must_use]
    pub fn with_dpi(self, dpi: f64) -> Self {
        Self {
            dpi: Some(dpi),
            ..self
        }
    }

    /// Returns the density (pixels per `dp`).
    #[must_use]
    #[inline]
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Returns the font scale applied on top of the density for `sp`.
    #[must_use]
    #[inline]
    pub fn fontscale(&self) -> f64 {
        self.fontscale
    }

    /// Returns the effective dpi.
    #[must_use]
    pub fn dpi(&self) -> f64 {
        self.dpi.unwrap_or(BASE_DPI * self.density)
    }

    /// Returns `true` if the dpi was set explicitly.
    #[must_use]
    pub fn has_fixed_dpi(&self) -> bool {
        self.dpi.is_some()
    }

    /// Returns how many pixels one `unit` is worth.
    #[must_use]
    pub fn scale(&self, unit: Unit) -> f64 {
        match unit {
            Unit::Px => 1.0,
            Unit::Dp => self.density,
            Unit::Sp => self.density * self.fontscale,
            Unit::Pt => self.dpi() / 72.0,
            Unit::In => self.dpi(),
            Unit::Cm => self.dpi() / 2.54,
            Unit::Mm => self.dpi() / 25.4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dimension;

    #[test]
    fn defaults() {
        let m = Metrics::default();
        assert_eq!(m.density(), 1.0);
        assert_eq!(m.fontscale(), 1.0);
        assert_eq!(m.dpi(), BASE_DPI);
        assert!(!m.has_fixed_dpi());
    }

    #[test]
    fn dpi_tracks_density() {
        let m = Metrics::default().with_density(2.0);
        assert_eq!(m.dpi(), 192.0);
        assert_eq!(Dimension::parse("99in").unwrap().to_px(&m), 9504.0 * 2.0);
    }

    #[test]
    fn fixed_dpi_ignores_density() {
        let m = Metrics::default().with_dpi(160.0).with_density(3.0);
        assert_eq!(m.dpi(), 160.0);
        assert_eq!(m.scale(Unit::Dp), 3.0);
    }

    #[test]
    fn physical_units() {
        let m = Metrics::default().with_dpi(72.0);
        assert_eq!(m.scale(Unit::Pt), 1.0);
        assert!((m.scale(Unit::Cm) - 72.0 / 2.54).abs() < 1e-12);
        assert!((m.scale(Unit::Mm) - 72.0 / 25.4).abs() < 1e-12);
    }

    #[test]
    fn dp_resolution() {
        let d = Dimension::dp(55.0);
        assert_eq!(d.to_px(&Metrics::new(2.0)), 110.0);
        assert_eq!(d.to_px(&Metrics::new(1.0)), 55.0);
    }
}
