//! Tuning parameters for the LOD strategies.

use crate::LodError;

/// Parameters of [`LodRaycast`](crate::LodRaycast).
///
/// A hit's score is its distance, optionally raised as `(2d)^level` and/or
/// turned into `1.3 * scale / d`. Scores above `threshold_up` subdivide the
/// hit tile; scores below `threshold_down` simplify its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodSettings {
    /// Random rays cast per tick. At least 1.
    pub subdivision_rays: u32,
    /// Score above which the hit tile subdivides.
    pub threshold_up: f64,
    /// Score below which the hit tile's parent simplifies. Must be below
    /// `threshold_up`.
    pub threshold_down: f64,
    /// Raise the distance as `(2d)^level`.
    pub use_power_distance: bool,
    /// Replace the distance by `1.3 * scale / d`.
    pub use_scale_distance: bool,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            subdivision_rays: 1,
            threshold_up: 0.6,
            threshold_down: 0.15,
            use_power_distance: false,
            use_scale_distance: true,
        }
    }
}

impl LodSettings {
    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// [`LodError::InvalidSettings`] naming the first offending parameter.
    pub fn validate(&self) -> Result<(), LodError> {
        if self.subdivision_rays == 0 {
            return Err(LodError::InvalidSettings(
                "subdivision_rays must be at least 1".into(),
            ));
        }
        if !self.threshold_up.is_finite() || !self.threshold_down.is_finite() {
            return Err(LodError::InvalidSettings("thresholds must be finite".into()));
        }
        if self.threshold_up < 0.0 || self.threshold_down < 0.0 {
            return Err(LodError::InvalidSettings("thresholds must not be negative".into()));
        }
        if self.threshold_down >= self.threshold_up {
            return Err(LodError::InvalidSettings(format!(
                "threshold_down ({}) must be below threshold_up ({})",
                self.threshold_down, self.threshold_up
            )));
        }
        Ok(())
    }
}

/// Parameters of [`LodRadial`](crate::LodRadial), as multiples of tile width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadialSettings {
    /// Subdivide a tile whose centre is closer than this many tile widths.
    pub subdivide_factor: f64,
    /// Simplify a parent whose centre is farther than this many of its widths.
    /// Must exceed `subdivide_factor`.
    pub simplify_factor: f64,
}

impl Default for RadialSettings {
    fn default() -> Self {
        Self {
            subdivide_factor: 2.0,
            simplify_factor: 4.0,
        }
    }
}

impl RadialSettings {
    /// # Errors
    ///
    /// [`LodError::InvalidSettings`] unless `0 < subdivide_factor < simplify_factor`.
    pub fn validate(&self) -> Result<(), LodError> {
        let ordered = self.subdivide_factor > 0.0
            && self.simplify_factor.is_finite()
            && self.subdivide_factor < self.simplify_factor;
        if ordered {
            Ok(())
        } else {
            Err(LodError::InvalidSettings(format!(
                "radial factors must satisfy 0 < subdivide ({}) < simplify ({})",
                self.subdivide_factor, self.simplify_factor
            )))
        }
    }
}
