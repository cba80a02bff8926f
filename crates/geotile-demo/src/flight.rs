//! Scripted camera for headless runs: straight down over the root tile,
//! descending geometrically from one altitude to another.

use geotile_coords::TileBounds;
use geotile_lod::Camera;
use glam::DVec3;

pub struct Flight {
    target: DVec3,
    start_altitude: f64,
    end_altitude: f64,
    ticks: u32,
}

impl Flight {
    pub fn new(bounds: &TileBounds, start_altitude: f64, end_altitude: f64, ticks: u32) -> Self {
        Self {
            target: bounds.center_3d(0.0),
            start_altitude: start_altitude.max(f64::EPSILON),
            end_altitude: end_altitude.max(f64::EPSILON),
            ticks,
        }
    }

    /// Height above the target at `tick`.
    pub fn altitude(&self, tick: u32) -> f64 {
        let t = if self.ticks <= 1 {
            1.0
        } else {
            f64::from(tick.min(self.ticks - 1)) / f64::from(self.ticks - 1)
        };
        self.start_altitude * (self.end_altitude / self.start_altitude).powf(t)
    }

    pub fn camera(&self, tick: u32) -> Camera {
        let eye = self.target + DVec3::Y * self.altitude(tick);
        // North (-Z) is up on screen.
        Camera::looking_at(eye, self.target, DVec3::NEG_Z)
    }
}
