//! Rays and the two intersection tests hit-testing needs.

use glam::DVec3;

/// Half-line `origin + t * direction`, `t >= 0`, with unit `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Build a ray, normalising `direction`. `None` if it has no length.
    #[must_use]
    pub fn new(origin: DVec3, direction: DVec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        origin.is_finite().then_some(Self { origin, direction })
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Slab test against an axis-aligned box. Returns the entry distance, or
    /// `0.0` when the origin is inside.
    #[must_use]
    pub fn intersect_bounds(&self, min: DVec3, max: DVec3) -> Option<f64> {
        let inv = self.direction.recip();
        let t0 = (min - self.origin) * inv;
        let t1 = (max - self.origin) * inv;

        let mut t_near = 0.0_f64;
        let mut t_far = f64::INFINITY;
        for axis in 0..3 {
            if self.direction[axis] == 0.0 {
                // Parallel to this slab: must already be between its planes.
                if self.origin[axis] < min[axis] || self.origin[axis] > max[axis] {
                    return None;
                }
                continue;
            }
            let (lo, hi) = if t0[axis] <= t1[axis] {
                (t0[axis], t1[axis])
            } else {
                (t1[axis], t0[axis])
            };
            t_near = t_near.max(lo);
            t_far = t_far.min(hi);
            if t_near > t_far {
                return None;
            }
        }
        Some(t_near)
    }

    /// Möller–Trumbore intersection with a triangle, either side facing.
    #[must_use]
    pub fn intersect_triangle(&self, [a, b, c]: [DVec3; 3]) -> Option<f64> {
        const EPSILON: f64 = 1e-12;

        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}
