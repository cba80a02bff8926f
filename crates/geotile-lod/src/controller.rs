//! Ray-sampled LOD: a few random screen rays per tick decide whether the
//! tile under them should split or its parent collapse.

use geotile_tree::TileQuadtree;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Camera, LodAction, LodError, LodSettings, LodStrategy, SurfaceHit, raycast_surfaces};

/// Multiplier of the scale-distance metric.
const SCALE_FACTOR: f64 = 1.3;

/// LOD controller driven by random screen-space rays.
#[derive(Debug)]
pub struct LodRaycast {
    settings: LodSettings,
    rng: StdRng,
}

impl LodRaycast {
    /// # Errors
    ///
    /// [`LodError::InvalidSettings`] if `settings` fail validation.
    pub fn new(settings: LodSettings) -> Result<Self, LodError> {
        settings.validate()?;
        Ok(Self {
            settings,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Like [`new`](Self::new) with a deterministic ray sequence.
    ///
    /// # Errors
    ///
    /// [`LodError::InvalidSettings`] if `settings` fail validation.
    pub fn with_seed(settings: LodSettings, seed: u64) -> Result<Self, LodError> {
        settings.validate()?;
        Ok(Self {
            settings,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &LodSettings {
        &self.settings
    }

    /// Closeness score of a hit; larger means the tile needs more detail.
    #[must_use]
    pub fn score(&self, hit: &SurfaceHit) -> f64 {
        let mut d = hit.distance;
        if self.settings.use_power_distance {
            d = (2.0 * d).powi(i32::from(hit.level()));
        }
        if self.settings.use_scale_distance {
            d = SCALE_FACTOR * hit.scale / d;
        }
        d
    }

    /// The single action the hits call for, checked in order.
    #[must_use]
    pub fn decide(&self, hits: &[SurfaceHit]) -> Option<LodAction> {
        hits.iter().find_map(|hit| {
            let score = self.score(hit);
            if score > self.settings.threshold_up {
                Some(LodAction::Subdivide(hit.coordinate))
            } else if score < self.settings.threshold_down {
                hit.parent.map(LodAction::Simplify)
            } else {
                None
            }
        })
    }

    /// Cast this tick's rays, concatenating each ray's sorted hits.
    ///
    /// # Errors
    ///
    /// Propagates ray construction failures.
    pub fn sample(&mut self, tree: &TileQuadtree, camera: &Camera) -> Result<Vec<SurfaceHit>, LodError> {
        let mut hits = Vec::new();
        for _ in 0..self.settings.subdivision_rays {
            let ndc = DVec2::new(
                self.rng.random_range(-1.0..=1.0),
                self.rng.random_range(-1.0..=1.0),
            );
            let ray = camera.ray_from_ndc(ndc)?;
            hits.extend(raycast_surfaces(tree, &ray));
        }
        Ok(hits)
    }
}

impl LodStrategy for LodRaycast {
    fn update(&mut self, tree: &mut TileQuadtree, camera: &Camera) -> Vec<LodAction> {
        let hits = match self.sample(tree, camera) {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("skipping LOD tick: {e}");
                return Vec::new();
            }
        };
        let Some(action) = self.decide(&hits) else {
            return Vec::new();
        };
        if action.apply(tree) {
            log::debug!("{action}");
            vec![action]
        } else {
            Vec::new()
        }
    }
}
