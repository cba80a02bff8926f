//! Distance-to-centre LOD, independent of screen sampling.

use geotile_tree::TileQuadtree;
use glam::DVec3;

use crate::{Camera, LodAction, LodError, LodStrategy, RadialSettings};

/// Subdivides tiles near the camera and collapses parents far from it,
/// measuring distances in multiples of tile width.
#[derive(Clone, Debug)]
pub struct LodRadial {
    settings: RadialSettings,
}

impl LodRadial {
    /// # Errors
    ///
    /// [`LodError::InvalidSettings`] if `settings` fail validation.
    pub fn new(settings: RadialSettings) -> Result<Self, LodError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    #[must_use]
    pub fn settings(&self) -> &RadialSettings {
        &self.settings
    }

    /// Actions for every drawn surface, without touching the tree.
    #[must_use]
    pub fn plan(&self, tree: &TileQuadtree, eye: DVec3) -> Vec<LodAction> {
        let mut actions = Vec::new();
        for node in tree.visible_surfaces() {
            let width = node.world_scale().x;
            if node.world_center().distance(eye) < self.settings.subdivide_factor * width {
                actions.push(LodAction::Subdivide(node.coordinate()));
                continue;
            }

            let Some(parent) = node.parent().and_then(|p| tree.node(&p)) else {
                continue;
            };
            let far = parent.world_center().distance(eye)
                > self.settings.simplify_factor * parent.world_scale().x;
            let action = LodAction::Simplify(parent.coordinate());
            if far && !actions.contains(&action) {
                actions.push(action);
            }
        }
        actions
    }
}

impl LodStrategy for LodRadial {
    fn update(&mut self, tree: &mut TileQuadtree, camera: &Camera) -> Vec<LodAction> {
        let planned = self.plan(tree, camera.position);
        let applied: Vec<LodAction> = planned.into_iter().filter(|a| a.apply(tree)).collect();
        if !applied.is_empty() {
            log::debug!("radial LOD applied {} actions", applied.len());
        }
        applied
    }
}
