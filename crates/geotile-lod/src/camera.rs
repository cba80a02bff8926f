//! Camera model used to cast LOD sampling rays.

use glam::{DMat3, DMat4, DQuat, DVec2, DVec3};

use crate::{LodError, Ray};

/// A camera in world space (Y up, map on the XZ plane).
#[derive(Debug, Clone)]
pub struct Camera {
    /// Position in world metres.
    pub position: DVec3,
    /// Rotation as a unit quaternion.
    pub rotation: DQuat,
    /// Projection parameters.
    pub projection: Projection,
    /// Near clip plane distance (always positive).
    pub near: f64,
    /// Far clip plane distance (always positive, > near).
    pub far: f64,
}

/// Projection type for the camera.
#[derive(Debug, Clone)]
pub enum Projection {
    /// Perspective projection.
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f64,
        /// Width / height.
        aspect_ratio: f64,
    },
    /// Orthographic projection for top-down views.
    Orthographic {
        /// Half-width of the view volume in world units.
        half_width: f64,
        /// Half-height of the view volume in world units.
        half_height: f64,
    },
}

impl Camera {
    /// A perspective camera at `position` looking at `target`.
    ///
    /// `up` only needs to be non-parallel to the view direction; when it is
    /// parallel the rotation stays at identity.
    #[must_use]
    pub fn looking_at(position: DVec3, target: DVec3, up: DVec3) -> Self {
        let mut camera = Camera {
            position,
            ..Camera::default()
        };
        camera.look_at(target, up);
        camera
    }

    /// Rotate to face `target`. Returns `false` (leaving the rotation
    /// untouched) if the direction or up vector is degenerate.
    pub fn look_at(&mut self, target: DVec3, up: DVec3) -> bool {
        let Some(forward) = (target - self.position).try_normalize() else {
            return false;
        };
        let Some(right) = forward.cross(up).try_normalize() else {
            return false;
        };
        let true_up = right.cross(forward);
        let basis = DMat3::from_cols(right, true_up, -forward);
        self.rotation = DQuat::from_mat3(&basis).normalize();
        true
    }

    /// Compute the view matrix (inverse of camera transform).
    #[must_use]
    pub fn view_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    /// Compute the projection matrix with reverse-Z: the near plane maps to
    /// depth 1, the far plane to depth 0.
    #[must_use]
    pub fn projection_matrix(&self) -> DMat4 {
        match &self.projection {
            Projection::Perspective {
                fov_y,
                aspect_ratio,
            } => DMat4::perspective_rh(*fov_y, *aspect_ratio, self.far, self.near),
            Projection::Orthographic {
                half_width,
                half_height,
            } => DMat4::orthographic_rh(
                -*half_width,
                *half_width,
                -*half_height,
                *half_height,
                self.far,
                self.near,
            ),
        }
    }

    /// Compute the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> DMat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// The forward direction vector (-Z in camera space).
    #[must_use]
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::NEG_Z
    }

    /// Ray through a point in normalised device coordinates (`[-1, 1]²`,
    /// +Y up). Perspective rays start at the camera position, orthographic
    /// rays on the near plane.
    ///
    /// # Errors
    ///
    /// [`LodError::InvalidNdc`] for non-finite input and
    /// [`LodError::DegenerateCamera`] when the camera cannot be inverted.
    pub fn ray_from_ndc(&self, ndc: DVec2) -> Result<Ray, LodError> {
        if !ndc.is_finite() {
            return Err(LodError::InvalidNdc { x: ndc.x, y: ndc.y });
        }
        self.check()?;

        let inverse = self.view_projection_matrix().inverse();
        if !inverse.is_finite() {
            return Err(LodError::DegenerateCamera("view-projection is not invertible"));
        }
        let near = inverse.project_point3(DVec3::new(ndc.x, ndc.y, 1.0));
        let far = inverse.project_point3(DVec3::new(ndc.x, ndc.y, 0.0));

        let origin = match self.projection {
            Projection::Perspective { .. } => self.position,
            Projection::Orthographic { .. } => near,
        };
        Ray::new(origin, far - near).ok_or(LodError::DegenerateCamera("zero-length ray"))
    }

    fn check(&self) -> Result<(), LodError> {
        if !self.position.is_finite() || !self.rotation.is_finite() {
            return Err(LodError::DegenerateCamera("non-finite transform"));
        }
        if !(self.near > 0.0 && self.far > self.near && self.far.is_finite()) {
            return Err(LodError::DegenerateCamera("clip planes must satisfy 0 < near < far"));
        }
        match self.projection {
            Projection::Perspective {
                fov_y,
                aspect_ratio,
            } => {
                if !(fov_y > 0.0 && fov_y < std::f64::consts::PI) {
                    return Err(LodError::DegenerateCamera("field of view outside (0, pi)"));
                }
                if !(aspect_ratio > 0.0 && aspect_ratio.is_finite()) {
                    return Err(LodError::DegenerateCamera("aspect ratio must be positive"));
                }
            }
            Projection::Orthographic {
                half_width,
                half_height,
            } => {
                if !(half_width > 0.0 && half_height > 0.0) {
                    return Err(LodError::DegenerateCamera("orthographic extent must be positive"));
                }
            }
        }
        Ok(())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: std::f64::consts::FRAC_PI_4,
                aspect_ratio: 16.0 / 9.0,
            },
            near: 0.1,
            far: 1.0e9,
        }
    }
}
