//! Perspective look-at camera.
//!
//! The camera is plain state owned by the session. The render consumer reads
//! [`CameraUniforms`] each frame; picking uses the same matrices so a pointer
//! lands where the consumer draws.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Camera Configuration
// ============================================================================

/// Camera parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Up vector hint. Must not be parallel to the view direction.
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Camera looking at `target` from `position`.
    ///
    /// If the view direction is (nearly) vertical the up hint is switched to
    /// -Z so the basis stays well defined.
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        let forward = (target - position).normalize_or_zero();
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };

        Self {
            position,
            target,
            up,
            ..Self::default()
        }
    }

    /// Compute the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Compute the projection matrix for a viewport aspect ratio.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect, self.near, self.far)
    }

    /// Compute the combined view-projection matrix.
    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Normalized direction from position to target. Zero when they coincide.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Compute the right direction vector. Zero for a degenerate camera.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }

    /// Whether the camera has no usable view basis: position equals target,
    /// the up hint is parallel to the view, or a parameter is not finite.
    pub fn is_degenerate(&self) -> bool {
        let finite = self.position.is_finite()
            && self.target.is_finite()
            && self.up.is_finite()
            && self.fov.is_finite()
            && self.near.is_finite()
            && self.far.is_finite();
        !finite || self.right() == Vec3::ZERO || self.near <= 0.0 || self.far <= self.near
    }

    /// GPU-ready uniforms for a viewport aspect ratio.
    pub fn to_uniforms(&self, aspect: f32) -> CameraUniforms {
        CameraUniforms {
            view_proj: self.view_projection_matrix(aspect).to_cols_array_2d(),
            position: [self.position.x, self.position.y, self.position.z, 1.0],
        }
    }
}

// ============================================================================
// Camera Uniforms (GPU-ready evaluated values)
// ============================================================================

/// Evaluated camera block for the render consumer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct CameraUniforms {
    /// Column-major view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Camera position in world space (vec4, w = 1).
    pub position: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = Camera::default();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.fov, 75.0);
        assert_eq!(camera.forward(), Vec3::NEG_Z);
    }

    #[test]
    fn test_uniform_size() {
        // Ensure proper alignment for GPU
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 80);
    }

    #[test]
    fn test_view_matrix_lookat() {
        let camera = Camera::look_at(Vec3::splat(5.0), Vec3::ZERO);
        let view = camera.view_matrix();
        // The view matrix should transform the origin to be in front of the camera
        let origin_in_view = view.transform_point3(Vec3::ZERO);
        assert!(origin_in_view.z < 0.0);
    }

    #[test]
    fn test_top_down_camera_has_valid_basis() {
        let camera = Camera::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO);
        assert_eq!(camera.up, Vec3::NEG_Z);
        assert!(camera.view_matrix().is_finite());
        assert!(camera.right().is_finite());
    }

    #[test]
    fn test_coincident_position_and_target() {
        let camera = Camera {
            target: Vec3::new(0.0, 0.0, 5.0),
            ..Camera::default()
        };
        assert_eq!(camera.forward(), Vec3::ZERO);
        assert_eq!(camera.right(), Vec3::ZERO);
        assert!(camera.is_degenerate());
        assert!(!Camera::default().is_degenerate());
    }

    #[test]
    fn test_camera_from_partial_json() {
        let camera: Camera = serde_json::from_str(r#"{"fov": 60.0}"#).unwrap();
        assert_eq!(camera.fov, 60.0);
        assert_eq!(camera.far, 1000.0);
    }
}
