//! Screen-space picking against the ground plane.
//!
//! A pointer position is unprojected through the camera into a world-space
//! ray, which is intersected with the horizontal plane `y = 0`.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Rays whose vertical component is below this are treated as parallel to the ground.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Size of the drawing surface in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width >= 1.0 && self.height >= 1.0)
    }

    /// Convert pixel coordinates (origin top-left, y down) to normalized device coordinates.
    pub fn to_ndc(&self, screen_x: f32, screen_y: f32) -> (f32, f32) {
        let ndc_x = (2.0 * screen_x / self.width) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen_y / self.height);
        (ndc_x, ndc_y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// A world-space half line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Build the world-space ray under a screen point.
pub fn screen_to_world_ray(
    screen_x: f32,
    screen_y: f32,
    viewport: Viewport,
    camera: &Camera,
) -> Option<Ray> {
    if viewport.is_degenerate() {
        return None;
    }

    let (ndc_x, ndc_y) = viewport.to_ndc(screen_x, screen_y);
    let inv_vp = camera.view_projection_matrix(viewport.aspect()).inverse();

    // glam's perspective_rh maps depth to [0, 1]
    let near = inv_vp * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far = inv_vp * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    let near = near.truncate() / near.w;
    let far = far.truncate() / far.w;

    let direction = (far - near).try_normalize()?;
    Some(Ray {
        origin: camera.position,
        direction,
    })
}

/// Intersect a ray with the ground plane `y = 0`.
///
/// Returns `None` if the ray runs parallel to the plane or points away from it.
pub fn intersect_ground(ray: &Ray) -> Option<Vec3> {
    if ray.direction.y.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = -ray.origin.y / ray.direction.y;
    if t <= 0.0 {
        return None;
    }

    let mut hit = ray.at(t);
    hit.y = 0.0;
    Some(hit)
}

/// Find the ground point under a screen position.
pub fn pick(screen_x: f32, screen_y: f32, viewport: Viewport, camera: &Camera) -> Option<Vec3> {
    let ray = screen_to_world_ray(screen_x, screen_y, viewport, camera)?;
    let hit = intersect_ground(&ray);
    log::debug!(
        "Pick at ({}, {}) -> {:?} (ray dir {:?})",
        screen_x,
        screen_y,
        hit,
        ray.direction
    );
    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_down() -> Camera {
        Camera::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO)
    }

    #[test]
    fn test_ndc_corners() {
        let viewport = Viewport::new(200.0, 100.0);
        assert_eq!(viewport.to_ndc(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(viewport.to_ndc(200.0, 100.0), (1.0, -1.0));
        assert_eq!(viewport.to_ndc(100.0, 50.0), (0.0, 0.0));
    }

    #[test]
    fn test_straight_down_hits_origin() {
        let viewport = Viewport::new(800.0, 600.0);
        let hit = pick(400.0, 300.0, viewport, &top_down()).unwrap();
        assert_eq!(hit.y, 0.0);
        assert!(hit.x.abs() < 1e-4 && hit.z.abs() < 1e-4, "{:?}", hit);
    }

    #[test]
    fn test_off_center_pick_stays_on_plane() {
        let viewport = Viewport::new(800.0, 600.0);
        let hit = pick(600.0, 150.0, viewport, &top_down()).unwrap();
        assert_eq!(hit.y, 0.0);
        // Right of center maps to +x; the up hint is -Z so screen top is -z
        assert!(hit.x > 0.0);
        assert!(hit.z < 0.0);
    }

    #[test]
    fn test_parallel_ray_misses() {
        let ray = Ray {
            origin: Vec3::new(0.0, 1.0, 5.0),
            direction: Vec3::NEG_Z,
        };
        assert_eq!(intersect_ground(&ray), None);
    }

    #[test]
    fn test_horizontal_camera_center_misses() {
        let camera = Camera::look_at(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 1.0, 0.0));
        let viewport = Viewport::new(640.0, 480.0);
        assert_eq!(pick(320.0, 240.0, viewport, &camera), None);
    }

    #[test]
    fn test_ray_pointing_away_misses() {
        let camera = Camera::look_at(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 10.0, 0.0));
        let viewport = Viewport::new(640.0, 480.0);
        assert_eq!(pick(320.0, 240.0, viewport, &camera), None);
    }

    #[test]
    fn test_degenerate_viewport() {
        assert_eq!(pick(0.0, 0.0, Viewport::new(0.0, 0.0), &top_down()), None);
    }
}
