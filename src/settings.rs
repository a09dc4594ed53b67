//! Visual settings snapshots and session configuration.
//!
//! Settings arrive from the host as JSON in camelCase, e.g.
//! `{"intensity": 0.5, "speed": 1.0, "density": 100, "autoRotate": true}`.
//! Missing fields take their defaults and out-of-range values are clamped.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::particle::DEFAULT_SEED;

/// Default steam opacity.
fn default_intensity() -> f32 {
    0.5
}

/// Default steam speed multiplier.
fn default_speed() -> f32 {
    1.0
}

/// Default steam particle count.
fn default_density() -> usize {
    100
}

fn default_auto_rotate() -> bool {
    true
}

/// Default point cloud sprite size.
fn default_point_size() -> f32 {
    0.02
}

pub const INTENSITY_RANGE: (f32, f32) = (0.0, 1.0);
pub const SPEED_RANGE: (f32, f32) = (0.1, 2.0);
/// Upper bound on steam particles per field.
pub const MAX_DENSITY: usize = 1_000_000;

/// One immutable settings snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSettings {
    /// Steam opacity in `[0, 1]`.
    #[serde(default = "default_intensity")]
    pub intensity: f32,

    /// Steam drift multiplier in `[0.1, 2]`.
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// Number of steam particles. Changing it rebuilds the field.
    #[serde(default = "default_density")]
    pub density: usize,

    /// Spin the installed asset about Y each tick.
    #[serde(default = "default_auto_rotate")]
    pub auto_rotate: bool,

    /// Point cloud sprite size uniform.
    #[serde(default = "default_point_size")]
    pub point_size: f32,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            intensity: default_intensity(),
            speed: default_speed(),
            density: default_density(),
            auto_rotate: default_auto_rotate(),
            point_size: default_point_size(),
        }
    }
}

impl VisualSettings {
    /// Parse a snapshot from host JSON and clamp it.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let settings: VisualSettings = serde_json::from_str(json)?;
        Ok(settings.clamped())
    }

    /// Clamp every field into its valid range, logging any adjustment.
    pub fn clamped(self) -> Self {
        let mut out = self;

        out.intensity = clamp_field("intensity", self.intensity, INTENSITY_RANGE, default_intensity());
        out.speed = clamp_field("speed", self.speed, SPEED_RANGE, default_speed());
        if self.density == 0 {
            log::warn!("density must be positive, using 1");
            out.density = 1;
        } else if self.density > MAX_DENSITY {
            log::warn!("density {} clamped to {}", self.density, MAX_DENSITY);
            out.density = MAX_DENSITY;
        }
        if !(self.point_size.is_finite() && self.point_size > 0.0) {
            log::warn!("pointSize {} is invalid, using default", self.point_size);
            out.point_size = default_point_size();
        }

        out
    }
}

fn clamp_field(name: &str, value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if !value.is_finite() {
        log::warn!("{} is not finite, using {}", name, fallback);
        return fallback;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!("{} {} clamped to {}", name, value, clamped);
    }
    clamped
}

/// Default fixed time step (seconds per frame).
fn default_time_step() -> f32 {
    0.01
}

/// Default auto-rotation step (radians per tick).
fn default_rotation_step() -> f32 {
    0.001
}

/// Default emission origin, just above the asset footprint.
fn default_emission_origin() -> Vec3 {
    Vec3::new(0.0, 0.5, 0.0)
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Session-wide configuration that does not change per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Time step used when the host ticks without an explicit delta.
    #[serde(default = "default_time_step")]
    pub time_step: f32,

    /// Auto-rotation applied to the installed asset per tick.
    #[serde(default = "default_rotation_step")]
    pub rotation_step: f32,

    /// Initial steam emission origin.
    #[serde(default = "default_emission_origin")]
    pub emission_origin: Vec3,

    /// Seed for steam particle placement. Each rebuild derives a fresh seed from it.
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub camera: Camera,

    /// Initial settings snapshot.
    #[serde(default)]
    pub settings: VisualSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_step: default_time_step(),
            rotation_step: default_rotation_step(),
            emission_origin: default_emission_origin(),
            seed: default_seed(),
            camera: Camera::default(),
            settings: VisualSettings::default(),
        }
    }
}
