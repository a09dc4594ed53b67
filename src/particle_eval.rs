//! Steam motion law and GPU vertex generation.
//!
//! Each tick advances the field clock and every particle's age, then places the
//! particle at
//!
//! ```text
//! drift = velocity * age * speed
//! base + drift + swirl(t, base.y, base.y + drift.y)
//! ```
//!
//! where the swirl sways the particle horizontally. The x phase follows the
//! base height and the z phase the drifted height, so a rising particle
//! traces an ellipse that slowly skews rather than a fixed circle. A particle
//! that rises above [`STEAM_CEILING`] or strays more than [`MAX_DISPLACEMENT`]
//! from its base is recycled: its age restarts and it is drawn at its base.
//! Until its first recycle a particle's age equals the field clock, so its
//! position is a closed-form function of `t`.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Serialize;

use crate::particle::{Particle, ParticleField};

/// Angular frequency of the swirl, in radians per second.
pub const SWIRL_FREQUENCY: f32 = 2.0;
/// Radius of the swirl.
pub const SWIRL_AMPLITUDE: f32 = 0.1;
/// Particles rendered above this height are recycled.
pub const STEAM_CEILING: f32 = 3.0;
/// Particles rendered further than this from their base are recycled.
pub const MAX_DISPLACEMENT: f32 = 2.0;

/// Base sprite size in pixels.
pub const SPRITE_SIZE: f32 = 2.0;
/// Relative size pulse amplitude.
pub const SPRITE_SIZE_VARIATION: f32 = 0.3;

/// GPU vertex for one steam sprite.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize)]
pub struct SteamVertex {
    pub position: [f32; 3],
    /// Point sprite size in pixels.
    pub size: f32,
}

/// Lateral swirl offset at time `t`.
///
/// `base_y` drives the x phase and `drifted_y` the z phase.
pub fn swirl(t: f32, base_y: f32, drifted_y: f32) -> Vec3 {
    let omega = t * SWIRL_FREQUENCY;
    Vec3::new(
        (omega + base_y).sin() * SWIRL_AMPLITUDE,
        0.0,
        (omega + drifted_y).cos() * SWIRL_AMPLITUDE,
    )
}

/// Rendered position of a particle, or `None` if it must be recycled.
pub fn displaced_position(particle: &Particle, t: f32, speed: f32) -> Option<Vec3> {
    let base = particle.position;
    let drifted = base + particle.velocity * particle.age * speed;
    let pos = drifted + swirl(t, base.y, drifted.y);

    if pos.y > STEAM_CEILING || pos.distance(base) > MAX_DISPLACEMENT {
        None
    } else {
        Some(pos)
    }
}

/// Sprite size pulse for a rendered height.
pub fn sprite_size(t: f32, rendered_y: f32) -> f32 {
    SPRITE_SIZE * (1.0 + (t * 3.0 + rendered_y * 2.0).sin() * SPRITE_SIZE_VARIATION)
}

/// Advance a field by one tick.
pub fn advance_field(field: &mut ParticleField, dt: f32, speed: f32) {
    field.time += dt;
    let t = field.time;

    for (particle, slot) in field
        .particles
        .iter_mut()
        .zip(field.rendered.chunks_exact_mut(3))
    {
        particle.age += dt;
        let pos = match displaced_position(particle, t, speed) {
            Some(pos) => pos,
            None => {
                particle.age = 0.0;
                particle.position
            }
        };
        slot.copy_from_slice(&pos.to_array());
    }
}

/// Build sprite vertices from the field's current rendered positions.
pub fn steam_vertices(field: &ParticleField) -> Vec<SteamVertex> {
    let t = field.time;
    field
        .rendered
        .chunks_exact(3)
        .map(|c| SteamVertex {
            position: [c[0], c[1], c[2]],
            size: sprite_size(t, c[1]),
        })
        .collect()
}
