//! Steam particle field types and core data structures.
//!
//! A [`ParticleField`] is a fixed-size swarm created once per density value.
//! Particles are never spawned or removed individually: a particle that drifts
//! past the plume bounds is recycled back to its base position instead. The
//! per-tick motion law lives in [`crate::particle_eval`].

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::particle_eval::{self, SteamVertex};

/// Default seed used by [`ParticleField::create`].
pub const DEFAULT_SEED: u64 = 0x5DEE_CE66D;

/// A single steam particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// Base position the particle drifts away from and resets to.
    pub position: Vec3,
    /// Drift velocity, scaled by elapsed time and speed.
    pub velocity: Vec3,
    /// Seconds since this particle was last recycled.
    pub age: f32,
}

/// Spawn spread around the emission origin.
#[derive(Clone, Copy, Debug)]
pub struct SpawnVolume {
    /// Horizontal extent (x and z), centered on the origin.
    pub width: f32,
    /// Vertical extent above the origin.
    pub height: f32,
    /// Horizontal velocity extent, centered on zero.
    pub lateral_speed: f32,
    /// Upward velocity extent.
    pub rise_speed: f32,
}

impl Default for SpawnVolume {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 0.5,
            lateral_speed: 0.005,
            rise_speed: 0.01,
        }
    }
}

/// A fixed-capacity swarm of steam particles.
#[derive(Clone, Debug)]
pub struct ParticleField {
    pub(crate) particles: Vec<Particle>,
    /// Flat `x, y, z` rendered positions, updated every tick.
    pub(crate) rendered: Vec<f32>,
    pub(crate) origin: Vec3,
    /// Accumulated simulation time in seconds.
    pub(crate) time: f32,
    volume: SpawnVolume,
    rng: SmallRng,
}

impl ParticleField {
    /// Create a field of `density` particles around `origin` with the default seed.
    pub fn create(density: usize, origin: Vec3) -> Self {
        Self::with_seed(density, origin, DEFAULT_SEED)
    }

    /// Create a field with an explicit RNG seed.
    pub fn with_seed(density: usize, origin: Vec3, seed: u64) -> Self {
        let mut field = Self {
            particles: Vec::with_capacity(density),
            rendered: vec![0.0; density * 3],
            origin,
            time: 0.0,
            volume: SpawnVolume::default(),
            rng: SmallRng::seed_from_u64(seed),
        };

        for _ in 0..density {
            let position = field.sample_position();
            let velocity = field.sample_velocity();
            field.particles.push(Particle {
                position,
                velocity,
                age: 0.0,
            });
        }
        field.sync_rendered();
        field
    }

    /// Number of particles. Always equals the density the field was built with.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Accumulated simulation time.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Rendered positions as a flat `x, y, z` buffer of length `3 * len()`.
    pub fn positions(&self) -> &[f32] {
        &self.rendered
    }

    /// Rendered position of one particle.
    pub fn rendered_position(&self, index: usize) -> Option<Vec3> {
        let start = index.checked_mul(3)?;
        let end = start.checked_add(3)?;
        self.rendered
            .get(start..end)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
    }

    /// Advance the field by `dt` seconds.
    pub fn tick(&mut self, dt: f32, speed: f32) {
        particle_eval::advance_field(self, dt, speed);
    }

    /// Move the emission origin, regenerating every base position around it.
    ///
    /// Velocities are kept; ages restart so each particle begins at its new base.
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
        for i in 0..self.particles.len() {
            let position = self.sample_position();
            let particle = &mut self.particles[i];
            particle.position = position;
            particle.age = 0.0;
        }
        self.sync_rendered();
    }

    /// GPU-ready vertices (rendered position + sprite size) for the current time.
    pub fn vertices(&self) -> Vec<SteamVertex> {
        particle_eval::steam_vertices(self)
    }

    fn sample_position(&mut self) -> Vec3 {
        let v = self.volume;
        self.origin
            + Vec3::new(
                self.rng.gen_range(-0.5..0.5) * v.width,
                self.rng.gen_range(0.0..1.0) * v.height,
                self.rng.gen_range(-0.5..0.5) * v.width,
            )
    }

    fn sample_velocity(&mut self) -> Vec3 {
        let v = self.volume;
        Vec3::new(
            self.rng.gen_range(-0.5..0.5) * v.lateral_speed,
            self.rng.gen_range(0.0..1.0) * v.rise_speed,
            self.rng.gen_range(-0.5..0.5) * v.lateral_speed,
        )
    }

    /// Copy base positions into the rendered buffer.
    fn sync_rendered(&mut self) {
        for (slot, particle) in self.rendered.chunks_exact_mut(3).zip(&self.particles) {
            slot.copy_from_slice(&particle.position.to_array());
        }
    }
}
