//! Water surface flow: ripples drive a [`FluidSolver`] laid over the water plane.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::FluidConfig;
use crate::error::{ConfigError, non_negative, positive};
use crate::solver::FluidSolver;

/// Water surface parameters, including the flow grid laid over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// World-space Y of the water plane.
    pub height: f32,
    /// World-space XZ of grid cell (0, 0).
    pub origin: Vec2,
    pub wave_height: f32,
    /// Scroll rate of the distortion map, in map widths per second.
    pub wave_speed: f32,
    pub wave_frequency: f32,
    pub ripple_enabled: bool,
    pub max_ripples: usize,
    /// Seconds a ripple lives before it is dropped.
    pub ripple_lifetime: f32,
    /// Distance from the ripple centre at which its radial pushes land.
    pub ripple_radius: f32,
    pub reflection_size: [u32; 2],
    pub refraction_size: [u32; 2],
    pub flow: FluidConfig,
}

impl Default for WaterConfig {
    fn default() -> Self {
        let flow = FluidConfig::default();
        let half = flow.extent() * 0.5;
        Self {
            height: 5.0,
            origin: Vec2::splat(-half),
            wave_height: 0.2,
            wave_speed: 0.05,
            wave_frequency: 1.5,
            ripple_enabled: true,
            max_ripples: 32,
            ripple_lifetime: 2.0,
            ripple_radius: 1.0,
            reflection_size: [320, 180],
            refraction_size: [1280, 720],
            flow,
        }
    }
}

impl WaterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.flow.validate()?;
        non_negative("wave_height", self.wave_height)?;
        non_negative("wave_speed", self.wave_speed)?;
        non_negative("wave_frequency", self.wave_frequency)?;
        if self.max_ripples == 0 {
            return Err(ConfigError::Zero {
                field: "max_ripples",
            });
        }
        positive("ripple_lifetime", self.ripple_lifetime)?;
        non_negative("ripple_radius", self.ripple_radius)?;
        for (field, [w, h]) in [
            ("reflection_size", self.reflection_size),
            ("refraction_size", self.refraction_size),
        ] {
            if w == 0 || h == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}

/// A transient disturbance on the water surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    /// Water-plane XZ in world units.
    pub position: Vec2,
    pub initial_strength: f32,
    /// Seconds since the ripple was added.
    pub age: f32,
    pub lifetime: f32,
}

impl Ripple {
    /// Strength at the current age: linear fade to zero at `lifetime`.
    pub fn strength(&self) -> f32 {
        self.strength_at(self.age)
    }

    pub fn strength_at(&self, age: f32) -> f32 {
        let t = (age / self.lifetime).clamp(0.0, 1.0);
        self.initial_strength * (1.0 - t)
    }

    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }
}

/// Drives the surface flow grid from ripples and exposes the resulting maps.
#[derive(Debug, Clone)]
pub struct WaterFlow {
    config: WaterConfig,
    solver: FluidSolver,
    ripples: VecDeque<Ripple>,
    move_factor: f32,
    elapsed: f32,
}

impl WaterFlow {
    pub fn new(config: WaterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let solver = FluidSolver::new(config.flow.clone())?;
        tracing::debug!(
            max_ripples = config.max_ripples,
            reflection = ?config.reflection_size,
            refraction = ?config.refraction_size,
            "water flow created"
        );
        Ok(Self {
            ripples: VecDeque::with_capacity(config.max_ripples),
            solver,
            config,
            move_factor: 0.0,
            elapsed: 0.0,
        })
    }

    pub fn config(&self) -> &WaterConfig {
        &self.config
    }

    pub fn solver(&self) -> &FluidSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut FluidSolver {
        &mut self.solver
    }

    /// Start a ripple at world XZ `(x, z)`. Evicts the oldest when full.
    pub fn add_ripple(&mut self, x: f32, z: f32, strength: f32) {
        if !self.config.ripple_enabled {
            return;
        }
        if !(x.is_finite() && z.is_finite() && strength.is_finite()) {
            tracing::warn!(x, z, strength, "ignoring non-finite ripple");
            return;
        }
        self.ripples.push_back(Ripple {
            position: Vec2::new(x, z),
            initial_strength: strength,
            age: 0.0,
            lifetime: self.config.ripple_lifetime,
        });
        while self.ripples.len() > self.config.max_ripples {
            if let Some(old) = self.ripples.pop_front() {
                tracing::trace!(position = ?old.position, "evicted oldest ripple");
            }
        }
    }

    /// Live ripples, oldest first.
    pub fn ripples(&self) -> impl Iterator<Item = &Ripple> {
        self.ripples.iter()
    }

    pub fn ripple_count(&self) -> usize {
        self.ripples.len()
    }

    /// Advance waves, ripples and the flow grid by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        self.elapsed += dt;
        self.move_factor = (self.move_factor + self.config.wave_speed * dt).rem_euclid(1.0);
        self.update_ripples(dt);
        self.solver.step(dt);
    }

    fn update_ripples(&mut self, dt: f32) {
        for r in self.ripples.iter_mut() {
            r.age += dt;
        }
        self.ripples.retain(|r| !r.is_expired());

        let radius = self.config.ripple_radius;
        let origin = self.config.origin;
        for r in &self.ripples {
            let centre = r.position - origin;
            let strength = r.strength();
            for dir in [Vec2::X, Vec2::NEG_X, Vec2::Y, Vec2::NEG_Y] {
                self.solver.add_force(centre + dir * radius, dir, strength);
            }
        }
    }

    /// Scroll offset for the distortion map, in `[0, 1)`.
    pub fn move_factor(&self) -> f32 {
        self.move_factor
    }

    /// Analytic wave height at world XZ, added on top of the flow displacement.
    pub fn wave_offset(&self, x: f32, z: f32) -> f32 {
        let c = &self.config;
        let time = self.elapsed * c.wave_speed * std::f32::consts::TAU;
        let phase = (x + z) * c.wave_frequency + time;
        c.wave_height * phase.sin()
    }

    /// Flow velocity at world XZ.
    pub fn velocity_at(&self, x: f32, z: f32) -> Vec2 {
        let local = Vec2::new(x, z) - self.config.origin;
        self.solver.sample_velocity(local.x, local.y)
    }

    /// Per-cell `[vx, vy, density, pressure]`, row-major, for texture upload.
    pub fn flow_map(&self) -> Vec<[f32; 4]> {
        let grid = self.solver.grid();
        let (vx, vy) = grid.velocity_field();
        vx.iter()
            .zip(vy)
            .zip(grid.density_field())
            .zip(grid.pressure_field())
            .map(|(((&x, &y), &d), &p)| [x, y, d, p])
            .collect()
    }

    pub fn velocity_map(&self) -> (&[f32], &[f32]) {
        self.solver.grid().velocity_field()
    }

    pub fn pressure_map(&self) -> &[f32] {
        self.solver.grid().pressure_field()
    }

    pub fn divergence_map(&self) -> &[f32] {
        self.solver.grid().divergence_field()
    }
}
