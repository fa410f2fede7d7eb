use glam::Vec2;

use crate::config::FluidConfig;
use crate::error::ConfigError;
use crate::grid::{Bound, FluidCell, FluidGrid, Lattice, SOLID_THRESHOLD, enforce, neighbor_sum};

/// A transient push queued for the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Force {
    /// World-space position relative to the grid origin.
    pub position: Vec2,
    pub direction: Vec2,
    pub magnitude: f32,
}

/// Stable-fluids solver over one square grid.
///
/// Each [`step`](Self::step) runs, in order: force injection, semi-Lagrangian
/// advection, implicit diffusion, pressure projection, optional vorticity
/// confinement and boundary enforcement. The sub-steps read the fully written
/// output of the previous one and are never reordered.
///
/// Positions are world units measured from the grid origin; one cell spans
/// `cell_size` units. Velocities are world units per second.
#[derive(Debug, Clone)]
pub struct FluidSolver {
    config: FluidConfig,
    grid: FluidGrid,
    forces: Vec<Force>,
    scratch: Scratch,
    steps: u64,
}

#[derive(Debug, Clone)]
struct Scratch {
    a: Vec<f32>,
    b: Vec<f32>,
    c: Vec<f32>,
    curl: Vec<f32>,
}

impl Scratch {
    fn new(len: usize) -> Self {
        Self {
            a: vec![0.0; len],
            b: vec![0.0; len],
            c: vec![0.0; len],
            curl: vec![0.0; len],
        }
    }
}

impl FluidSolver {
    /// Build a solver, rejecting malformed parameters up front.
    pub fn new(config: FluidConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let n = config.grid_size;
        tracing::debug!(
            grid = n,
            cell_size = config.cell_size,
            iterations = config.iterations,
            periodic = config.periodic_boundary,
            "fluid solver created"
        );
        Ok(Self {
            grid: FluidGrid::new(n, config.periodic_boundary),
            scratch: Scratch::new(n * n),
            forces: Vec::new(),
            steps: 0,
            config,
        })
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn grid(&self) -> &FluidGrid {
        &self.grid
    }

    pub fn grid_size(&self) -> usize {
        self.grid.size()
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Queue a force for the next step. Non-finite input is dropped.
    pub fn add_force(&mut self, position: Vec2, direction: Vec2, magnitude: f32) {
        if !(position.is_finite() && direction.is_finite() && magnitude.is_finite()) {
            tracing::warn!(?position, ?direction, magnitude, "ignoring non-finite force");
            return;
        }
        self.forces.push(Force {
            position,
            direction,
            magnitude,
        });
    }

    pub fn pending_forces(&self) -> &[Force] {
        &self.forces
    }

    /// Deposit dye at a world-space position.
    pub fn add_density(&mut self, position: Vec2, amount: f32) {
        if !(position.is_finite() && amount.is_finite()) {
            return;
        }
        let g = position / self.config.cell_size;
        self.grid.lattice.splat(&mut self.grid.density, g, amount);
    }

    /// Replace the obstacle map with `weights`, row-major, one per cell.
    pub fn set_obstacles(&mut self, weights: &[f32]) -> Result<(), ConfigError> {
        let expected = self.grid.obstacle.len();
        if weights.len() != expected {
            return Err(ConfigError::LengthMismatch {
                field: "obstacles",
                expected,
                actual: weights.len(),
            });
        }
        for (dst, &w) in self.grid.obstacle.iter_mut().zip(weights) {
            *dst = if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 };
        }
        self.enforce_boundaries();
        Ok(())
    }

    /// Velocity at a world-space position, bilinearly interpolated.
    ///
    /// Positions outside the grid clamp to the nearest boundary cell.
    pub fn sample_velocity(&self, x: f32, y: f32) -> Vec2 {
        let g = Vec2::new(x, y) / self.config.cell_size;
        let l = self.grid.lattice;
        Vec2::new(
            l.sample_clamped(&self.grid.vx, g),
            l.sample_clamped(&self.grid.vy, g),
        )
    }

    pub fn sample_density(&self, x: f32, y: f32) -> f32 {
        let g = Vec2::new(x, y) / self.config.cell_size;
        self.grid.lattice.sample_clamped(&self.grid.density, g)
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<FluidCell> {
        self.grid.cell(x, y)
    }

    /// Zero every field and drop queued forces. Obstacles are kept.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.forces.clear();
    }

    /// Advance the grid by `dt` seconds.
    ///
    /// A non-positive or non-finite `dt` leaves the grid untouched; queued
    /// forces stay queued.
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            tracing::trace!(dt, "skipping fluid step");
            return;
        }
        let _span = tracing::trace_span!("fluid_step", step = self.steps).entered();

        self.grid.prev_vx.copy_from_slice(&self.grid.vx);
        self.grid.prev_vy.copy_from_slice(&self.grid.vy);

        let injected = self.apply_forces(dt);
        self.advect(dt);
        self.diffuse(dt);
        self.project();
        if self.config.use_vorticity && self.config.vorticity_strength > 0.0 {
            self.confine_vorticity(dt);
        }
        self.enforce_boundaries();

        self.steps += 1;
        tracing::trace!(forces = injected, "fluid step done");
    }

    /// Mean |div u| over open cells the solver updates.
    pub fn mean_abs_divergence(&self) -> f32 {
        let l = self.grid.lattice;
        let h = self.config.cell_size;
        let mut total = 0.0;
        let mut count = 0usize;
        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                if self.grid.obstacle[i] >= SOLID_THRESHOLD {
                    continue;
                }
                total += divergence_at(&self.grid, x, y, h).abs();
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { total / count as f32 }
    }

    // Step 1
    fn apply_forces(&mut self, dt: f32) -> usize {
        let h = self.config.cell_size;
        let l = self.grid.lattice;
        let count = self.forces.len();
        for f in self.forces.drain(..) {
            let g = f.position / h;
            let dv = f.direction * f.magnitude * dt;
            l.splat(&mut self.grid.vx, g, dv.x);
            l.splat(&mut self.grid.vy, g, dv.y);
        }
        count
    }

    // Step 2
    fn advect(&mut self, dt: f32) {
        let l = self.grid.lattice;
        let n = l.n as f32;
        let scale = dt / self.config.cell_size;
        let Scratch { a, b, c, .. } = &mut self.scratch;
        a.copy_from_slice(&self.grid.vx);
        b.copy_from_slice(&self.grid.vy);
        c.copy_from_slice(&self.grid.density);

        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                if self.grid.obstacle[i] >= SOLID_THRESHOLD {
                    continue;
                }
                let mut back = Vec2::new(x as f32 - scale * a[i], y as f32 - scale * b[i]);
                if !l.periodic {
                    back = back.clamp(Vec2::splat(0.5), Vec2::splat(n - 1.5));
                }
                self.grid.vx[i] = l.sample(a, back);
                self.grid.vy[i] = l.sample(b, back);
                self.grid.density[i] = l.sample(c, back);
            }
        }
        let obstacle = &self.grid.obstacle;
        enforce(l, Bound::VelocityX, &mut self.grid.vx, obstacle);
        enforce(l, Bound::VelocityY, &mut self.grid.vy, obstacle);
        enforce(l, Bound::Scalar, &mut self.grid.density, obstacle);
    }

    // Step 3
    fn diffuse(&mut self, dt: f32) {
        let h2 = self.config.cell_size * self.config.cell_size;
        let iterations = self.config.iterations;
        let l = self.grid.lattice;
        let Scratch { a, b, .. } = &mut self.scratch;
        let grid = &mut self.grid;

        let visc = dt * self.config.viscosity / h2;
        if visc > 0.0 {
            let obstacle = &grid.obstacle;
            jacobi_diffuse(l, Bound::VelocityX, &mut grid.vx, obstacle, a, b, visc, iterations);
            jacobi_diffuse(l, Bound::VelocityY, &mut grid.vy, obstacle, a, b, visc, iterations);
        }
        let diff = dt * self.config.diffusion / h2;
        if diff > 0.0 {
            let obstacle = &grid.obstacle;
            jacobi_diffuse(l, Bound::Scalar, &mut grid.density, obstacle, a, b, diff, iterations);
        }
    }

    // Step 4
    fn project(&mut self) {
        let l = self.grid.lattice;
        let h = self.config.cell_size;
        let grid = &mut self.grid;

        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                let d = if grid.obstacle[i] >= SOLID_THRESHOLD {
                    0.0
                } else {
                    divergence_at(grid, x, y, h)
                };
                grid.divergence[i] = d;
            }
        }
        grid.pressure.fill(0.0);
        enforce(l, Bound::Scalar, &mut grid.divergence, &grid.obstacle);

        let next = &mut self.scratch.a;
        for _ in 0..self.config.iterations {
            next.copy_from_slice(&grid.pressure);
            for y in l.interior() {
                for x in l.interior() {
                    let i = l.idx(x, y);
                    if grid.obstacle[i] >= SOLID_THRESHOLD {
                        continue;
                    }
                    let sum = neighbor_sum(l, &grid.pressure, &grid.obstacle, x, y, Bound::Scalar);
                    next[i] = (sum - h * h * grid.divergence[i]) * 0.25;
                }
            }
            std::mem::swap(&mut grid.pressure, next);
            enforce(l, Bound::Scalar, &mut grid.pressure, &grid.obstacle);
        }

        let inv = 0.5 / h;
        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                if grid.obstacle[i] >= SOLID_THRESHOLD {
                    continue;
                }
                let p = |dx: isize, dy: isize| {
                    let j = l.offset(x, y, dx, dy);
                    if grid.obstacle[j] >= SOLID_THRESHOLD {
                        grid.pressure[i]
                    } else {
                        grid.pressure[j]
                    }
                };
                let gx = (p(1, 0) - p(-1, 0)) * inv;
                let gy = (p(0, 1) - p(0, -1)) * inv;
                grid.vx[i] -= gx;
                grid.vy[i] -= gy;
            }
        }
        enforce(l, Bound::VelocityX, &mut grid.vx, &grid.obstacle);
        enforce(l, Bound::VelocityY, &mut grid.vy, &grid.obstacle);
    }

    // Step 5
    fn confine_vorticity(&mut self, dt: f32) {
        let l = self.grid.lattice;
        let h = self.config.cell_size;
        let inv = 0.5 / h;
        let strength = self.config.vorticity_strength;
        let grid = &mut self.grid;
        let curl = &mut self.scratch.curl;

        curl.fill(0.0);
        for y in l.interior() {
            for x in l.interior() {
                let dvy_dx = grid.vy[l.offset(x, y, 1, 0)] - grid.vy[l.offset(x, y, -1, 0)];
                let dvx_dy = grid.vx[l.offset(x, y, 0, 1)] - grid.vx[l.offset(x, y, 0, -1)];
                curl[l.idx(x, y)] = (dvy_dx - dvx_dy) * inv;
            }
        }

        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                if grid.obstacle[i] >= SOLID_THRESHOLD {
                    continue;
                }
                let mag = |dx, dy| curl[l.offset(x, y, dx, dy)].abs();
                let grad = Vec2::new(mag(1, 0) - mag(-1, 0), mag(0, 1) - mag(0, -1)) * inv;
                let len = grad.length();
                if len < 1e-6 {
                    continue;
                }
                let normal = grad / len;
                let w = curl[i];
                let force = Vec2::new(normal.y * w, -normal.x * w) * (strength * h);
                grid.vx[i] += force.x * dt;
                grid.vy[i] += force.y * dt;
            }
        }
    }

    // Step 6
    fn enforce_boundaries(&mut self) {
        let l = self.grid.lattice;
        let grid = &mut self.grid;
        // partial weights damp flow without stopping it
        for ((vx, vy), &w) in grid.vx.iter_mut().zip(grid.vy.iter_mut()).zip(&grid.obstacle) {
            if w > 0.0 && w < SOLID_THRESHOLD {
                *vx *= 1.0 - w;
                *vy *= 1.0 - w;
            }
        }
        enforce(l, Bound::VelocityX, &mut grid.vx, &grid.obstacle);
        enforce(l, Bound::VelocityY, &mut grid.vy, &grid.obstacle);
        enforce(l, Bound::Scalar, &mut grid.density, &grid.obstacle);
    }
}

/// Central-difference divergence at `(x, y)`.
fn divergence_at(grid: &FluidGrid, x: usize, y: usize, h: f32) -> f32 {
    let l = grid.lattice;
    let dvx = grid.vx[l.offset(x, y, 1, 0)] - grid.vx[l.offset(x, y, -1, 0)];
    let dvy = grid.vy[l.offset(x, y, 0, 1)] - grid.vy[l.offset(x, y, 0, -1)];
    (dvx + dvy) * 0.5 / h
}

/// Implicit diffusion by fixed-count Jacobi sweeps.
///
/// Solves `(1 + 4a) x - a * sum(neighbours) = x0` with `x0` the field on entry.
#[allow(clippy::too_many_arguments)]
fn jacobi_diffuse(
    l: Lattice,
    bound: Bound,
    field: &mut Vec<f32>,
    obstacle: &[f32],
    x0: &mut [f32],
    next: &mut Vec<f32>,
    a: f32,
    iterations: u32,
) {
    x0.copy_from_slice(field);
    let denom = 1.0 + 4.0 * a;
    for _ in 0..iterations {
        next.copy_from_slice(field);
        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                if obstacle[i] >= SOLID_THRESHOLD {
                    continue;
                }
                let sum = neighbor_sum(l, field, obstacle, x, y, bound);
                next[i] = (x0[i] + a * sum) / denom;
            }
        }
        std::mem::swap(field, next);
        enforce(l, bound, field, obstacle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config(n: usize) -> FluidConfig {
        FluidConfig {
            grid_size: n,
            cell_size: 1.0,
            diffusion: 0.0,
            viscosity: 0.0,
            iterations: 20,
            use_vorticity: false,
            vorticity_strength: 0.0,
            periodic_boundary: false,
        }
    }

    fn speed(s: &FluidSolver, x: usize, y: usize) -> f32 {
        s.cell(x, y).map(|c| c.velocity.length()).unwrap_or(0.0)
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(FluidSolver::new(FluidConfig::with_grid(0, 1.0)).is_err());
        assert!(FluidSolver::new(FluidConfig::with_grid(16, 0.0)).is_err());
        assert!(matches!(
            FluidSolver::new(FluidConfig::with_grid(1 << 33, 1.0)),
            Err(ConfigError::TooLarge { .. })
        ));
        assert!(FluidSolver::new(FluidConfig::with_grid(16, -2.0)).is_err());
    }

    #[test]
    fn forces_are_consumed_once() {
        let mut s = FluidSolver::new(quiet_config(16)).unwrap();
        s.add_force(Vec2::new(8.0, 8.0), Vec2::X, 1.0);
        assert_eq!(s.pending_forces().len(), 1);
        s.step(0.1);
        assert!(s.pending_forces().is_empty());
        assert_eq!(s.steps(), 1);
    }

    #[test]
    fn non_finite_force_ignored() {
        let mut s = FluidSolver::new(quiet_config(16)).unwrap();
        s.add_force(Vec2::new(f32::NAN, 1.0), Vec2::X, 1.0);
        s.add_force(Vec2::ONE, Vec2::X, f32::INFINITY);
        assert!(s.pending_forces().is_empty());
    }

    #[test]
    fn invalid_dt_is_a_no_op() {
        let mut s = FluidSolver::new(quiet_config(16)).unwrap();
        s.add_force(Vec2::new(8.0, 8.0), Vec2::X, 1.0);
        s.step(0.0);
        s.step(f32::NAN);
        assert_eq!(s.steps(), 0);
        assert_eq!(s.pending_forces().len(), 1);
    }

    #[test]
    fn force_injection_is_local_and_linear() {
        let base = quiet_config(32);
        let a = (Vec2::new(8.0, 8.0), Vec2::new(1.0, 0.5), 2.0);
        let b = (Vec2::new(24.0, 20.0), Vec2::new(-1.0, 1.0), 3.0);

        let run = |forces: &[(Vec2, Vec2, f32)]| {
            let mut s = FluidSolver::new(base.clone()).unwrap();
            for &(p, d, m) in forces {
                s.add_force(p, d, m);
            }
            s.apply_forces(0.1);
            s.grid.vx.iter().zip(&s.grid.vy).map(|(x, y)| Vec2::new(*x, *y)).collect::<Vec<_>>()
        };

        let only_a = run(&[a]);
        let only_b = run(&[b]);
        let both = run(&[a, b]);

        let l = FluidSolver::new(base.clone()).unwrap().grid.lattice;
        for y in 0..32 {
            for x in 0..32 {
                let i = l.idx(x, y);
                assert!((both[i] - (only_a[i] + only_b[i])).length() < 1e-6);
                let near_a = (Vec2::new(x as f32, y as f32) - a.0).length() <= 1.5;
                if !near_a {
                    assert_eq!(only_a[i], Vec2::ZERO, "force leaked to ({x}, {y})");
                }
            }
        }
        // direction * magnitude * dt lands on the target cell
        let centre = only_a[l.idx(8, 8)];
        assert!((centre - Vec2::new(0.2, 0.1)).length() < 1e-6);
    }

    #[test]
    fn centre_force_decays_with_distance() {
        let mut s = FluidSolver::new(quiet_config(64)).unwrap();
        s.add_force(Vec2::new(32.0, 32.0), Vec2::X, 1.0);
        s.step(0.1);
        let centre = speed(&s, 32, 32);
        assert!(centre > 0.0);
        for (x, y) in [(42, 32), (22, 32), (32, 42), (32, 22)] {
            assert!(speed(&s, x, y) < centre, "({x}, {y}) not weaker than centre");
        }
    }

    #[test]
    fn projection_reduces_divergence() {
        let mut s = FluidSolver::new(FluidConfig {
            iterations: 40,
            ..quiet_config(32)
        })
        .unwrap();
        let l = s.grid.lattice;
        // radial outflow blob: strongly divergent
        for y in l.interior() {
            for x in l.interior() {
                let r = Vec2::new(x as f32 - 16.0, y as f32 - 16.0);
                let v = r * (-r.length_squared() / 18.0).exp();
                let i = l.idx(x, y);
                s.grid.vx[i] = v.x;
                s.grid.vy[i] = v.y;
            }
        }
        let before = s.mean_abs_divergence();
        assert!(before > 0.0);
        s.project();
        let after = s.mean_abs_divergence();
        assert!(after < before * 0.5, "before {before}, after {after}");
    }

    #[test]
    fn obstacle_cells_stay_still() {
        let mut s = FluidSolver::new(FluidConfig {
            use_vorticity: true,
            vorticity_strength: 0.5,
            viscosity: 0.001,
            ..quiet_config(32)
        })
        .unwrap();
        let mut walls = vec![0.0; 32 * 32];
        for y in 10..22 {
            walls[y * 32 + 16] = 1.0;
        }
        s.set_obstacles(&walls).unwrap();

        for step in 0..12 {
            s.add_force(Vec2::new(14.0, 16.0), Vec2::X, 20.0);
            s.add_force(Vec2::new(16.0, 15.0), Vec2::Y, 5.0);
            s.step(0.05);
            for y in 10..22 {
                let c = s.cell(16, y).unwrap();
                assert!(c.is_solid());
                assert_eq!(c.velocity, Vec2::ZERO, "wall moved at step {step}");
            }
        }
    }

    #[test]
    fn obstacle_length_checked() {
        let mut s = FluidSolver::new(quiet_config(8)).unwrap();
        assert!(matches!(
            s.set_obstacles(&[0.0; 10]),
            Err(ConfigError::LengthMismatch {
                expected: 64,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn sample_velocity_clamps_outside_grid() {
        let mut s = FluidSolver::new(quiet_config(8)).unwrap();
        let l = s.grid.lattice;
        s.grid.vx[l.idx(7, 3)] = 5.0;
        assert_eq!(s.sample_velocity(100.0, 3.0), Vec2::new(5.0, 0.0));
        assert_eq!(s.sample_velocity(-100.0, -100.0), Vec2::ZERO);
    }

    #[test]
    fn sample_uses_world_units() {
        let mut s = FluidSolver::new(FluidConfig {
            cell_size: 0.5,
            ..quiet_config(8)
        })
        .unwrap();
        let l = s.grid.lattice;
        s.grid.vy[l.idx(4, 2)] = 1.0;
        assert_eq!(s.sample_velocity(2.0, 1.0), Vec2::new(0.0, 1.0));
        assert_eq!(s.sample_velocity(2.25, 1.0), Vec2::new(0.0, 0.5));
    }

    #[test]
    fn diffusion_spreads_without_creating_mass() {
        let mut s = FluidSolver::new(FluidConfig {
            diffusion: 0.5,
            ..quiet_config(32)
        })
        .unwrap();
        s.add_density(Vec2::new(16.0, 16.0), 10.0);
        let before = s.grid().total_density();
        for _ in 0..5 {
            s.step(0.1);
        }
        let after = s.grid().total_density();
        assert!(after <= before * 1.001, "density grew: {before} -> {after}");
        assert!(s.cell(16, 16).unwrap().density < 10.0);
        assert!(s.cell(17, 16).unwrap().density > 0.0);
    }

    #[test]
    fn periodic_grid_wraps_advection() {
        let mut s = FluidSolver::new(FluidConfig {
            periodic_boundary: true,
            ..quiet_config(16)
        })
        .unwrap();
        let l = s.grid.lattice;
        s.grid.density[l.idx(0, 8)] = 1.0;
        // uniform leftward flow of one cell per step
        s.grid.vx.fill(-1.0);
        s.step(1.0);
        assert!(s.cell(15, 8).unwrap().density > 0.9);
    }

    #[test]
    fn vorticity_keeps_swirl_alive() {
        let swirl = |s: &mut FluidSolver| {
            let l = s.grid.lattice;
            for y in l.interior() {
                for x in l.interior() {
                    let r = Vec2::new(x as f32 - 16.0, y as f32 - 16.0);
                    let v = r.perp() * (-r.length_squared() / 8.0).exp();
                    let i = l.idx(x, y);
                    s.grid.vx[i] = v.x;
                    s.grid.vy[i] = v.y;
                }
            }
        };
        // kinetic energy inside the vortex core
        let energy = |s: &FluidSolver| -> f32 {
            let mut e = 0.0;
            for y in 12..=20 {
                for x in 12..=20 {
                    let r = Vec2::new(x as f32 - 16.0, y as f32 - 16.0);
                    if r.length() <= 3.5 {
                        e += speed(s, x, y).powi(2);
                    }
                }
            }
            e
        };

        let mut plain = FluidSolver::new(FluidConfig {
            viscosity: 0.05,
            ..quiet_config(32)
        })
        .unwrap();
        let mut confined = FluidSolver::new(FluidConfig {
            viscosity: 0.05,
            use_vorticity: true,
            vorticity_strength: 2.0,
            ..quiet_config(32)
        })
        .unwrap();
        swirl(&mut plain);
        swirl(&mut confined);
        for _ in 0..5 {
            plain.step(0.1);
            confined.step(0.1);
        }
        assert!(energy(&confined) > energy(&plain));
    }

    #[test]
    fn clear_keeps_obstacles() {
        let mut s = FluidSolver::new(quiet_config(8)).unwrap();
        let mut walls = vec![0.0; 64];
        walls[9] = 1.0;
        s.set_obstacles(&walls).unwrap();
        s.add_density(Vec2::new(4.0, 4.0), 1.0);
        s.add_force(Vec2::new(4.0, 4.0), Vec2::X, 1.0);
        s.clear();
        assert_eq!(s.grid().total_density(), 0.0);
        assert!(s.pending_forces().is_empty());
        assert!(s.grid().is_solid(1, 1));
    }
}
