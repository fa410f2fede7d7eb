use glam::Vec2;
use std::ops::Range;

/// Obstacle weight at or above which a cell counts as solid.
pub const SOLID_THRESHOLD: f32 = 0.5;

/// Snapshot of every field at one grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluidCell {
    pub density: f32,
    pub velocity: Vec2,
    /// Velocity at the start of the most recent step.
    pub velocity_prev: Vec2,
    pub pressure: f32,
    pub divergence: f32,
    /// Obstacle weight in `[0, 1]`.
    pub obstacle: f32,
}

impl FluidCell {
    pub fn is_solid(&self) -> bool {
        self.obstacle >= SOLID_THRESHOLD
    }
}

/// Index arithmetic shared by every sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lattice {
    pub n: usize,
    pub periodic: bool,
}

impl Lattice {
    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.n + x
    }

    /// Index of `(x + dx, y + dy)`: wrapped on periodic grids, clamped otherwise.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, dx: isize, dy: isize) -> usize {
        let n = self.n as isize;
        let (nx, ny) = (x as isize + dx, y as isize + dy);
        let (nx, ny) = if self.periodic {
            (nx.rem_euclid(n), ny.rem_euclid(n))
        } else {
            (nx.clamp(0, n - 1), ny.clamp(0, n - 1))
        };
        self.idx(nx as usize, ny as usize)
    }

    /// Cells the solver writes. Non-periodic grids keep the outer ring for boundary values.
    pub fn interior(&self) -> Range<usize> {
        if self.periodic { 0..self.n } else { 1..self.n - 1 }
    }

    /// Bilinear sample in grid coordinates, wrapping on periodic grids.
    pub fn sample(&self, field: &[f32], p: Vec2) -> f32 {
        if self.periodic {
            let x0 = p.x.floor();
            let y0 = p.y.floor();
            let (sx, sy) = (p.x - x0, p.y - y0);
            let n = self.n as isize;
            let wrap = |v: f32| (v as isize).rem_euclid(n) as usize;
            let (x0, y0) = (wrap(x0), wrap(y0));
            let (x1, y1) = ((x0 + 1) % self.n, (y0 + 1) % self.n);
            blend(field, self, x0, x1, y0, y1, sx, sy)
        } else {
            self.sample_clamped(field, p)
        }
    }

    /// Bilinear sample with the position clamped to the grid.
    pub fn sample_clamped(&self, field: &[f32], p: Vec2) -> f32 {
        let max = (self.n - 1) as f32;
        let x = if p.x.is_nan() { 0.0 } else { p.x.clamp(0.0, max) };
        let y = if p.y.is_nan() { 0.0 } else { p.y.clamp(0.0, max) };
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.n - 1);
        let y1 = (y0 + 1).min(self.n - 1);
        blend(field, self, x0, x1, y0, y1, x - x0 as f32, y - y0 as f32)
    }

    /// Distribute `amount` over the four cells around `p` with bilinear weights.
    pub fn splat(&self, field: &mut [f32], p: Vec2, amount: f32) {
        let (p, n) = if self.periodic {
            (p, self.n as isize)
        } else {
            let max = (self.n - 1) as f32;
            (Vec2::new(p.x.clamp(0.0, max), p.y.clamp(0.0, max)), self.n as isize)
        };
        let x0 = p.x.floor();
        let y0 = p.y.floor();
        let (sx, sy) = (p.x - x0, p.y - y0);
        let (x0, y0) = (x0 as isize, y0 as isize);
        let corners = [
            (0, 0, (1.0 - sx) * (1.0 - sy)),
            (1, 0, sx * (1.0 - sy)),
            (0, 1, (1.0 - sx) * sy),
            (1, 1, sx * sy),
        ];
        for (dx, dy, w) in corners {
            if w == 0.0 {
                continue;
            }
            let (cx, cy) = if self.periodic {
                ((x0 + dx).rem_euclid(n), (y0 + dy).rem_euclid(n))
            } else {
                ((x0 + dx).min(n - 1), (y0 + dy).min(n - 1))
            };
            field[self.idx(cx as usize, cy as usize)] += amount * w;
        }
    }
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn blend(
    field: &[f32],
    lattice: &Lattice,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
    sx: f32,
    sy: f32,
) -> f32 {
    let v00 = field[lattice.idx(x0, y0)];
    let v10 = field[lattice.idx(x1, y0)];
    let v01 = field[lattice.idx(x0, y1)];
    let v11 = field[lattice.idx(x1, y1)];
    let v0 = v00 * (1.0 - sx) + v10 * sx;
    let v1 = v01 * (1.0 - sx) + v11 * sx;
    v0 * (1.0 - sy) + v1 * sy
}

/// Which boundary rule a field obeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bound {
    Scalar,
    VelocityX,
    VelocityY,
}

/// Apply domain-edge and obstacle rules to one field.
///
/// Non-periodic edges mirror the first interior cell, negating the normal
/// velocity component. Solid cells carry no velocity.
pub(crate) fn enforce(lattice: Lattice, bound: Bound, field: &mut [f32], obstacle: &[f32]) {
    let n = lattice.n;
    if !lattice.periodic {
        for i in 1..n - 1 {
            let flip_y = if bound == Bound::VelocityY { -1.0 } else { 1.0 };
            field[lattice.idx(i, 0)] = flip_y * field[lattice.idx(i, 1)];
            field[lattice.idx(i, n - 1)] = flip_y * field[lattice.idx(i, n - 2)];

            let flip_x = if bound == Bound::VelocityX { -1.0 } else { 1.0 };
            field[lattice.idx(0, i)] = flip_x * field[lattice.idx(1, i)];
            field[lattice.idx(n - 1, i)] = flip_x * field[lattice.idx(n - 2, i)];
        }
        let corner = |f: &[f32], ax: usize, ay: usize, bx: usize, by: usize| {
            0.5 * (f[lattice.idx(ax, ay)] + f[lattice.idx(bx, by)])
        };
        field[lattice.idx(0, 0)] = corner(field, 1, 0, 0, 1);
        field[lattice.idx(0, n - 1)] = corner(field, 1, n - 1, 0, n - 2);
        field[lattice.idx(n - 1, 0)] = corner(field, n - 2, 0, n - 1, 1);
        field[lattice.idx(n - 1, n - 1)] = corner(field, n - 2, n - 1, n - 1, n - 2);
    }

    if bound != Bound::Scalar {
        for (v, &w) in field.iter_mut().zip(obstacle) {
            if w >= SOLID_THRESHOLD {
                *v = 0.0;
            }
        }
    }
}

/// Sum of the four face neighbours of `(x, y)`.
///
/// A solid neighbour contributes the centre value for scalars (no flux across
/// the wall) and zero for velocity (no slip).
#[inline]
pub(crate) fn neighbor_sum(
    lattice: Lattice,
    field: &[f32],
    obstacle: &[f32],
    x: usize,
    y: usize,
    bound: Bound,
) -> f32 {
    let centre = field[lattice.idx(x, y)];
    [(1, 0), (-1, 0), (0, 1), (0, -1)]
        .into_iter()
        .map(|(dx, dy)| {
            let j = lattice.offset(x, y, dx, dy);
            if obstacle[j] >= SOLID_THRESHOLD {
                if bound == Bound::Scalar { centre } else { 0.0 }
            } else {
                field[j]
            }
        })
        .sum()
}

/// Field storage for one square grid, one `Vec` per quantity.
#[derive(Debug, Clone)]
pub struct FluidGrid {
    pub(crate) lattice: Lattice,
    pub(crate) density: Vec<f32>,
    pub(crate) vx: Vec<f32>,
    pub(crate) vy: Vec<f32>,
    pub(crate) prev_vx: Vec<f32>,
    pub(crate) prev_vy: Vec<f32>,
    pub(crate) pressure: Vec<f32>,
    pub(crate) divergence: Vec<f32>,
    pub(crate) obstacle: Vec<f32>,
}

impl FluidGrid {
    pub(crate) fn new(n: usize, periodic: bool) -> Self {
        let len = n * n;
        Self {
            lattice: Lattice { n, periodic },
            density: vec![0.0; len],
            vx: vec![0.0; len],
            vy: vec![0.0; len],
            prev_vx: vec![0.0; len],
            prev_vy: vec![0.0; len],
            pressure: vec![0.0; len],
            divergence: vec![0.0; len],
            obstacle: vec![0.0; len],
        }
    }

    /// Cells per side.
    pub fn size(&self) -> usize {
        self.lattice.n
    }

    pub fn is_periodic(&self) -> bool {
        self.lattice.periodic
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<FluidCell> {
        if x >= self.lattice.n || y >= self.lattice.n {
            return None;
        }
        let i = self.lattice.idx(x, y);
        Some(FluidCell {
            density: self.density[i],
            velocity: Vec2::new(self.vx[i], self.vy[i]),
            velocity_prev: Vec2::new(self.prev_vx[i], self.prev_vy[i]),
            pressure: self.pressure[i],
            divergence: self.divergence[i],
            obstacle: self.obstacle[i],
        })
    }

    pub fn is_solid(&self, x: usize, y: usize) -> bool {
        self.cell(x, y).is_some_and(|c| c.is_solid())
    }

    pub fn density_field(&self) -> &[f32] {
        &self.density
    }

    pub fn velocity_field(&self) -> (&[f32], &[f32]) {
        (&self.vx, &self.vy)
    }

    pub fn previous_velocity_field(&self) -> (&[f32], &[f32]) {
        (&self.prev_vx, &self.prev_vy)
    }

    pub fn pressure_field(&self) -> &[f32] {
        &self.pressure
    }

    /// Divergence measured before the last pressure projection.
    pub fn divergence_field(&self) -> &[f32] {
        &self.divergence
    }

    pub fn obstacle_field(&self) -> &[f32] {
        &self.obstacle
    }

    /// Density summed over open cells the solver updates.
    pub fn total_density(&self) -> f32 {
        let l = self.lattice;
        let mut total = 0.0;
        for y in l.interior() {
            for x in l.interior() {
                let i = l.idx(x, y);
                if self.obstacle[i] < SOLID_THRESHOLD {
                    total += self.density[i];
                }
            }
        }
        total
    }

    /// Zero every dynamic field. Obstacles are kept.
    pub(crate) fn clear(&mut self) {
        for f in [
            &mut self.density,
            &mut self.vx,
            &mut self.vy,
            &mut self.prev_vx,
            &mut self.prev_vy,
            &mut self.pressure,
            &mut self.divergence,
        ] {
            f.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(n: usize, periodic: bool) -> Lattice {
        Lattice { n, periodic }
    }

    #[test]
    fn offset_clamps_or_wraps() {
        let open = lattice(4, false);
        assert_eq!(open.offset(0, 0, -1, 0), open.idx(0, 0));
        let wrap = lattice(4, true);
        assert_eq!(wrap.offset(0, 0, -1, 0), wrap.idx(3, 0));
        assert_eq!(wrap.offset(3, 3, 1, 1), wrap.idx(0, 0));
    }

    #[test]
    fn interior_reserves_ring_only_when_open() {
        assert_eq!(lattice(8, false).interior(), 1..7);
        assert_eq!(lattice(8, true).interior(), 0..8);
    }

    #[test]
    fn bilinear_sample_midpoint() {
        let l = lattice(2, false);
        let field = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(l.sample(&field, Vec2::new(0.5, 0.5)), 1.5);
        // outside clamps to the edge
        assert_eq!(l.sample(&field, Vec2::new(-5.0, 0.0)), 0.0);
        assert_eq!(l.sample(&field, Vec2::new(9.0, 9.0)), 3.0);
    }

    #[test]
    fn periodic_sample_wraps() {
        let l = lattice(4, true);
        let mut field = [0.0; 16];
        field[l.idx(3, 0)] = 4.0;
        assert_eq!(l.sample(&field, Vec2::new(-1.0, 0.0)), 4.0);
        assert_eq!(l.sample(&field, Vec2::new(-0.5, 0.0)), 2.0);
    }

    #[test]
    fn splat_conserves_amount() {
        let l = lattice(8, false);
        let mut field = vec![0.0; 64];
        l.splat(&mut field, Vec2::new(3.25, 4.75), 2.0);
        let total: f32 = field.iter().sum();
        assert!((total - 2.0).abs() < 1e-6);
        assert_eq!(field.iter().filter(|v| **v != 0.0).count(), 4);
    }

    #[test]
    fn splat_on_cell_centre_hits_one_cell() {
        let l = lattice(8, true);
        let mut field = vec![0.0; 64];
        l.splat(&mut field, Vec2::new(7.0, 0.0), 1.0);
        assert_eq!(field[l.idx(7, 0)], 1.0);
        assert_eq!(field.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn enforce_reflects_normal_velocity() {
        let l = lattice(4, false);
        let mut vx = vec![0.0; 16];
        vx[l.idx(1, 1)] = 2.0;
        let obstacle = vec![0.0; 16];
        enforce(l, Bound::VelocityX, &mut vx, &obstacle);
        assert_eq!(vx[l.idx(0, 1)], -2.0);

        let mut s = vec![0.0; 16];
        s[l.idx(1, 1)] = 2.0;
        enforce(l, Bound::Scalar, &mut s, &obstacle);
        assert_eq!(s[l.idx(0, 1)], 2.0);
    }

    #[test]
    fn enforce_zeroes_solid_velocity() {
        let l = lattice(4, true);
        let mut vy = vec![1.0; 16];
        let mut obstacle = vec![0.0; 16];
        obstacle[5] = 1.0;
        enforce(l, Bound::VelocityY, &mut vy, &obstacle);
        assert_eq!(vy[5], 0.0);
        assert_eq!(vy[6], 1.0);
    }

    #[test]
    fn neighbor_sum_treats_walls() {
        let l = lattice(3, true);
        let field = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let mut obstacle = vec![0.0; 9];
        assert_eq!(neighbor_sum(l, &field, &obstacle, 1, 1, Bound::Scalar), 20.0);
        obstacle[l.idx(2, 1)] = 1.0;
        // wall replaced by centre value
        assert_eq!(neighbor_sum(l, &field, &obstacle, 1, 1, Bound::Scalar), 19.0);
        // wall contributes nothing to velocity
        assert_eq!(neighbor_sum(l, &field, &obstacle, 1, 1, Bound::VelocityX), 14.0);
    }

    #[test]
    fn cell_view_out_of_range() {
        let g = FluidGrid::new(4, false);
        assert!(g.cell(4, 0).is_none());
        assert_eq!(g.cell(1, 1), Some(FluidCell::default()));
    }
}
