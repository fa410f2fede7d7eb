//! Fluid core: a 2D stable-fluids grid and the water surface flow built on it.
//!
//! # Invariants
//! - Pure numerical state. Nothing here touches a graphics context.
//! - Configuration is validated at construction; stepping never fails.
//! - Forces are transient: queued, applied in the next step, then dropped.
//! - Obstacle cells carry zero velocity after every step.

mod config;
mod error;
mod grid;
mod solver;
mod water;

pub use config::{FluidConfig, MAX_GRID_SIZE, MIN_GRID_SIZE};
pub use error::ConfigError;
pub use grid::{FluidCell, FluidGrid, SOLID_THRESHOLD};
pub use solver::{FluidSolver, Force};
pub use water::{Ripple, WaterConfig, WaterFlow};

pub fn crate_info() -> &'static str {
    "wonderlands-fluid v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("fluid"));
    }
}
