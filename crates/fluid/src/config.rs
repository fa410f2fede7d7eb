use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, non_negative, positive};

/// Smallest grid that still has an interior once the boundary ring is reserved.
pub const MIN_GRID_SIZE: usize = 3;

/// Largest grid accepted. The flow map is uploaded as one texture of this size.
pub const MAX_GRID_SIZE: usize = 4096;

/// Solver parameters. Read once at construction; never hot-reloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Cells per side. The grid is always square.
    pub grid_size: usize,
    /// World-space edge length of one cell.
    pub cell_size: f32,
    /// Density diffusion coefficient.
    pub diffusion: f32,
    /// Kinematic viscosity applied to velocity.
    pub viscosity: f32,
    /// Jacobi sweeps for both the diffusion and pressure solves.
    pub iterations: u32,
    pub use_vorticity: bool,
    pub vorticity_strength: f32,
    /// Wrap sampling at the domain edges instead of reflecting.
    pub periodic_boundary: bool,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            grid_size: 256,
            cell_size: 0.5,
            diffusion: 0.0,
            viscosity: 0.0001,
            iterations: 20,
            use_vorticity: true,
            vorticity_strength: 0.25,
            periodic_boundary: false,
        }
    }
}

impl FluidConfig {
    /// Square grid of `grid_size` cells with everything else at defaults.
    pub fn with_grid(grid_size: usize, cell_size: f32) -> Self {
        Self {
            grid_size,
            cell_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::Zero { field: "grid_size" });
        }
        if self.grid_size < MIN_GRID_SIZE {
            return Err(ConfigError::TooSmall {
                field: "grid_size",
                value: self.grid_size,
                min: MIN_GRID_SIZE,
            });
        }
        if self.grid_size > MAX_GRID_SIZE {
            return Err(ConfigError::TooLarge {
                field: "grid_size",
                value: self.grid_size,
                max: MAX_GRID_SIZE,
            });
        }
        positive("cell_size", self.cell_size)?;
        non_negative("diffusion", self.diffusion)?;
        non_negative("viscosity", self.viscosity)?;
        if self.iterations == 0 {
            return Err(ConfigError::Zero {
                field: "iterations",
            });
        }
        non_negative("vorticity_strength", self.vorticity_strength)?;
        Ok(())
    }

    /// World-space extent covered by the grid along one axis.
    pub fn extent(&self) -> f32 {
        self.grid_size as f32 * self.cell_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = FluidConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.grid_size, 256);
        assert_eq!(c.cell_size, 0.5);
        assert_eq!(c.extent(), 128.0);
    }

    #[test]
    fn zero_grid_rejected() {
        let c = FluidConfig::with_grid(0, 1.0);
        assert_eq!(
            c.validate(),
            Err(ConfigError::Zero { field: "grid_size" })
        );
    }

    #[test]
    fn tiny_grid_rejected() {
        let c = FluidConfig::with_grid(2, 1.0);
        assert!(matches!(
            c.validate(),
            Err(ConfigError::TooSmall { value: 2, .. })
        ));
    }

    #[test]
    fn oversized_grid_rejected() {
        assert!(FluidConfig::with_grid(MAX_GRID_SIZE, 1.0).validate().is_ok());
        for size in [MAX_GRID_SIZE + 1, 1 << 33] {
            assert_eq!(
                FluidConfig::with_grid(size, 1.0).validate(),
                Err(ConfigError::TooLarge {
                    field: "grid_size",
                    value: size,
                    max: MAX_GRID_SIZE,
                })
            );
        }
    }

    #[test]
    fn non_positive_cell_size_rejected() {
        for bad in [0.0, -0.5, f32::NAN, f32::INFINITY] {
            let c = FluidConfig::with_grid(16, bad);
            assert_eq!(c.validate().map_err(|e| e.field()), Err("cell_size"));
        }
    }

    #[test]
    fn negative_coefficients_rejected() {
        let c = FluidConfig {
            viscosity: -1.0,
            ..FluidConfig::with_grid(16, 1.0)
        };
        assert_eq!(c.validate().map_err(|e| e.field()), Err("viscosity"));

        let c = FluidConfig {
            iterations: 0,
            ..FluidConfig::with_grid(16, 1.0)
        };
        assert_eq!(c.validate().map_err(|e| e.field()), Err("iterations"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: FluidConfig = serde_json::from_str(r#"{"grid_size": 64}"#).unwrap();
        assert_eq!(c.grid_size, 64);
        assert_eq!(c.iterations, 20);
        assert!(!c.periodic_boundary);
    }
}
