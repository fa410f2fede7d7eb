use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Seconds of real time for one full day at a time factor of 1.
pub const DAY_LENGTH_SECONDS: f32 = 600.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Fog,
}

impl Weather {
    /// Exponential fog density fed to the lighting pass.
    pub fn fog_density(self) -> f32 {
        match self {
            Weather::Clear => 0.002,
            Weather::Rain => 0.01,
            Weather::Fog => 0.04,
        }
    }

    pub fn has_precipitation(self) -> bool {
        matches!(self, Weather::Rain)
    }
}

/// Fraction of the day in `[0, 1)`. Zero is midnight, 0.5 is noon.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TimeOfDay(f32);

impl TimeOfDay {
    pub const NOON: TimeOfDay = TimeOfDay(0.5);

    pub fn new(fraction: f32) -> Self {
        if fraction.is_finite() {
            Self(wrap_unit(fraction))
        } else {
            Self(0.0)
        }
    }

    pub fn fraction(self) -> f32 {
        self.0
    }

    /// Advance by `dt` seconds scaled by `time_factor`, wrapping past midnight.
    pub fn advance(&mut self, dt: f32, time_factor: f32) {
        *self = Self::new(self.0 + dt * time_factor / DAY_LENGTH_SECONDS);
    }

    /// Unit vector pointing from the ground toward the sun.
    pub fn sun_direction(self) -> Vec3 {
        let angle = (self.0 - 0.25) * TAU;
        Vec3::new(angle.cos(), angle.sin(), 0.25).normalize()
    }

    /// Sun contribution in `[0, 1]`, zero while the sun is below the horizon.
    pub fn daylight(self) -> f32 {
        self.sun_direction().y.max(0.0)
    }
}

fn wrap_unit(v: f32) -> f32 {
    let w = v.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if w >= 1.0 { 0.0 } else { w }
}
