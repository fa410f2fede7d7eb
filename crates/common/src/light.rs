use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// A scene light as read by the shadow and lighting passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    /// Unit direction the light travels. Ignored for point lights.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Attenuation radius for point and spot lights.
    pub range: f32,
    /// Spot cone cosines.
    pub inner_cutoff: f32,
    pub outer_cutoff: f32,
    pub casts_shadows: bool,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            range: f32::INFINITY,
            inner_cutoff: 1.0,
            outer_cutoff: 1.0,
            casts_shadows: true,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Y,
            color,
            intensity,
            range,
            inner_cutoff: 1.0,
            outer_cutoff: 1.0,
            casts_shadows: false,
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        inner_degrees: f32,
        outer_degrees: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            range: 50.0,
            inner_cutoff: inner_degrees.to_radians().cos(),
            outer_cutoff: outer_degrees.to_radians().cos(),
            casts_shadows: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_light_normalizes_direction() {
        let l = Light::directional(Vec3::new(0.0, -4.0, 0.0), Vec3::ONE, 1.0);
        assert!((l.direction.length() - 1.0).abs() < 1e-6);
        assert!(l.casts_shadows);
    }

    #[test]
    fn zero_direction_falls_back_downward() {
        let l = Light::directional(Vec3::ZERO, Vec3::ONE, 1.0);
        assert_eq!(l.direction, Vec3::NEG_Y);
    }

    #[test]
    fn spot_cutoffs_are_ordered() {
        let l = Light::spot(Vec3::Y, Vec3::NEG_Y, Vec3::ONE, 2.0, 12.5, 17.5);
        assert!(l.inner_cutoff > l.outer_cutoff);
    }
}
