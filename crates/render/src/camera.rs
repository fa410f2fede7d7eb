use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// First-person camera. Angles are radians; pitch stays inside +/-89 degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Vertical field of view.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second.
    pub speed: f32,
    /// Radians per pixel of mouse motion.
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 20.0, 40.0),
            yaw: -90.0_f32.to_radians(),
            pitch: -20.0_f32.to_radians(),
            fov: 60.0_f32.to_radians(),
            aspect: 1280.0 / 720.0,
            near: 0.1,
            far: 2000.0,
            speed: 10.0,
            sensitivity: 0.003,
        }
    }
}

const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

impl FlyCamera {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn translate(&mut self, movement: Movement, dt: f32) {
        let step = self.speed * dt;
        let delta = match movement {
            Movement::Forward => self.forward() * step,
            Movement::Backward => -self.forward() * step,
            Movement::Left => -self.right() * step,
            Movement::Right => self.right() * step,
            Movement::Up => Vec3::Y * step,
            Movement::Down => Vec3::NEG_Y * step,
        };
        self.position += delta;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// The same camera reflected through the horizontal plane `y = height`.
    pub fn mirrored(&self, height: f32) -> FlyCamera {
        FlyCamera {
            position: Vec3::new(self.position.x, 2.0 * height - self.position.y, self.position.z),
            pitch: -self.pitch,
            ..self.clone()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = FlyCamera::default();
        assert!(cam.position.y > 0.0);
        assert!(cam.view_projection().is_finite());
    }

    #[test]
    fn movement_follows_view() {
        let mut cam = FlyCamera {
            pitch: 0.0,
            ..FlyCamera::default()
        };
        let start = cam.position;
        cam.translate(Movement::Forward, 1.0);
        let moved = cam.position - start;
        assert!((moved - cam.forward() * cam.speed).length() < 1e-4);
        cam.translate(Movement::Up, 0.5);
        assert!((cam.position.y - start.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.rotate(0.0, -1.0e6);
        assert!(cam.pitch <= PITCH_LIMIT);
        cam.rotate(0.0, 1.0e6);
        assert!(cam.pitch >= -PITCH_LIMIT);
    }

    #[test]
    fn zero_viewport_keeps_aspect_finite() {
        let mut cam = FlyCamera::default();
        cam.set_viewport(800, 0);
        assert_eq!(cam.aspect, 800.0);
    }

    #[test]
    fn mirror_flips_height_and_pitch() {
        let cam = FlyCamera::default();
        let m = cam.mirrored(5.0);
        assert_eq!(m.position.y, 10.0 - cam.position.y);
        assert_eq!(m.pitch, -cam.pitch);
        assert!((m.forward().y + cam.forward().y).abs() < 1e-6);
    }
}
