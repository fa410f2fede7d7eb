//! Hemisphere sample kernel and rotation noise for screen-space occlusion.

use glam::{Vec2, Vec3};
use rand::Rng;
use wonderlands_fluid::ConfigError;

/// Largest kernel the occlusion shader's uniform array can hold.
pub const MAX_KERNEL_SIZE: usize = 64;
/// The rotation noise tiles as a `NOISE_DIM` x `NOISE_DIM` texture.
pub const NOISE_DIM: usize = 4;

/// Tangent-space sample offsets plus the tiled rotation noise.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleKernel {
    samples: Vec<Vec3>,
    noise: [Vec2; NOISE_DIM * NOISE_DIM],
}

impl SampleKernel {
    pub fn generate(count: usize) -> Result<Self, ConfigError> {
        Self::generate_with(count, &mut rand::rng())
    }

    /// Samples lie in the unit hemisphere around +Z. Sample `i` is scaled by
    /// `lerp(0.1, 1.0, (i / count)^2)` so samples crowd toward the origin.
    pub fn generate_with<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Result<Self, ConfigError> {
        if count == 0 {
            return Err(ConfigError::Zero {
                field: "ao_kernel_size",
            });
        }
        if count > MAX_KERNEL_SIZE {
            return Err(ConfigError::TooLarge {
                field: "ao_kernel_size",
                value: count,
                max: MAX_KERNEL_SIZE,
            });
        }

        let samples = (0..count)
            .map(|i| {
                let t = i as f32 / count as f32;
                unit_half_ball(rng) * lerp(0.1, 1.0, t * t)
            })
            .collect();

        let noise = std::array::from_fn(|_| {
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            Vec2::from_angle(angle)
        });

        Ok(Self { samples, noise })
    }

    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn noise(&self) -> &[Vec2] {
        &self.noise
    }

    /// Samples padded to the shader's fixed-size array.
    pub fn uniform_samples(&self) -> [[f32; 4]; MAX_KERNEL_SIZE] {
        let mut out = [[0.0; 4]; MAX_KERNEL_SIZE];
        for (slot, s) in out.iter_mut().zip(&self.samples) {
            *slot = [s.x, s.y, s.z, 0.0];
        }
        out
    }

    /// Noise as RGBA32F texels, row-major.
    pub fn noise_texels(&self) -> Vec<u8> {
        let texels: Vec<[f32; 4]> = self.noise.iter().map(|n| [n.x, n.y, 0.0, 0.0]).collect();
        bytemuck::cast_slice(&texels).to_vec()
    }
}

/// Uniform point in `{|p| <= 1, z >= 0}`, drawn from the enclosing half-cube by rejection.
fn unit_half_ball<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let p = Vec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(0.0..=1.0),
        );
        let len2 = p.length_squared();
        if len2 <= 1.0 && len2 > 1e-8 {
            return p;
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn samples_stay_in_hemisphere() {
        let mut rng = StdRng::seed_from_u64(7);
        let k = SampleKernel::generate_with(64, &mut rng).unwrap();
        assert_eq!(k.len(), 64);
        for s in k.samples() {
            assert!(s.z >= 0.0);
            assert!(s.length() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn samples_grow_toward_the_end() {
        let mut early = 0.0;
        let mut late = 0.0;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let k = SampleKernel::generate_with(64, &mut rng).unwrap();
            early += k.samples()[..16].iter().map(|s| s.length()).sum::<f32>();
            late += k.samples()[48..].iter().map(|s| s.length()).sum::<f32>();
        }
        assert!(late > early * 2.0);
    }

    #[test]
    fn first_sample_is_heavily_scaled() {
        let mut rng = StdRng::seed_from_u64(1);
        let k = SampleKernel::generate_with(8, &mut rng).unwrap();
        assert!(k.samples()[0].length() <= 0.1 + 1e-6);
    }

    #[test]
    fn noise_is_unit_and_flat() {
        let k = SampleKernel::generate(16).unwrap();
        assert_eq!(k.noise().len(), 16);
        for n in k.noise() {
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
        assert_eq!(k.noise_texels().len(), 16 * 16);
    }

    #[test]
    fn bad_counts_rejected() {
        assert_eq!(
            SampleKernel::generate(0),
            Err(ConfigError::Zero {
                field: "ao_kernel_size"
            })
        );
        assert!(matches!(
            SampleKernel::generate(65),
            Err(ConfigError::TooLarge { value: 65, .. })
        ));
    }

    #[test]
    fn uniform_samples_pad_with_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        let k = SampleKernel::generate_with(4, &mut rng).unwrap();
        let u = k.uniform_samples();
        assert_eq!(u[3][..3], k.samples()[3].to_array());
        assert_eq!(u[4], [0.0; 4]);
    }
}
