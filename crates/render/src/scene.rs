//! What a frame draws. Loaders fill a [`Scene`]; stages only read it.

use glam::Mat4;
use wonderlands_common::{
    Light, LightKind, MaterialHandle, MeshHandle, ObjectId, Renderable, TimeOfDay, Transform,
    Weather,
};

use crate::camera::FlyCamera;

/// One terrain chunk at a fixed level of detail.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainPatch {
    pub renderable: Renderable,
    pub transform: Transform,
    pub lod: u8,
}

/// A placed model such as a cottage, ruin or bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub renderable: Renderable,
    pub transform: Transform,
    pub casts_shadows: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, renderable: Renderable, transform: Transform) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            renderable,
            transform,
            casts_shadows: true,
        }
    }
}

/// Many copies of one mesh, drawn with a single instanced call.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceBatch {
    pub name: String,
    pub renderable: Renderable,
    instances: Vec<Mat4>,
}

impl InstanceBatch {
    pub fn new(
        name: impl Into<String>,
        renderable: Renderable,
        transforms: impl IntoIterator<Item = Transform>,
    ) -> Self {
        Self {
            name: name.into(),
            renderable,
            instances: transforms.into_iter().map(|t| t.model_matrix()).collect(),
        }
    }

    pub fn instances(&self) -> &[Mat4] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Water surface mesh. Wave and flow parameters come from the pipeline's water flow.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterSurface {
    pub mesh: MeshHandle,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleField {
    pub renderable: Renderable,
    pub particles: Vec<Mat4>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Skybox {
    pub mesh: MeshHandle,
    pub cubemap: MaterialHandle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub terrain: Vec<TerrainPatch>,
    pub objects: Vec<SceneObject>,
    pub batches: Vec<InstanceBatch>,
    pub lights: Vec<Light>,
    pub water: Option<WaterSurface>,
    pub particles: Option<ParticleField>,
    pub skybox: Option<Skybox>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first shadow-casting directional light.
    pub fn sun(&self) -> Option<&Light> {
        self.lights
            .iter()
            .find(|l| l.kind == LightKind::Directional && l.casts_shadows)
    }

    pub fn has_transparent_content(&self) -> bool {
        self.water.is_some() || self.particles.as_ref().is_some_and(|p| !p.particles.is_empty())
    }

    /// Opaque draw calls a full geometry pass issues.
    pub fn opaque_draw_count(&self) -> usize {
        self.terrain.len() + self.objects.len() + self.batches.iter().filter(|b| !b.is_empty()).count()
    }
}

/// Per-frame inputs to [`crate::RenderPipeline::tick`].
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub scene: &'a Scene,
    pub camera: &'a FlyCamera,
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
}

impl<'a> FrameContext<'a> {
    pub fn new(scene: &'a Scene, camera: &'a FlyCamera) -> Self {
        Self {
            scene,
            camera,
            time_of_day: TimeOfDay::NOON,
            weather: Weather::Clear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn renderable(id: u64) -> Renderable {
        Renderable {
            mesh: MeshHandle(id),
            material: MaterialHandle(id),
        }
    }

    #[test]
    fn batch_precomputes_matrices() {
        let b = InstanceBatch::new(
            "trees",
            renderable(1),
            [Transform::from_position(Vec3::X), Transform::default()],
        );
        assert_eq!(b.len(), 2);
        assert_eq!(b.instances()[0], Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn sun_skips_point_lights() {
        let mut scene = Scene::new();
        scene.lights.push(Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 10.0));
        assert!(scene.sun().is_none());
        scene
            .lights
            .push(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
        assert_eq!(scene.sun().map(|l| l.kind), Some(LightKind::Directional));
    }

    #[test]
    fn empty_particles_are_not_transparent_content() {
        let mut scene = Scene::new();
        assert!(!scene.has_transparent_content());
        scene.particles = Some(ParticleField {
            renderable: renderable(2),
            particles: Vec::new(),
        });
        assert!(!scene.has_transparent_content());
        scene.water = Some(WaterSurface {
            mesh: MeshHandle(3),
            transform: Transform::default(),
        });
        assert!(scene.has_transparent_content());
    }
}
