//! The six frame stages and the scene traversal they share.

mod ambient_occlusion;
mod geometry;
mod lighting;
mod post_process;
mod scene_draw;
mod shadow;
mod transparency;

pub use ambient_occlusion::AmbientOcclusionStage;
pub use geometry::GeometryStage;
pub use lighting::LightingStage;
pub use post_process::PostProcessStage;
pub use shadow::ShadowStage;
pub use transparency::TransparencyStage;

use crate::stage::RenderStage;

/// All stages in execution order.
pub fn default_stages() -> Vec<Box<dyn RenderStage>> {
    vec![
        Box::new(ShadowStage),
        Box::new(GeometryStage),
        Box::new(AmbientOcclusionStage),
        Box::new(LightingStage),
        Box::new(TransparencyStage),
        Box::new(PostProcessStage),
    ]
}
