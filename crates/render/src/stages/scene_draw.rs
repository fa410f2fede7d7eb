use glam::Mat4;
use wonderlands_common::{ObjectId, Renderable, Transform};

use crate::backend::DrawCall;
use crate::stage::StageContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SceneSubset {
    /// Shadow casters only.
    DepthOnly,
    /// Everything opaque.
    Opaque,
}

/// Terrain, then placed objects, then one instanced call per batch.
pub(crate) fn draw_scene(ctx: &mut StageContext<'_>, subset: SceneSubset) {
    let scene = ctx.frame.scene;
    for patch in &scene.terrain {
        draw_single(ctx, None, patch.renderable, &patch.transform);
    }
    for object in &scene.objects {
        if subset == SceneSubset::DepthOnly && !object.casts_shadows {
            continue;
        }
        draw_single(ctx, Some(object.id), object.renderable, &object.transform);
    }
    for batch in &scene.batches {
        ctx.draw(&DrawCall {
            mesh: batch.renderable.mesh,
            material: batch.renderable.material,
            instances: batch.instances(),
        });
    }
}

pub(crate) fn draw_single(
    ctx: &mut StageContext<'_>,
    object: Option<ObjectId>,
    renderable: Renderable,
    transform: &Transform,
) {
    let model: [Mat4; 1] = [transform.model_matrix()];
    let call = DrawCall {
        mesh: renderable.mesh,
        material: renderable.material,
        instances: &model,
    };
    match object {
        Some(id) => ctx.draw_object(id, &call),
        None => ctx.draw(&call),
    }
}
