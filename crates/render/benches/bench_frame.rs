use std::hint::black_box;
use std::time::Instant;

use glam::Vec3;
use wonderlands_common::{Light, MaterialHandle, Renderable, Transform};
use wonderlands_render::{
    EngineConfig, FlyCamera, FrameContext, HeadlessBackend, InstanceBatch, RenderPipeline,
    SampleKernel, Scene, TerrainPatch,
};

fn bench_kernel(count: usize, rounds: usize) {
    let start = Instant::now();
    for _ in 0..rounds {
        let _ = black_box(SampleKernel::generate(black_box(count)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / rounds as u32;
    println!("  kernel ({count} samples, {rounds} rounds): {per_iter:?}/kernel");
}

fn bench_headless_frames(batch_size: usize, frames: usize) {
    let mut config = EngineConfig::default();
    config.water.flow.grid_size = 64;
    let mut pipeline = match RenderPipeline::new(HeadlessBackend::new(), &config) {
        Ok(p) => p,
        Err(e) => {
            println!("  pipeline construction failed: {e}");
            return;
        }
    };

    let mut scene = Scene::new();
    let backend = pipeline.backend_mut();
    let terrain = Renderable {
        mesh: backend.register_mesh(),
        material: MaterialHandle(1),
    };
    let tree = Renderable {
        mesh: backend.register_mesh(),
        material: MaterialHandle(2),
    };
    for i in 0..16 {
        scene.terrain.push(TerrainPatch {
            renderable: terrain,
            transform: Transform::from_position(Vec3::new(i as f32 * 64.0, 0.0, 0.0)),
            lod: (i % 4) as u8,
        });
    }
    scene.batches.push(InstanceBatch::new(
        "trees",
        tree,
        (0..batch_size).map(|i| Transform::from_position(Vec3::new(i as f32, 0.0, 0.0))),
    ));
    scene
        .lights
        .push(Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::ONE, 1.0));
    let camera = FlyCamera::default();

    let start = Instant::now();
    let mut draws = 0;
    for _ in 0..frames {
        let report = pipeline.tick(&FrameContext::new(&scene, &camera), black_box(1.0 / 60.0));
        draws += report.draw_calls;
        pipeline.backend_mut().clear_commands();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / frames as u32;
    println!(
        "  headless frame ({batch_size} instances, {frames} frames): {per_iter:?}/frame, {} draws/frame",
        draws / frames as u32
    );
}

fn main() {
    println!("=== Render Benchmarks ===\n");

    println!("SSAO kernel:");
    bench_kernel(16, 10_000);
    bench_kernel(64, 10_000);

    println!("\nHeadless pipeline:");
    bench_headless_frames(1_000, 200);
    bench_headless_frames(100_000, 50);

    println!("\n=== Done ===");
}
