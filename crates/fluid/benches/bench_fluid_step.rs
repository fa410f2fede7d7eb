use std::hint::black_box;
use std::time::Instant;

use glam::Vec2;
use wonderlands_fluid::{FluidConfig, FluidSolver, WaterConfig, WaterFlow};

fn bench_step(grid_size: usize, iterations: u32, steps: usize) {
    let config = FluidConfig {
        iterations,
        ..FluidConfig::with_grid(grid_size, 1.0)
    };
    let Ok(mut solver) = FluidSolver::new(config) else {
        println!("  invalid config for grid {grid_size}");
        return;
    };
    let centre = Vec2::splat(grid_size as f32 * 0.5);

    let start = Instant::now();
    for i in 0..steps {
        let angle = i as f32 * 0.1;
        solver.add_force(centre, Vec2::new(angle.cos(), angle.sin()), 10.0);
        solver.step(black_box(1.0 / 60.0));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / steps as u32;
    println!(
        "  step ({grid_size}x{grid_size}, {iterations} sweeps, {steps} steps): {per_iter:?}/step, total {elapsed:?}"
    );
}

fn bench_sample(grid_size: usize, samples: usize) {
    let Ok(solver) = FluidSolver::new(FluidConfig::with_grid(grid_size, 0.5)) else {
        return;
    };
    let extent = solver.config().extent();

    let start = Instant::now();
    for i in 0..samples {
        let t = i as f32 / samples as f32;
        let _ = black_box(solver.sample_velocity(black_box(t * extent), black_box(0.5 * extent)));
    }
    let elapsed = start.elapsed();
    println!("  sample_velocity ({grid_size}x{grid_size}, {samples} samples): total {elapsed:?}");
}

fn bench_water(ripples: usize, frames: usize) {
    let config = WaterConfig {
        max_ripples: ripples,
        flow: FluidConfig::with_grid(128, 0.5),
        ..WaterConfig::default()
    };
    let Ok(mut water) = WaterFlow::new(config) else {
        return;
    };

    let start = Instant::now();
    for i in 0..frames {
        // Simulate rain on the surface
        let x = ((i * 37) % 64) as f32 - 32.0;
        let z = ((i * 53) % 64) as f32 - 32.0;
        water.add_ripple(x, z, 2.0);
        water.update(black_box(1.0 / 60.0));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / frames as u32;
    println!(
        "  water update ({ripples} ripples, {frames} frames): {per_iter:?}/frame, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Fluid Solver Benchmarks ===\n");

    println!("Full step:");
    bench_step(64, 20, 200);
    bench_step(128, 20, 50);
    bench_step(256, 20, 10);

    println!("\nJacobi sweep count:");
    bench_step(128, 10, 50);
    bench_step(128, 40, 50);

    println!("\nVelocity queries:");
    bench_sample(256, 100_000);

    println!("\nWater surface:");
    bench_water(8, 100);
    bench_water(32, 100);

    println!("\n=== Done ===");
}
