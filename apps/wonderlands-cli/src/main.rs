use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::{Quat, Vec2, Vec3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wonderlands_common::{Light, MaterialHandle, Renderable, TimeOfDay, Transform, Weather};
use wonderlands_fluid::{FluidConfig, FluidSolver};
use wonderlands_render::{
    EngineConfig, FlyCamera, FrameContext, HeadlessBackend, InstanceBatch, ParticleField,
    RenderPipeline, SampleKernel, Scene, SceneObject, Skybox, StageKind, TerrainPatch,
    WaterSurface,
};

#[derive(Parser)]
#[command(name = "wonderlands-cli", about = "CLI tool for the wonderlands renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Push a force into the middle of a fluid grid and report the result
    Fluid {
        /// Cells per side
        #[arg(short, long, default_value = "64")]
        grid: usize,
        /// World units per cell
        #[arg(long, default_value = "1.0")]
        cell_size: f32,
        /// Steps to simulate
        #[arg(short, long, default_value = "1")]
        steps: u32,
        /// Seconds per step
        #[arg(long, default_value = "0.016")]
        dt: f32,
        /// Force magnitude applied at the centre before the first step
        #[arg(short, long, default_value = "50.0")]
        force: f32,
        /// Wrap at the domain edges
        #[arg(long)]
        periodic: bool,
        /// Disable vorticity confinement
        #[arg(long)]
        no_vorticity: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate an SSAO sample kernel and summarize it
    Kernel {
        /// Number of samples
        #[arg(short, long, default_value = "64")]
        size: usize,
        /// Seed for a reproducible kernel
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run frames of a demo scene on the headless backend
    Frame {
        /// Engine config file (.yaml, .yml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames
        #[arg(short, long, default_value = "3")]
        frames: u32,
        /// Disable shadows, SSAO and bloom
        #[arg(long)]
        minimal: bool,
    },
    /// Print the default engine config
    Config {
        /// Emit JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct FluidReport {
    grid: usize,
    steps: u64,
    centre_speed: f32,
    speed_10_cells_away: f32,
    max_speed: f32,
    mean_abs_divergence: f32,
    total_density: f32,
}

fn run_fluid(config: FluidConfig, steps: u32, dt: f32, force: f32) -> anyhow::Result<FluidReport> {
    let grid = config.grid_size;
    let h = config.cell_size;
    let mut solver = FluidSolver::new(config).context("invalid fluid config")?;
    let centre = Vec2::splat(grid as f32 * 0.5 * h);
    solver.add_force(centre, Vec2::X, force);
    solver.add_density(centre, 1.0);
    for _ in 0..steps {
        solver.step(dt);
    }

    let (vx, vy) = solver.grid().velocity_field();
    let max_speed = vx
        .iter()
        .zip(vy)
        .map(|(x, y)| Vec2::new(*x, *y).length())
        .fold(0.0, f32::max);
    Ok(FluidReport {
        grid,
        steps: solver.steps(),
        centre_speed: solver.sample_velocity(centre.x, centre.y).length(),
        speed_10_cells_away: solver
            .sample_velocity(centre.x + 10.0 * h, centre.y)
            .length(),
        max_speed,
        mean_abs_divergence: solver.mean_abs_divergence(),
        total_density: solver.grid().total_density(),
    })
}

fn demo_scene(backend: &mut HeadlessBackend) -> Scene {
    let cube = backend.register_mesh();
    let plane = backend.register_mesh();
    let material = MaterialHandle(1);
    let solid = |mesh| Renderable { mesh, material };

    let trees = (0..25).map(|i| {
        let (x, z) = ((i % 5) as f32 * 6.0 - 12.0, (i / 5) as f32 * 6.0 - 30.0);
        Transform {
            position: Vec3::new(x, 2.0, z),
            scale: Vec3::new(1.0, 4.0, 1.0),
            ..Transform::default()
        }
    });

    Scene {
        terrain: vec![TerrainPatch {
            renderable: solid(plane),
            transform: Transform::default(),
            lod: 0,
        }],
        objects: vec![SceneObject::new(
            "cottage",
            solid(cube),
            Transform {
                position: Vec3::new(8.0, 1.5, -4.0),
                rotation: Quat::from_rotation_y(0.4),
                scale: Vec3::splat(3.0),
            },
        )],
        batches: vec![InstanceBatch::new("trees", solid(cube), trees)],
        lights: vec![
            Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::ONE, 1.0),
            Light::point(Vec3::new(8.0, 4.0, -4.0), Vec3::new(1.0, 0.7, 0.4), 2.0, 15.0),
        ],
        water: Some(WaterSurface {
            mesh: plane,
            transform: Transform::from_position(Vec3::new(0.0, 5.0, 0.0)),
        }),
        particles: Some(ParticleField {
            renderable: solid(cube),
            particles: (0..16)
                .map(|i| glam::Mat4::from_translation(Vec3::new(i as f32, 10.0, 0.0)))
                .collect(),
        }),
        skybox: Some(Skybox {
            mesh: cube,
            cubemap: MaterialHandle(2),
        }),
    }
}

fn run_frames(config: &EngineConfig, frames: u32) -> anyhow::Result<()> {
    let mut backend = HeadlessBackend::new();
    let scene = demo_scene(&mut backend);
    let mut pipeline = RenderPipeline::new(backend, config).context("pipeline construction")?;
    let camera = FlyCamera::default();
    let mut time_of_day = TimeOfDay::new(0.35);

    for _ in 0..frames {
        time_of_day.advance(1.0 / 60.0, 60.0);
        let frame = FrameContext {
            time_of_day,
            weather: Weather::Clear,
            ..FrameContext::new(&scene, &camera)
        };
        let report = pipeline.tick(&frame, 1.0 / 60.0);
        let ran: Vec<&str> = report.ran.iter().map(|k| k.name()).collect();
        println!(
            "frame {}: stages=[{}] draws={} failures={}",
            report.frame,
            ran.join(", "),
            report.draw_calls,
            report.failures.len()
        );
        for failure in &report.failures {
            match failure.object {
                Some(id) => println!("  {} (object {}): {}", failure.stage, id.0, failure.error),
                None => println!("  {}: {}", failure.stage, failure.error),
            }
        }
        if let Some(e) = &report.frame_error {
            println!("  frame error: {e}");
        }
    }

    let counters = pipeline.counters();
    println!("stage runs:");
    for kind in StageKind::ALL {
        println!("  {:<18} {}", kind.name(), counters.runs(kind));
    }
    pipeline.shutdown();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("wonderlands-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", wonderlands_common::crate_info());
            println!("fluid: {}", wonderlands_fluid::crate_info());
            println!("render: {}", wonderlands_render::crate_info());
        }
        Commands::Fluid {
            grid,
            cell_size,
            steps,
            dt,
            force,
            periodic,
            no_vorticity,
            json,
        } => {
            let config = FluidConfig {
                periodic_boundary: periodic,
                use_vorticity: !no_vorticity,
                ..FluidConfig::with_grid(grid, cell_size)
            };
            let report = run_fluid(config, steps, dt, force)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Fluid: {0}x{0} grid, {1} steps", report.grid, report.steps);
                println!("  centre speed:        {:.5}", report.centre_speed);
                println!("  speed 10 cells away: {:.5}", report.speed_10_cells_away);
                println!("  max speed:           {:.5}", report.max_speed);
                println!("  mean |div u|:        {:.6}", report.mean_abs_divergence);
                println!("  total density:       {:.5}", report.total_density);
            }
        }
        Commands::Kernel { size, seed } => {
            let kernel = match seed {
                Some(seed) => SampleKernel::generate_with(size, &mut StdRng::seed_from_u64(seed)),
                None => SampleKernel::generate(size),
            }
            .context("invalid kernel size")?;
            let lengths: Vec<f32> = kernel.samples().iter().map(|s| s.length()).collect();
            let half = lengths.len() / 2;
            let mean = |xs: &[f32]| xs.iter().sum::<f32>() / xs.len().max(1) as f32;
            println!("SSAO kernel: {} samples", kernel.len());
            println!("  mean length, first half:  {:.4}", mean(&lengths[..half]));
            println!("  mean length, second half: {:.4}", mean(&lengths[half..]));
            println!(
                "  max length: {:.4}",
                lengths.iter().cloned().fold(0.0, f32::max)
            );
            println!("  noise texels: {}", kernel.noise().len());
        }
        Commands::Frame {
            config,
            frames,
            minimal,
        } => {
            let mut engine = match config {
                Some(path) => EngineConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EngineConfig::default(),
            };
            if minimal {
                engine.renderer.shadows = false;
                engine.renderer.ssao = false;
                engine.renderer.bloom = false;
            }
            if let Err(e) = run_frames(&engine, frames) {
                tracing::error!("{e:#}");
                return Err(e);
            }
        }
        Commands::Config { json } => {
            let engine = EngineConfig::default();
            if json {
                println!("{}", serde_json::to_string_pretty(&engine)?);
            } else {
                print!("{}", engine.to_yaml()?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centred_force_moves_the_centre_most() {
        let config = FluidConfig {
            diffusion: 0.0,
            viscosity: 0.0,
            ..FluidConfig::with_grid(64, 1.0)
        };
        let report = run_fluid(config, 1, 0.1, 50.0).unwrap();
        assert_eq!(report.steps, 1);
        assert!(report.centre_speed > 0.0);
        assert!(report.speed_10_cells_away < report.centre_speed);
    }

    #[test]
    fn bad_grid_is_an_error() {
        assert!(run_fluid(FluidConfig::with_grid(1, 1.0), 1, 0.1, 1.0).is_err());
    }

    #[test]
    fn demo_frames_run_on_headless() {
        assert!(run_frames(&EngineConfig::default(), 2).is_ok());
    }
}
