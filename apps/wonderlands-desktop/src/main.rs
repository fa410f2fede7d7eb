use anyhow::{Context, Result};
use clap::Parser;
use glam::{Mat4, Quat, Vec3};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};
use wonderlands_common::{Light, Renderable, TimeOfDay, Transform, Weather};
use wonderlands_render::{
    EngineConfig, FlyCamera, FrameContext, InstanceBatch, Movement, ParticleField,
    RenderPipeline, Scene, SceneObject, Skybox, TerrainPatch, WaterSurface,
};
use wonderlands_render_wgpu::{WgpuBackend, cube_mesh, plane_mesh};

#[derive(Parser)]
#[command(name = "wonderlands-desktop", about = "Wonderlands fly-through")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config file (.yaml, .yml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

const GROUND_HEIGHT: f32 = 6.0;
const RIPPLE_STRENGTH: f32 = 20.0;

/// Everything the window needs that does not touch the GPU.
struct AppState {
    camera: FlyCamera,
    time_of_day: TimeOfDay,
    time_factor: f32,
    paused: bool,
    weather: Weather,
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    last_frame: Instant,
}

impl AppState {
    fn new() -> Self {
        Self {
            camera: FlyCamera {
                position: Vec3::new(0.0, 14.0, 40.0),
                pitch: -0.2,
                ..FlyCamera::default()
            },
            time_of_day: TimeOfDay::new(0.35),
            time_factor: 10.0,
            paused: false,
            weather: Weather::Clear,
            keys_held: HashSet::new(),
            mouse_captured: false,
            last_frame: Instant::now(),
        }
    }

    fn update(&mut self, dt: f32) {
        let dt_scaled = if self.keys_held.contains(&KeyCode::ShiftLeft) {
            dt * 3.0
        } else {
            dt
        };
        for (key, movement) in [
            (KeyCode::KeyW, Movement::Forward),
            (KeyCode::KeyS, Movement::Backward),
            (KeyCode::KeyA, Movement::Left),
            (KeyCode::KeyD, Movement::Right),
            (KeyCode::Space, Movement::Up),
            (KeyCode::ControlLeft, Movement::Down),
        ] {
            if self.keys_held.contains(&key) {
                self.camera.translate(movement, dt_scaled);
            }
        }

        if !self.paused {
            self.time_of_day.advance(dt, self.time_factor);
        }
    }

    /// Returns true when the key asks for a wireframe toggle.
    fn handle_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
            return false;
        }

        match key {
            KeyCode::KeyL => return true,
            KeyCode::KeyP => {
                self.paused = !self.paused;
                tracing::info!(paused = self.paused, "time of day");
            }
            KeyCode::BracketLeft => {
                self.time_factor = (self.time_factor * 0.5).max(0.25);
                tracing::info!(factor = self.time_factor, "time factor");
            }
            KeyCode::BracketRight => {
                self.time_factor = (self.time_factor * 2.0).min(1024.0);
                tracing::info!(factor = self.time_factor, "time factor");
            }
            KeyCode::KeyC => self.set_weather(Weather::Clear),
            KeyCode::KeyR => self.set_weather(Weather::Rain),
            KeyCode::KeyF => self.set_weather(Weather::Fog),
            _ => {}
        }
        false
    }

    fn set_weather(&mut self, weather: Weather) {
        self.weather = weather;
        tracing::info!(?weather, "weather changed");
    }

    /// Where the view ray meets the water plane, if it points down at it.
    fn water_hit(&self, height: f32) -> Option<(f32, f32)> {
        let dir = self.camera.forward();
        if dir.y >= -1e-3 {
            return None;
        }
        let t = (height - self.camera.position.y) / dir.y;
        if t <= 0.0 {
            return None;
        }
        let p = self.camera.position + dir * t;
        Some((p.x, p.z))
    }
}

/// Scene geometry registered against the live backend.
fn demo_scene(backend: &mut WgpuBackend, water_height: f32, water_size: f32) -> Scene {
    let cube = backend.register_mesh(&cube_mesh());
    let ground = backend.register_mesh(&plane_mesh(32, 128.0));
    let water = backend.register_mesh(&plane_mesh(128, water_size));

    let grass = backend.register_material([0.32, 0.55, 0.22, 1.0]);
    let mud = backend.register_material([0.35, 0.28, 0.2, 1.0]);
    let wall = backend.register_material([0.85, 0.78, 0.65, 1.0]);
    let leaves = backend.register_material([0.15, 0.4, 0.12, 1.0]);
    let ember = backend.register_material([1.0, 0.6, 0.2, 1.0]);
    let sky = backend.register_material([0.5, 0.7, 1.0, 1.0]);

    // Four banks around the lake, lake bed underneath.
    let banks = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];
    let mut terrain: Vec<TerrainPatch> = banks
        .iter()
        .map(|&(sx, sz)| TerrainPatch {
            renderable: Renderable {
                mesh: ground,
                material: grass,
            },
            transform: Transform::from_position(Vec3::new(
                sx * (water_size * 0.5 + 64.0),
                GROUND_HEIGHT,
                sz * (water_size * 0.5 + 64.0),
            )),
            lod: 0,
        })
        .collect();
    terrain.push(TerrainPatch {
        renderable: Renderable {
            mesh: water,
            material: mud,
        },
        transform: Transform::default(),
        lod: 1,
    });

    let edge = water_size * 0.5 + 10.0;
    let objects = [(-edge, -20.0, 0.3), (-edge - 12.0, 8.0, -0.6), (edge, 15.0, 1.1)]
        .iter()
        .enumerate()
        .map(|(i, &(x, z, yaw))| {
            SceneObject::new(
                format!("cottage_{i}"),
                Renderable {
                    mesh: cube,
                    material: wall,
                },
                Transform {
                    position: Vec3::new(x, GROUND_HEIGHT + 2.0, z),
                    rotation: Quat::from_rotation_y(yaw),
                    scale: Vec3::new(6.0, 4.0, 5.0),
                },
            )
        })
        .collect();

    let trees = (0..64).map(|i| {
        let ring = edge + 20.0 + (i % 4) as f32 * 7.0;
        let angle = i as f32 * 0.39;
        Transform {
            position: Vec3::new(angle.cos() * ring, GROUND_HEIGHT + 3.0, angle.sin() * ring),
            scale: Vec3::new(1.5, 6.0, 1.5),
            ..Transform::default()
        }
    });

    let embers = (0..200)
        .map(|i| {
            let a = i as f32 * 2.399;
            let r = (i as f32).sqrt() * 1.5;
            Mat4::from_scale_rotation_translation(
                Vec3::splat(0.15),
                Quat::IDENTITY,
                Vec3::new(a.cos() * r, water_height + 1.0 + (i % 7) as f32, a.sin() * r),
            )
        })
        .collect();

    Scene {
        terrain,
        objects,
        batches: vec![InstanceBatch::new(
            "trees",
            Renderable {
                mesh: cube,
                material: leaves,
            },
            trees,
        )],
        lights: vec![
            Light::directional(Vec3::new(-0.3, -1.0, -0.2), Vec3::new(1.0, 0.95, 0.85), 1.0),
            Light::point(
                Vec3::new(-edge, GROUND_HEIGHT + 5.0, -14.0),
                Vec3::new(1.0, 0.7, 0.4),
                3.0,
                25.0,
            ),
            Light::spot(
                Vec3::new(edge, GROUND_HEIGHT + 10.0, 15.0),
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::ONE,
                4.0,
                15.0,
                25.0,
            ),
        ],
        water: Some(WaterSurface {
            mesh: water,
            transform: Transform::from_position(Vec3::new(0.0, water_height, 0.0)),
        }),
        particles: Some(ParticleField {
            renderable: Renderable {
                mesh: cube,
                material: ember,
            },
            particles: embers,
        }),
        skybox: Some(Skybox {
            mesh: cube,
            cubemap: sky,
        }),
    }
}

/// Window, surface and the pipeline that draws into it.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    pipeline: RenderPipeline<WgpuBackend>,
    scene: Scene,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, engine: &EngineConfig) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Wonderlands")
            .with_inner_size(PhysicalSize::new(engine.renderer.width, engine.renderer.height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        // Wireframe needs line rasterization; run without it when absent.
        let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("wonderlands_device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            adapter = %adapter.get_info().name,
            "GPU initialized"
        );

        let mut engine = engine.clone();
        engine.renderer.width = config.width;
        engine.renderer.height = config.height;

        let mut backend = WgpuBackend::new(device, queue, format);
        let scene = demo_scene(&mut backend, engine.water.height, engine.water.flow.extent());
        let pipeline = RenderPipeline::new(backend, &engine)?;

        Ok(Self {
            window,
            surface,
            config,
            pipeline,
            scene,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface
            .configure(self.pipeline.backend().device(), &self.config);
        if let Err(e) = self.pipeline.resize(self.config.width, self.config.height) {
            tracing::error!("resize failed: {e}");
        }
    }

    fn render(&mut self, state: &AppState, dt: f32) {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface
                    .configure(self.pipeline.backend().device(), &self.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // The sun follows the clock.
        if let Some(sun) = self.scene.lights.first_mut() {
            sun.direction = -state.time_of_day.sun_direction();
            sun.intensity = state.time_of_day.daylight();
        }

        self.pipeline.backend_mut().set_surface_view(Some(view));
        let frame = FrameContext {
            time_of_day: state.time_of_day,
            weather: state.weather,
            ..FrameContext::new(&self.scene, &state.camera)
        };
        let report = self.pipeline.tick(&frame, dt);
        self.pipeline.backend_mut().set_surface_view(None);
        if !report.is_clean() {
            tracing::debug!(
                frame = report.frame,
                failures = report.failures.len(),
                "frame finished with errors"
            );
        }

        output.present();
    }
}

struct GpuApp {
    state: AppState,
    engine: EngineConfig,
    gpu: Option<Gpu>,
}

impl GpuApp {
    fn new(engine: EngineConfig) -> Self {
        Self {
            state: AppState::new(),
            engine,
            gpu: None,
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &self.engine) {
            Ok(gpu) => {
                let size = gpu.window.inner_size();
                self.state.camera.set_viewport(size.width, size.height);
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to start renderer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                gpu.pipeline.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                gpu.resize(new_size.width, new_size.height);
                self.state
                    .camera
                    .set_viewport(gpu.config.width, gpu.config.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::Escape {
                    gpu.pipeline.shutdown();
                    event_loop.exit();
                    return;
                }
                if self.state.handle_key(key, key_state == ElementState::Pressed) {
                    let on = gpu.pipeline.toggle_wireframe();
                    tracing::info!(wireframe = on, "toggled wireframe");
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                let height = gpu.pipeline.water().config().height;
                if let Some((x, z)) = self.state.water_hit(height) {
                    gpu.pipeline.water_mut().add_ripple(x, z, RIPPLE_STRENGTH);
                    tracing::debug!(x, z, "ripple");
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.mouse_captured = btn_state == ElementState::Pressed;
                gpu.window.set_cursor_visible(!self.state.mouse_captured);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
                self.state.last_frame = now;
                self.state.update(dt);
                gpu.render(&self.state, dt);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let engine = match &cli.config {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    tracing::info!("wonderlands-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(engine);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_and_time_keys() {
        let mut s = AppState::new();
        assert!(!s.handle_key(KeyCode::KeyR, true));
        assert_eq!(s.weather, Weather::Rain);
        s.handle_key(KeyCode::KeyP, true);
        assert!(s.paused);
        let before = s.time_of_day;
        s.update(1.0);
        assert_eq!(s.time_of_day, before);
        s.handle_key(KeyCode::BracketRight, true);
        assert_eq!(s.time_factor, 20.0);
        assert!(s.handle_key(KeyCode::KeyL, true));
        assert!(!s.handle_key(KeyCode::KeyL, false));
    }

    #[test]
    fn held_keys_move_the_camera() {
        let mut s = AppState::new();
        let start = s.camera.position;
        s.handle_key(KeyCode::KeyW, true);
        s.update(0.5);
        assert!(s.camera.position.distance(start) > 0.0);
        s.handle_key(KeyCode::KeyW, false);
        let stopped = s.camera.position;
        s.update(0.5);
        assert_eq!(s.camera.position, stopped);
    }

    #[test]
    fn view_ray_hits_water_below() {
        let mut s = AppState::new();
        s.camera.position = Vec3::new(0.0, 15.0, 0.0);
        s.camera.pitch = -std::f32::consts::FRAC_PI_4;
        let (x, z) = s.water_hit(5.0).unwrap();
        assert!((x * x + z * z).sqrt() > 9.0);
        s.camera.pitch = 0.2;
        assert!(s.water_hit(5.0).is_none());
    }
}
