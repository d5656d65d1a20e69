//! Demo application for the camera pipeline
//!
//! Run with:
//!   cargo run --example demo
//!   cargo run --example demo -- --deferred --hdr --blur 3 --skybox
//!   cargo run --example demo -- --headless 2
//!
//! Headless mode renders through the recording backend and prints every pass.

use camera_pipeline::{
    backend::{GraphicsBackend, RecordingBackend},
    camera::{Camera, CameraConfig, ClearMode, RenderPath, ShaderSet},
    init_logging,
    pipeline::postprocess::{GaussianBlur, Tonemapping, Vignette},
    scene::{Mesh, MeshDrawable, MeshPipelines, Scene, Skybox, Transform},
    window, Effect, EffectDomain, Engine, EngineConfig, InstanceRegistry, LoggingConfig,
    OutputSurface, RenderResult,
};
use clap::Parser;
use glam::{Quat, Vec3, Vec4};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug, Clone)]
#[command(about = "Render a small scene through the camera pipeline")]
struct Args {
    /// Use the deferred render path
    #[arg(long)]
    deferred: bool,

    /// Render in HDR and tonemap
    #[arg(long)]
    hdr: bool,

    /// Gaussian blur sub-passes (0 disables the blur)
    #[arg(long, default_value_t = 0)]
    blur: u32,

    /// Clear with a skybox instead of a solid color
    #[arg(long)]
    skybox: bool,

    /// Run the normals prepass
    #[arg(long)]
    normals: bool,

    /// Render this many frames headlessly and print the recorded passes
    #[arg(long)]
    headless: Option<u32>,

    /// Log filter, e.g. "camera_pipeline=trace"
    #[arg(long)]
    log: Option<String>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

impl Args {
    fn camera_config(&self) -> CameraConfig {
        CameraConfig::default()
            .with_label("Main Camera")
            .with_render_path(if self.deferred {
                RenderPath::Deferred
            } else {
                RenderPath::Forward
            })
            .with_hdr(self.hdr)
            .with_clear_mode(if self.skybox {
                ClearMode::Skybox
            } else {
                ClearMode::Color
            })
            .with_clear_color([0.1, 0.1, 0.15, 1.0])
            .with_normals_pass(self.normals)
    }

    fn effects(&self) -> Vec<Box<dyn Effect>> {
        let domain = if self.hdr {
            EffectDomain::Hdr
        } else {
            EffectDomain::Ldr
        };
        let mut effects: Vec<Box<dyn Effect>> = Vec::new();
        if self.blur > 0 {
            effects.push(Box::new(GaussianBlur::new(domain, self.blur)));
        }
        if self.hdr {
            effects.push(Box::new(Tonemapping::default().with_exposure(1.2)));
        }
        effects.push(Box::new(Vignette::default()));
        effects
    }
}

fn camera_transform() -> Transform {
    Transform::looking_at(Vec3::new(3.0, 2.5, 4.0), Vec3::ZERO, Vec3::Y)
}

/// Fill the scene with a floor, a cube and optionally a skybox. Returns the cube so
/// the caller can animate it.
fn build_scene(
    backend: &mut dyn GraphicsBackend,
    scene: &mut Scene,
    pipelines: MeshPipelines,
    args: &Args,
) -> RenderResult<Rc<MeshDrawable>> {
    if args.skybox {
        let skybox = Skybox::solid(backend, [90, 140, 200, 255], [40, 50, 70, 255])?;
        scene.set_skybox(Some(skybox));
    }

    let floor = MeshDrawable::new(
        backend,
        &Mesh::plane(10.0, 10.0, 4),
        pipelines,
        &Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        Vec4::new(0.6, 0.6, 0.6, 1.0),
    )?;
    scene.add_drawable(Rc::new(floor));

    let cube = Rc::new(MeshDrawable::new(
        backend,
        &Mesh::cube(),
        pipelines,
        &Transform::default(),
        Vec4::new(0.9, 0.35, 0.2, 1.0),
    )?);
    scene.add_drawable(cube.clone());
    Ok(cube)
}

fn spin(elapsed: f32) -> Transform {
    Transform {
        rotation: Quat::from_rotation_y(elapsed * 0.8),
        ..Transform::default()
    }
}

fn run_headless(args: &Args, frames: u32) -> RenderResult<()> {
    let mut backend = RecordingBackend::new(args.width, args.height);
    let registry = Arc::new(InstanceRegistry::new());
    let mut scene = Scene::new();

    let mut camera = Camera::new(
        &mut backend,
        Arc::clone(&registry),
        args.camera_config(),
        &ShaderSet::default(),
        (args.width, args.height),
    )?;
    camera.set_transform(&camera_transform());
    for effect in args.effects() {
        camera.add_effect(&mut backend, effect)?;
    }

    let pipelines = MeshPipelines::new(
        &mut backend,
        camera.camera_layout(),
        camera.object_layout(),
        camera.target_formats(),
    )?;
    let cube = build_scene(&mut backend, &mut scene, pipelines, args)?;
    camera.on_scene_graph_update(&scene);

    for index in 0..frames {
        cube.set_transform(&mut backend, &spin(index as f32 / 60.0));
        let frame = backend.begin_frame()?;
        camera.render(&mut backend, &scene, frame.swapchain_view)?;
        backend.end_frame()?;

        println!("Frame {}:", index);
        for pass in backend.passes() {
            println!(
                "  {:<24} {} color / depth {} / {} draws",
                pass.label(),
                pass.color_attachments.len(),
                pass.depth_attachment.is_some(),
                pass.draw_count
            );
        }
        backend.clear_passes();
    }

    camera.release(&mut backend);
    if let Some(skybox) = scene.set_skybox(None) {
        skybox.release(&mut backend);
    }
    Ok(())
}

struct Demo {
    engine: Engine,
    cube: Rc<MeshDrawable>,
    started: Instant,
}

impl Demo {
    fn new(surface: &window::Window, args: &Args) -> RenderResult<Self> {
        let config = EngineConfig {
            title: "Camera Pipeline Demo".to_string(),
            width: args.width,
            height: args.height,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(surface.handle(), config)?;

        let index = engine.add_camera(args.camera_config())?;
        for effect in args.effects() {
            engine.add_effect(index, effect)?;
        }

        let Some(camera) = engine.camera_mut(index) else {
            unreachable!("camera {} was just added", index);
        };
        camera.set_transform(&camera_transform());
        let (camera_layout, object_layout, formats) =
            (camera.camera_layout(), camera.object_layout(), camera.target_formats());

        let (backend, scene) = engine.backend_and_scene();
        let pipelines = MeshPipelines::new(backend, camera_layout, object_layout, formats)?;
        let cube = build_scene(backend, scene, pipelines, args)?;

        Ok(Self {
            engine,
            cube,
            started: Instant::now(),
        })
    }

    fn frame(&mut self, surface: &dyn OutputSurface) {
        let elapsed = self.started.elapsed().as_secs_f32();
        self.cube
            .set_transform(self.engine.backend_mut(), &spin(elapsed));

        if let Err(err) = self.engine.render_frame(surface) {
            log::error!("Frame failed: {}", err);
        }
    }
}

enum DemoState {
    Pending,
    Running(Demo),
    Failed,
}

fn main() {
    let args = Args::parse();
    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..LoggingConfig::default()
    });

    if let Some(frames) = args.headless {
        if let Err(err) = run_headless(&args, frames) {
            eprintln!("Headless run failed: {}", err);
            std::process::exit(1);
        }
        return;
    }

    println!("Starting Camera Pipeline Demo");
    println!(
        "Path: {}, HDR: {}, blur sub-passes: {}",
        if args.deferred { "deferred" } else { "forward" },
        args.hdr,
        args.blur
    );

    let (width, height) = (args.width, args.height);
    let mut state = DemoState::Pending;
    let result = window::run("Camera Pipeline Demo", width, height, move |surface| {
        if let DemoState::Pending = state {
            state = match Demo::new(surface, &args) {
                Ok(demo) => DemoState::Running(demo),
                Err(err) => {
                    eprintln!("Failed to create engine: {}", err);
                    DemoState::Failed
                }
            };
        }
        if let DemoState::Running(demo) = &mut state {
            demo.frame(&*surface);
        }
    });

    if let Err(err) = result {
        eprintln!("Event loop failed: {}", err);
    }
}
