//! Shared helpers for camera pipeline integration tests

#![allow(dead_code)]

use camera_pipeline::backend::{
    BackendResult, GraphicsBackend, RecordedPass, RecordingBackend, RenderPipelineHandle,
    TextureViewHandle,
};
use camera_pipeline::camera::{Camera, CameraConfig, CameraTexture, ShaderSet};
use camera_pipeline::pipeline::{shaders, EffectContext, EffectSetup};
use camera_pipeline::scene::DrawContext;
use camera_pipeline::{Drawable, Effect, EffectDomain, InstanceRegistry, SceneQuery};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

pub fn backend() -> RecordingBackend {
    RecordingBackend::new(WIDTH, HEIGHT)
}

pub fn camera(backend: &mut RecordingBackend, config: CameraConfig) -> Camera {
    camera_with_shaders(backend, config, &ShaderSet::default())
}

pub fn camera_with_shaders(
    backend: &mut RecordingBackend,
    config: CameraConfig,
    shaders: &ShaderSet,
) -> Camera {
    Camera::new(
        backend,
        Arc::new(InstanceRegistry::new()),
        config,
        shaders,
        (WIDTH, HEIGHT),
    )
    .expect("camera construction")
}

/// Render one frame into the swapchain and return the passes it recorded.
pub fn render(
    backend: &mut RecordingBackend,
    camera: &mut Camera,
    scene: &dyn SceneQuery,
) -> Vec<RecordedPass> {
    backend.clear_passes();
    let frame = backend.begin_frame().expect("begin frame");
    camera
        .render(backend, scene, frame.swapchain_view)
        .expect("render");
    backend.end_frame().expect("end frame");
    backend.passes().to_vec()
}

pub fn labels(passes: &[RecordedPass]) -> Vec<&str> {
    passes.iter().map(RecordedPass::label).collect()
}

/// Passes recorded by the effect chain: sub-passes and copy-backs.
pub fn effect_passes(passes: &[RecordedPass]) -> Vec<&RecordedPass> {
    passes
        .iter()
        .filter(|pass| pass.label().starts_with("Effect"))
        .collect()
}

pub fn view(camera: &Camera, texture: CameraTexture) -> TextureViewHandle {
    camera
        .targets()
        .view(texture)
        .unwrap_or_else(|| panic!("{:?} is not allocated", texture))
}

/// Drawable that issues one indexed draw, optionally on the deferred path.
pub struct FlatDrawable {
    pub name: String,
    pub deferred: bool,
}

impl FlatDrawable {
    pub fn forward(name: &str) -> Rc<dyn Drawable> {
        Rc::new(Self {
            name: name.to_string(),
            deferred: false,
        })
    }

    pub fn deferred(name: &str) -> Rc<dyn Drawable> {
        Rc::new(Self {
            name: name.to_string(),
            deferred: true,
        })
    }
}

impl Drawable for FlatDrawable {
    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let camera_group = ctx.camera_bind_group();
        let backend = ctx.backend();
        backend.set_bind_group(0, camera_group);
        backend.draw_indexed(0..6, 0, 0..1);
    }

    fn supports_deferred_pass(&self) -> bool {
        self.deferred
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// What a [`TestEffect`] saw while it ran.
#[derive(Debug, Default)]
pub struct EffectProbe {
    pub depth_enabled: Vec<bool>,
    pub domains: Vec<EffectDomain>,
    pub released: bool,
}

/// Effect that runs a fixed number of plain copy sub-passes.
pub struct TestEffect {
    name: String,
    domain: EffectDomain,
    sub_passes: u32,
    pipeline: Option<RenderPipelineHandle>,
    probe: Rc<RefCell<EffectProbe>>,
}

impl TestEffect {
    pub fn new(name: &str, domain: EffectDomain, sub_passes: u32) -> Self {
        Self {
            name: name.to_string(),
            domain,
            sub_passes,
            pipeline: None,
            probe: Rc::default(),
        }
    }

    pub fn boxed(name: &str, domain: EffectDomain, sub_passes: u32) -> Box<dyn Effect> {
        Box::new(Self::new(name, domain, sub_passes))
    }

    pub fn probe(&self) -> Rc<RefCell<EffectProbe>> {
        Rc::clone(&self.probe)
    }
}

impl Effect for TestEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> EffectDomain {
        self.domain
    }

    fn prepare(&mut self, setup: &mut EffectSetup<'_>) -> BackendResult<()> {
        self.pipeline = Some(setup.fullscreen_pipeline(&self.name, shaders::COPY_FRAGMENT, &[])?);
        Ok(())
    }

    fn render(&mut self, ctx: &mut EffectContext<'_>) {
        {
            let mut probe = self.probe.borrow_mut();
            probe.depth_enabled.push(ctx.depth_enabled());
            probe.domains.push(ctx.active_domain());
        }
        let Some(pipeline) = self.pipeline else {
            return;
        };
        ctx.bind_shader(pipeline, &[]);
        for _ in 0..self.sub_passes {
            ctx.run_sub_pass();
        }
    }

    fn release(&mut self, _backend: &mut dyn GraphicsBackend) {
        self.probe.borrow_mut().released = true;
    }
}
