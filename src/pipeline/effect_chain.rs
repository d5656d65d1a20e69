//! Post-process effect chain and its ping-pong sub-pass protocol
//!
//! Each dynamic-range domain has a primary and a secondary target. Between effects
//! the chain's current result always sits in the domain's primary target. Inside an
//! effect, sub-pass `i` reads primary and writes secondary when `i` is even and
//! reads secondary and writes primary when `i` is odd, so a sub-pass never samples
//! the texture it renders into. An effect that ran an odd number of sub-passes left
//! its result in secondary and is followed by one copy back into primary.
//!
//! A tonemapper reads the HDR primary and writes the LDR primary directly; after it
//! the chain continues in the LDR domain.

use crate::backend::{
    BackendResult, BindGroupHandle, BindGroupLayoutHandle, ColorAttachment, GraphicsBackend,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineHandle, TextureFormat,
};
use crate::camera::{CameraTexture, RenderTargetSet, ViewState, HDR_FORMAT, LDR_FORMAT};
use crate::pipeline::{shaders, CameraPass, FrameStage, FrameState, PassContext};
use glam::{Mat3, Mat4, Vec3};

/// Dynamic range an effect operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectDomain {
    Hdr,
    Ldr,
    /// Converts HDR input into LDR output in one step
    Tonemapper,
}

impl EffectDomain {
    /// Format of the targets the effect's pipelines render into.
    pub fn target_format(self) -> TextureFormat {
        match self {
            EffectDomain::Hdr => HDR_FORMAT,
            EffectDomain::Ldr | EffectDomain::Tonemapper => LDR_FORMAT,
        }
    }

    /// Primary and secondary target of the domain.
    pub fn buffers(self) -> (CameraTexture, CameraTexture) {
        match self {
            EffectDomain::Hdr => (CameraTexture::Hdr0, CameraTexture::Hdr1),
            EffectDomain::Ldr => (CameraTexture::Ldr0, CameraTexture::Ldr1),
            EffectDomain::Tonemapper => (CameraTexture::Hdr0, CameraTexture::Ldr0),
        }
    }
}

/// Read and write target of sub-pass `index` in `domain`.
pub fn sub_pass_buffers(domain: EffectDomain, index: u32) -> (CameraTexture, CameraTexture) {
    let (primary, secondary) = domain.buffers();
    match domain {
        EffectDomain::Tonemapper => (primary, secondary),
        _ if index % 2 == 0 => (primary, secondary),
        _ => (secondary, primary),
    }
}

/// A post-process effect.
///
/// `render` is called once per frame and drives zero or more sub-passes through the
/// [`EffectContext`]. Each sub-pass draws a fullscreen triangle with the bound
/// pipeline; group 0 is always the input texture and sampler.
pub trait Effect {
    fn name(&self) -> &str;

    fn domain(&self) -> EffectDomain;

    /// Create GPU resources. Called once when the effect joins a camera's chain.
    fn prepare(&mut self, setup: &mut EffectSetup<'_>) -> BackendResult<()>;

    fn render(&mut self, ctx: &mut EffectContext<'_>);

    fn release(&mut self, _backend: &mut dyn GraphicsBackend) {}
}

/// Resource creation context handed to [`Effect::prepare`].
pub struct EffectSetup<'a> {
    backend: &'a mut dyn GraphicsBackend,
    input_layout: BindGroupLayoutHandle,
    format: TextureFormat,
    hdr: bool,
}

impl<'a> EffectSetup<'a> {
    pub(crate) fn new(
        backend: &'a mut dyn GraphicsBackend,
        input_layout: BindGroupLayoutHandle,
        domain: EffectDomain,
        hdr: bool,
    ) -> Self {
        Self {
            backend,
            input_layout,
            format: domain.target_format(),
            hdr,
        }
    }

    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        &mut *self.backend
    }

    /// Layout of group 0 (input texture + sampler).
    pub fn input_layout(&self) -> BindGroupLayoutHandle {
        self.input_layout
    }

    pub fn target_format(&self) -> TextureFormat {
        self.format
    }

    pub fn hdr(&self) -> bool {
        self.hdr
    }

    /// Build a fullscreen pipeline from a fragment-only WGSL module. Group 0 is the
    /// input layout, `extra_layouts` follow from group 1.
    pub fn fullscreen_pipeline(
        &mut self,
        label: &str,
        fragment: &str,
        extra_layouts: &[BindGroupLayoutHandle],
    ) -> BackendResult<RenderPipelineHandle> {
        let source = shaders::fullscreen(fragment);
        let mut layouts = vec![self.input_layout];
        layouts.extend_from_slice(extra_layouts);
        self.backend
            .create_render_pipeline(&RenderPipelineDescriptor::fullscreen(
                label,
                &source,
                layouts,
                self.format,
            ))
    }
}

struct BoundShader {
    pipeline: RenderPipelineHandle,
    groups: Vec<BindGroupHandle>,
}

/// Sub-pass driver handed to [`Effect::render`].
pub struct EffectContext<'a> {
    backend: &'a mut dyn GraphicsBackend,
    view: &'a ViewState,
    targets: &'a mut RenderTargetSet,
    frame: &'a mut FrameState,
    effect: &'a str,
    shader: Option<BoundShader>,
}

impl<'a> EffectContext<'a> {
    pub(crate) fn new(
        backend: &'a mut dyn GraphicsBackend,
        view: &'a ViewState,
        targets: &'a mut RenderTargetSet,
        frame: &'a mut FrameState,
        effect: &'a str,
    ) -> Self {
        Self {
            backend,
            view,
            targets,
            frame,
            effect,
            shader: None,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.view.projection()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view.view()
    }

    pub fn normal_matrix(&self) -> Mat3 {
        self.view.normal()
    }

    pub fn camera_position(&self) -> Vec3 {
        self.view.position()
    }

    pub fn hdr(&self) -> bool {
        self.view.hdr()
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.targets.size()
    }

    pub fn active_domain(&self) -> EffectDomain {
        self.frame.domain
    }

    /// Index the next sub-pass will run with.
    pub fn sub_pass_index(&self) -> u32 {
        self.frame.sub_pass
    }

    /// Whether depth testing or depth writes are active. Off for the whole chain.
    pub fn depth_enabled(&self) -> bool {
        self.frame.depth_test || self.frame.depth_write
    }

    /// Backend for uniform uploads.
    ///
    /// Buffer writes take effect when the frame is submitted, so every sub-pass of
    /// the frame sees the last value written. Sub-passes that need different
    /// parameters need a buffer and bind group each.
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        &mut *self.backend
    }

    /// Use `pipeline` for the following sub-passes, with `groups` bound from index 1.
    pub fn bind_shader(&mut self, pipeline: RenderPipelineHandle, groups: &[BindGroupHandle]) {
        self.shader = Some(BoundShader {
            pipeline,
            groups: groups.to_vec(),
        });
    }

    /// Run one ping-pong sub-pass with the bound shader.
    pub fn run_sub_pass(&mut self) {
        let Some(shader) = self.shader.as_ref() else {
            log::error!("Effect {} ran a sub-pass without binding a shader", self.effect);
            return;
        };

        let index = self.frame.sub_pass;
        let (read, write) = sub_pass_buffers(self.frame.domain, index);
        debug_assert_ne!(read, write, "sub-pass reads its own render target");
        let (Some(input), Some(output)) = (self.targets.sample_group(read), self.targets.view(write))
        else {
            log::error!(
                "Effect {} sub-pass {} needs {:?} -> {:?}, which this camera lacks",
                self.effect,
                index,
                read,
                write
            );
            return;
        };

        self.targets.select_draw_buffer(write.slot());
        log::trace!("Effect {} sub-pass {}: {:?} -> {:?}", self.effect, index, read, write);

        self.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(format!("Effect: {} #{}", self.effect, index)),
            color_attachments: vec![ColorAttachment::load(output)],
            depth_stencil_attachment: None,
        });
        self.backend.set_render_pipeline(shader.pipeline);
        self.backend.set_bind_group(0, input);
        for (slot, group) in shader.groups.iter().enumerate() {
            self.backend.set_bind_group(slot as u32 + 1, *group);
        }
        self.backend.draw(0..3, 0..1);
        self.backend.end_render_pass();

        self.frame.sub_pass += 1;
    }
}

/// Runs the camera's effects in order.
pub struct EffectChain;

impl EffectChain {
    fn begin_effect(ctx: &mut PassContext<'_>, name: &str, domain: EffectDomain) {
        ctx.frame.sub_pass = 0;
        match domain {
            EffectDomain::Tonemapper => {
                debug_assert_eq!(ctx.frame.domain, EffectDomain::Hdr, "tonemapper outside HDR");
                ctx.frame.domain = EffectDomain::Tonemapper;
                ctx.targets.select_draw_buffer(CameraTexture::Ldr0.slot());
            }
            _ if domain != ctx.frame.domain => {
                log::error!(
                    "Effect {} expects {:?} input but the chain is in {:?}",
                    name,
                    domain,
                    ctx.frame.domain
                );
                debug_assert!(false, "effect domain out of order");
            }
            _ => {}
        }
    }

    fn end_effect(ctx: &mut PassContext<'_>) {
        if ctx.frame.domain == EffectDomain::Tonemapper {
            ctx.frame.domain = EffectDomain::Ldr;
            ctx.frame.tonemapped = true;
            ctx.targets.select_draw_buffer(CameraTexture::Ldr0.slot());
            return;
        }

        let (primary, secondary) = ctx.frame.domain.buffers();
        ctx.targets.select_draw_buffer(primary.slot());
        if ctx.frame.sub_pass % 2 == 1 {
            Self::copy_back(ctx, secondary, primary);
        }
    }

    fn copy_back(ctx: &mut PassContext<'_>, from: CameraTexture, to: CameraTexture) {
        let pipeline = ctx.shaders.copy_for(to.format());
        let input = ctx.targets.sample_group(from);
        let output = ctx.targets.view(to);
        let (Some(pipeline), Some(input), Some(output)) = (pipeline, input, output) else {
            log::error!("Cannot copy {:?} back into {:?}", from, to);
            return;
        };

        log::trace!("Copy-back {:?} -> {:?}", from, to);
        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Effect Copy-Back".to_string()),
            color_attachments: vec![ColorAttachment::load(output)],
            depth_stencil_attachment: None,
        });
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, input);
        ctx.backend.draw(0..3, 0..1);
        ctx.backend.end_render_pass();
    }
}

impl CameraPass for EffectChain {
    fn stage(&self) -> FrameStage {
        FrameStage::EffectChain
    }

    fn execute(&self, ctx: &mut PassContext<'_>) {
        ctx.frame.depth_test = false;
        ctx.frame.depth_write = false;

        let effects = std::mem::take(&mut ctx.effects);
        for effect in effects.iter_mut() {
            let name = effect.name().to_string();
            Self::begin_effect(ctx, &name, effect.domain());
            {
                let mut effect_ctx = EffectContext::new(
                    &mut *ctx.backend,
                    ctx.view,
                    &mut *ctx.targets,
                    &mut *ctx.frame,
                    &name,
                );
                effect.render(&mut effect_ctx);
            }
            Self::end_effect(ctx);
        }
        ctx.effects = effects;

        ctx.frame.depth_test = true;
        ctx.frame.depth_write = true;
    }
}
