//! Per-camera pass pipeline
//!
//! Every frame a camera runs the same fixed sequence of stages:
//! 1. Clear background - clear mode dispatch, optional skybox
//! 2. Deferred pass - G-buffer geometry + ambient resolve (Deferred path only)
//! 3. Forward pass - forward drawables, then the optional normals prepass
//! 4. Effect chain - post-process effects over ping-pong targets
//! 5. Resolve - copy the final camera image to the output view

pub mod background;
pub mod deferred_pass;
pub mod effect_chain;
pub mod forward_pass;
pub mod normals_pass;
pub mod postprocess;
pub mod resolve;
pub mod shaders;

pub use background::BackgroundPass;
pub use deferred_pass::DeferredPass;
pub use effect_chain::{sub_pass_buffers, Effect, EffectChain, EffectContext, EffectDomain, EffectSetup};
pub use forward_pass::ForwardPass;
pub use resolve::ResolvePass;

use crate::backend::{
    BindGroupHandle, DepthStencilAttachment, GraphicsBackend, RenderPipelineHandle,
    TextureViewHandle,
};
use crate::camera::{
    CameraConfig, CameraResources, CameraShaders, CameraTexture, DrawableCache, GBuffer,
    RenderPath, RenderTargetSet, TargetFormats, ViewState,
};
use crate::scene::{DrawContext, Drawable, Skybox};
use std::rc::Rc;

/// Stages of one camera frame, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrameStage {
    ClearBackground,
    DeferredPass,
    ForwardPass,
    EffectChain,
    Resolve,
}

/// Transient camera state written by the passes and read by drawables and effects.
#[derive(Debug, Clone)]
pub struct FrameState {
    stage: Option<FrameStage>,
    completed: Vec<FrameStage>,
    pub(crate) render_path: RenderPath,
    pub(crate) domain: EffectDomain,
    pub(crate) sub_pass: u32,
    pub(crate) depth_test: bool,
    pub(crate) depth_write: bool,
    pub(crate) tonemapped: bool,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            stage: None,
            completed: Vec::new(),
            render_path: RenderPath::Forward,
            domain: EffectDomain::Ldr,
            sub_pass: 0,
            depth_test: true,
            depth_write: true,
            tonemapped: false,
        }
    }
}

impl FrameState {
    pub(crate) fn begin(&mut self, hdr: bool) {
        *self = Self {
            domain: if hdr { EffectDomain::Hdr } else { EffectDomain::Ldr },
            ..Self::default()
        };
    }

    pub(crate) fn enter(&mut self, stage: FrameStage) {
        debug_assert!(
            self.stage.map_or(true, |current| current < stage),
            "frame stage {:?} entered after {:?}",
            stage,
            self.stage
        );
        log::trace!("Camera stage: {:?}", stage);
        if let Some(done) = self.stage.replace(stage) {
            self.completed.push(done);
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(done) = self.stage.take() {
            self.completed.push(done);
        }
    }

    /// Stage currently executing, `None` between frames.
    pub fn stage(&self) -> Option<FrameStage> {
        self.stage
    }

    /// Stages the last (or current) frame went through.
    pub fn completed_stages(&self) -> &[FrameStage] {
        &self.completed
    }

    pub fn render_path(&self) -> RenderPath {
        self.render_path
    }

    pub fn domain(&self) -> EffectDomain {
        self.domain
    }

    pub fn sub_pass(&self) -> u32 {
        self.sub_pass
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    /// Whether a tonemapper moved the chain into the LDR domain this frame.
    pub fn tonemapped(&self) -> bool {
        self.tonemapped
    }
}

/// Everything a pass may touch while a camera renders one frame.
pub(crate) struct PassContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub config: &'a CameraConfig,
    pub view: &'a ViewState,
    pub targets: &'a mut RenderTargetSet,
    pub gbuffer: Option<&'a GBuffer>,
    pub shaders: &'a CameraShaders,
    pub resources: &'a CameraResources,
    pub cache: &'a DrawableCache,
    pub effects: &'a mut [Box<dyn Effect>],
    pub frame: &'a mut FrameState,
    pub skybox: Option<&'a Skybox>,
    pub output: TextureViewHandle,
}

impl PassContext<'_> {
    /// Scene color texture: HDR primary on HDR cameras, LDR primary otherwise.
    pub fn scene_texture(&self) -> CameraTexture {
        if self.config.hdr {
            CameraTexture::Hdr0
        } else {
            CameraTexture::Ldr0
        }
    }

    /// Camera texture holding the finished image once the chain has run.
    pub fn final_texture(&self) -> CameraTexture {
        if self.config.hdr && !self.frame.tonemapped {
            CameraTexture::Hdr0
        } else {
            CameraTexture::Ldr0
        }
    }

    /// Depth attachment matching the current depth flags.
    pub fn depth_attachment(&self) -> Option<DepthStencilAttachment> {
        if self.frame.depth_test || self.frame.depth_write {
            self.targets
                .view(CameraTexture::Depth)
                .map(DepthStencilAttachment::load)
        } else {
            None
        }
    }

    pub fn target_formats(&self) -> TargetFormats {
        TargetFormats::new(self.config, self.gbuffer)
    }

    /// Invoke `draw` on each drawable inside the current render pass.
    pub fn draw_all(
        &mut self,
        drawables: &[Rc<dyn Drawable>],
        shader_override: Option<RenderPipelineHandle>,
    ) {
        let formats = self.target_formats();
        let camera_group: BindGroupHandle = self.resources.camera_group();
        for drawable in drawables {
            log::trace!("Drawing {}", drawable.label());
            let mut draw_ctx = DrawContext::new(
                &mut *self.backend,
                self.view,
                self.frame.render_path,
                formats,
                camera_group,
                shader_override,
            );
            drawable.draw(&mut draw_ctx);
        }
    }
}

/// One stage of the camera frame.
pub(crate) trait CameraPass {
    fn stage(&self) -> FrameStage;

    fn execute(&self, ctx: &mut PassContext<'_>);
}

/// The fixed stage sequence.
pub(crate) const FRAME_PASSES: [&dyn CameraPass; 5] = [
    &BackgroundPass,
    &DeferredPass,
    &ForwardPass,
    &EffectChain,
    &ResolvePass,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_passes_run_in_stage_order() {
        let stages: Vec<FrameStage> = FRAME_PASSES.iter().map(|pass| pass.stage()).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
        assert_eq!(stages.len(), 5);
    }

    #[test]
    fn frame_state_records_completed_stages() {
        let mut state = FrameState::default();
        state.begin(true);
        assert_eq!(state.domain(), EffectDomain::Hdr);

        state.enter(FrameStage::ClearBackground);
        state.enter(FrameStage::ForwardPass);
        state.finish();

        assert_eq!(state.stage(), None);
        assert_eq!(
            state.completed_stages(),
            &[FrameStage::ClearBackground, FrameStage::ForwardPass]
        );
    }
}
