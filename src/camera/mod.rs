//! Camera: the aggregate root of the per-camera pipeline
//!
//! A camera owns its render targets, the optional G-buffer, compiled pipelines,
//! uniform blocks, its effect chain and the drawable cache. [`Camera::render`] runs
//! the fixed stage sequence from [`crate::pipeline`] once per call.

pub mod cache;
pub mod config;
pub mod gbuffer;
pub mod resources;
pub mod shaders;
pub mod targets;
pub mod view;

pub use cache::DrawableCache;
pub use config::{CameraConfig, ClearMode, ProjectionKind, RenderPath};
pub use gbuffer::GBuffer;
pub use resources::{CameraLayouts, CameraResources};
pub use shaders::{CameraShaders, ShaderSet, ShaderStage};
pub use targets::{
    AttachmentSlot, CameraTexture, ClearFlags, RenderTargetSet, ResizedTargets, TargetFeatures,
    TargetTexture,
    DEPTH_FORMAT, HDR_FORMAT, LDR_FORMAT, NEUTRAL_CLEAR_COLOR, NORMALS_FORMAT,
};
pub use view::{matrix_aspect_ratio, Projection, ViewState};

use crate::backend::{
    BackendError, BindGroupLayoutHandle, GraphicsBackend, TextureFormat, TextureViewHandle,
};
use crate::error::{RenderError, RenderResult};
use crate::instance::{InstanceId, InstanceRegistry};
use crate::pipeline::{Effect, EffectDomain, EffectSetup, FrameState, PassContext, FRAME_PASSES};
use crate::scene::{SceneQuery, Transform};
use crate::window::OutputSurface;
use glam::{Mat3, Mat4, Vec3};
use std::sync::Arc;

/// Attachment formats a drawable renders into, per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    /// Scene color target of the forward pass
    pub color: TextureFormat,
    /// G-buffer attachments, on the deferred path only
    pub gbuffer: Option<[TextureFormat; 2]>,
    pub depth: TextureFormat,
    /// Normals target when the normals pass is enabled
    pub normals: Option<TextureFormat>,
}

impl TargetFormats {
    pub fn new(config: &CameraConfig, gbuffer: Option<&GBuffer>) -> Self {
        Self {
            color: if config.hdr { HDR_FORMAT } else { LDR_FORMAT },
            gbuffer: gbuffer.map(GBuffer::color_formats),
            depth: DEPTH_FORMAT,
            normals: config.normals_pass.then_some(NORMALS_FORMAT),
        }
    }
}

/// Check that an effect of `next` domain may join a chain already holding
/// `existing`. HDR effects precede the tonemapper which precedes LDR effects.
fn check_effect_order(
    hdr: bool,
    existing: impl IntoIterator<Item = EffectDomain>,
    next: EffectDomain,
) -> Result<(), &'static str> {
    let tonemapped = existing
        .into_iter()
        .any(|domain| domain == EffectDomain::Tonemapper);

    match (hdr, tonemapped, next) {
        (false, _, EffectDomain::Hdr) => Err("HDR effects need an HDR camera"),
        (false, _, EffectDomain::Tonemapper) => Err("tonemapping needs an HDR camera"),
        (false, _, EffectDomain::Ldr) => Ok(()),
        (true, false, EffectDomain::Ldr) => Err("LDR effects must follow the tonemapper"),
        (true, false, _) => Ok(()),
        (true, true, EffectDomain::Hdr) => Err("HDR effects must precede the tonemapper"),
        (true, true, EffectDomain::Tonemapper) => Err("the chain already has a tonemapper"),
        (true, true, EffectDomain::Ldr) => Ok(()),
    }
}

/// A camera and everything it needs to turn a scene into an image.
pub struct Camera {
    id: InstanceId,
    registry: Arc<InstanceRegistry>,
    config: CameraConfig,
    projection: Projection,
    view: ViewState,
    resources: CameraResources,
    shaders: CameraShaders,
    targets: RenderTargetSet,
    gbuffer: Option<GBuffer>,
    effects: Vec<Box<dyn Effect>>,
    cache: DrawableCache,
    frame: FrameState,
    released: bool,
}

impl Camera {
    /// Build a camera rendering at `resolution`.
    ///
    /// Fails if the resolution has a zero extent, the copy shader does not build or
    /// any render target cannot be allocated. Nothing is leaked on failure.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        registry: Arc<InstanceRegistry>,
        config: CameraConfig,
        shader_set: &ShaderSet,
        resolution: (u32, u32),
    ) -> RenderResult<Self> {
        let (width, height) = resolution;
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroResolution { width, height });
        }

        let id = registry.assign(config.label.clone())?;
        let mut resources = match CameraResources::new(backend) {
            Ok(resources) => resources,
            Err(err) => {
                registry.release(&[id]);
                return Err(err.into());
            }
        };

        let parts = Self::allocate_parts(backend, &config, shader_set, &resources, width, height);
        let (shaders, targets, gbuffer) = match parts {
            Ok(parts) => parts,
            Err(err) => {
                resources.release(backend);
                registry.release(&[id]);
                return Err(err.into());
            }
        };

        let projection = Projection::from_config(&config, width, height);
        let view = ViewState::new(&projection, resolution, config.hdr);
        log::debug!(
            "Created camera {} ({}, {:?}, hdr: {}) at {}x{}",
            id,
            config.label,
            config.render_path,
            config.hdr,
            width,
            height
        );

        Ok(Self {
            id,
            registry,
            config,
            projection,
            view,
            resources,
            shaders,
            targets,
            gbuffer,
            effects: Vec::new(),
            cache: DrawableCache::new(),
            frame: FrameState::default(),
            released: false,
        })
    }

    fn allocate_parts(
        backend: &mut dyn GraphicsBackend,
        config: &CameraConfig,
        shader_set: &ShaderSet,
        resources: &CameraResources,
        width: u32,
        height: u32,
    ) -> Result<(CameraShaders, RenderTargetSet, Option<GBuffer>), BackendError> {
        let output_format = backend.swapchain_format();
        let shaders =
            CameraShaders::compile(backend, shader_set, config, &resources.layouts, output_format)?;

        let features = TargetFeatures { hdr: config.hdr };
        let mut targets = RenderTargetSet::allocate(
            backend,
            width,
            height,
            features,
            resources.layouts.sample,
            resources.sampler,
        )?;

        if config.render_path != RenderPath::Deferred {
            return Ok((shaders, targets, None));
        }

        let gbuffer = Self::depth_view(&targets).and_then(|depth| {
            GBuffer::allocate(
                backend,
                width,
                height,
                config.hdr,
                depth,
                resources.layouts.gbuffer,
                resources.sampler,
            )
        });
        match gbuffer {
            Ok(gbuffer) => Ok((shaders, targets, Some(gbuffer))),
            Err(err) => {
                targets.release(backend);
                Err(err)
            }
        }
    }

    fn depth_view(targets: &RenderTargetSet) -> Result<TextureViewHandle, BackendError> {
        Self::require_depth(targets.view(CameraTexture::Depth))
    }

    fn require_depth(view: Option<TextureViewHandle>) -> Result<TextureViewHandle, BackendError> {
        view.ok_or_else(|| BackendError::TextureCreationFailed("camera depth target missing".into()))
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    // Transform and matrices

    /// Derive view matrix, normal matrix and world position from a transform.
    pub fn set_transform(&mut self, transform: &Transform) {
        self.view.set_view(transform.view_matrix());
        self.view.set_position(transform.position);
    }

    /// Set the view matrix directly. The normal matrix follows it.
    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view.set_view(view);
    }

    pub fn set_normal_matrix(&mut self, normal: Mat3) {
        self.view.set_normal(normal);
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.view.set_position(position);
    }

    /// Vertical field of view in radians. Perspective cameras only.
    pub fn set_field_of_view(&mut self, field_of_view: f32) {
        self.config.field_of_view = field_of_view;
        self.recompute_projection();
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.config.near = near;
        self.config.far = far;
        self.recompute_projection();
    }

    fn recompute_projection(&mut self) {
        let (width, height) = self.targets.size();
        self.projection = Projection::from_config(&self.config, width, height);
        self.view.set_projection(&self.projection, (width, height));
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
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

    pub fn position(&self) -> Vec3 {
        self.view.position()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.view.aspect_ratio()
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.targets.size()
    }

    // Clearing

    pub fn set_clear_mode(&mut self, mode: ClearMode) {
        self.config.clear_mode = mode;
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.config.clear_color = color;
    }

    // Layouts and state for drawables, effects and tests

    /// Layout of bind group 0 for drawables (camera uniforms).
    pub fn camera_layout(&self) -> BindGroupLayoutHandle {
        self.resources.layouts.camera
    }

    /// Layout drawables use for bind group 1 (model and normal matrix).
    pub fn object_layout(&self) -> BindGroupLayoutHandle {
        self.resources.layouts.object
    }

    pub fn target_formats(&self) -> TargetFormats {
        TargetFormats::new(&self.config, self.gbuffer.as_ref())
    }

    /// Transient state of the last rendered frame.
    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn targets(&self) -> &RenderTargetSet {
        &self.targets
    }

    pub fn gbuffer(&self) -> Option<&GBuffer> {
        self.gbuffer.as_ref()
    }

    pub fn shaders(&self) -> &CameraShaders {
        &self.shaders
    }

    pub fn resources(&self) -> &CameraResources {
        &self.resources
    }

    pub fn cache(&self) -> &DrawableCache {
        &self.cache
    }

    pub fn effects(&self) -> &[Box<dyn Effect>] {
        &self.effects
    }

    /// Append an effect to the chain and create its GPU resources.
    ///
    /// Rejects effects whose domain breaks the HDR, tonemapper, LDR order.
    pub fn add_effect(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        mut effect: Box<dyn Effect>,
    ) -> RenderResult<()> {
        let domain = effect.domain();
        let existing = self.effects.iter().map(|effect| effect.domain());
        if let Err(reason) = check_effect_order(self.config.hdr, existing, domain) {
            log::error!("Rejected effect {} on camera {}: {}", effect.name(), self.id, reason);
            return Err(RenderError::EffectOrder {
                effect: effect.name().to_string(),
                domain,
                reason,
            });
        }

        let mut setup =
            EffectSetup::new(backend, self.resources.layouts.sample, domain, self.config.hdr);
        effect.prepare(&mut setup)?;

        log::debug!("Camera {}: added effect {} ({:?})", self.id, effect.name(), domain);
        self.effects.push(effect);
        Ok(())
    }

    /// Rebuild the drawable cache. Call after every structural scene change.
    pub fn on_scene_graph_update(&mut self, scene: &dyn SceneQuery) {
        self.cache.rebuild(self.config.render_path, scene);
        log::debug!(
            "Camera {}: {} forward / {} deferred drawables",
            self.id,
            self.cache.forward_len(),
            self.cache.deferred_len()
        );
    }

    /// Resize if the surface reports a resize this frame.
    pub fn update(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        surface: &dyn OutputSurface,
    ) -> RenderResult<bool> {
        if !surface.was_resized() {
            return Ok(false);
        }
        let (width, height) = surface.resolution();
        self.resize(backend, width, height)
    }

    /// Reallocate targets and G-buffer at a new resolution, then recompute the
    /// projection. Zero extents and unchanged sizes are ignored.
    ///
    /// All or nothing: if any allocation fails the camera keeps its old targets,
    /// G-buffer and projection.
    pub fn resize(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> RenderResult<bool> {
        let Some(resized) = self.targets.prepare_resize(backend, width, height)? else {
            return Ok(false);
        };

        // the G-buffer is rebuilt against the new depth view before any swap
        if let Some(gbuffer) = self.gbuffer.as_mut() {
            let rebuilt = Self::require_depth(resized.view(CameraTexture::Depth))
                .and_then(|depth| gbuffer.resize(backend, width, height, depth));
            if let Err(err) = rebuilt {
                log::error!("Camera {} failed to resize to {}x{}: {}", self.id, width, height, err);
                resized.discard(backend);
                return Err(err.into());
            }
        }
        self.targets.commit_resize(backend, resized);

        self.projection.set_resolution(width, height);
        self.view.set_projection(&self.projection, (width, height));
        log::debug!("Camera {} resized to {}x{}", self.id, width, height);
        Ok(true)
    }

    /// Render one frame into `output`.
    ///
    /// The drawable cache must be current: a scene mutated without
    /// [`Self::on_scene_graph_update`] is a caller error.
    pub fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        scene: &dyn SceneQuery,
        output: TextureViewHandle,
    ) -> RenderResult<()> {
        if self.cache.is_stale(scene) {
            log::error!(
                "Camera {} renders a cache built from scene generation {} but the scene is at {}",
                self.id,
                self.cache.generation(),
                scene.generation()
            );
            debug_assert!(false, "drawable cache is stale");
        }

        self.resources.refresh_environment(backend, scene.skybox())?;
        self.resources
            .write_frame(backend, &self.view, self.gbuffer.as_ref().map(GBuffer::size));
        self.frame.begin(self.config.hdr);

        let mut ctx = PassContext {
            backend: &mut *backend,
            config: &self.config,
            view: &self.view,
            targets: &mut self.targets,
            gbuffer: self.gbuffer.as_ref(),
            shaders: &self.shaders,
            resources: &self.resources,
            cache: &self.cache,
            effects: &mut self.effects[..],
            frame: &mut self.frame,
            skybox: scene.skybox(),
            output,
        };
        for pass in FRAME_PASSES {
            ctx.frame.enter(pass.stage());
            pass.execute(&mut ctx);
        }
        ctx.frame.finish();
        Ok(())
    }

    /// Destroy every GPU resource the camera owns and return its identity.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.released {
            return;
        }
        for effect in self.effects.iter_mut() {
            effect.release(backend);
        }
        self.effects.clear();
        if let Some(mut gbuffer) = self.gbuffer.take() {
            gbuffer.release(backend);
        }
        self.targets.release(backend);
        self.resources.release(backend);
        self.registry.release(&[self.id]);
        self.released = true;
        log::debug!("Released camera {}", self.id);
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("Camera {} dropped without release; its GPU resources leak", self.id);
            self.registry.release(&[self.id]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use rstest::rstest;

    #[rstest]
    #[case::ldr_hdr(false, &[], EffectDomain::Hdr, false)]
    #[case::ldr_tonemapper(false, &[], EffectDomain::Tonemapper, false)]
    #[case::ldr_ldr(false, &[EffectDomain::Ldr], EffectDomain::Ldr, true)]
    #[case::hdr_before_tonemapper(true, &[EffectDomain::Hdr], EffectDomain::Hdr, true)]
    #[case::ldr_before_tonemapper(true, &[EffectDomain::Hdr], EffectDomain::Ldr, false)]
    #[case::tonemapper(true, &[EffectDomain::Hdr], EffectDomain::Tonemapper, true)]
    #[case::second_tonemapper(true, &[EffectDomain::Tonemapper], EffectDomain::Tonemapper, false)]
    #[case::hdr_after_tonemapper(true, &[EffectDomain::Tonemapper], EffectDomain::Hdr, false)]
    #[case::ldr_after_tonemapper(true, &[EffectDomain::Tonemapper], EffectDomain::Ldr, true)]
    fn effect_order_rules(
        #[case] hdr: bool,
        #[case] existing: &[EffectDomain],
        #[case] next: EffectDomain,
        #[case] accepted: bool,
    ) {
        let result = check_effect_order(hdr, existing.iter().copied(), next);
        assert_eq!(result.is_ok(), accepted, "{:?}", result);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let mut backend = RecordingBackend::new(4, 4);
        let registry = Arc::new(InstanceRegistry::new());
        let result = Camera::new(
            &mut backend,
            registry.clone(),
            CameraConfig::default(),
            &ShaderSet::default(),
            (0, 4),
        );
        assert!(matches!(
            result,
            Err(RenderError::ZeroResolution { width: 0, height: 4 })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_construction_returns_identity_and_textures() {
        let mut backend = RecordingBackend::new(4, 4);
        let registry = Arc::new(InstanceRegistry::new());
        let textures_before = backend.live_texture_count();
        // environment placeholder and the first two targets succeed
        backend.fail_texture_allocations_after(3);

        let result = Camera::new(
            &mut backend,
            registry.clone(),
            CameraConfig::default().with_hdr(true),
            &ShaderSet::default(),
            (4, 4),
        );
        assert!(matches!(result, Err(RenderError::Backend(_))));
        assert!(registry.is_empty());
        assert_eq!(backend.live_texture_count(), textures_before);
    }

    #[test]
    fn release_returns_identity() {
        let mut backend = RecordingBackend::new(4, 4);
        let registry = Arc::new(InstanceRegistry::new());
        let mut camera = Camera::new(
            &mut backend,
            registry.clone(),
            CameraConfig::default().with_render_path(RenderPath::Deferred),
            &ShaderSet::default(),
            (4, 4),
        )
        .unwrap();
        assert_eq!(registry.get(camera.id()).unwrap(), "Camera");
        assert!(camera.gbuffer().is_some());

        camera.release(&mut backend);
        assert!(registry.is_empty());
        assert_eq!(backend.live_texture_count(), 1);
    }
}
