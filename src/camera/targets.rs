//! Render Target Set: the camera's color, depth and normals textures

use crate::backend::{
    BackendError, BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutHandle,
    ColorAttachment, DepthStencilAttachment, GraphicsBackend, RenderPassDescriptor, SamplerHandle,
    TextureDescriptor, TextureFormat, TextureHandle, TextureViewDimension, TextureViewHandle,
};

pub const LDR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
pub const NORMALS_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Clear color restored after every colored clear
pub const NEUTRAL_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Every texture a camera can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraTexture {
    /// LDR primary
    Ldr0,
    /// LDR secondary
    Ldr1,
    /// HDR primary
    Hdr0,
    /// HDR secondary
    Hdr1,
    Depth,
    Normals,
}

impl CameraTexture {
    pub const ALL: [CameraTexture; 6] = [
        CameraTexture::Ldr0,
        CameraTexture::Ldr1,
        CameraTexture::Hdr0,
        CameraTexture::Hdr1,
        CameraTexture::Depth,
        CameraTexture::Normals,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn format(self) -> TextureFormat {
        match self {
            CameraTexture::Ldr0 | CameraTexture::Ldr1 => LDR_FORMAT,
            CameraTexture::Hdr0 | CameraTexture::Hdr1 => HDR_FORMAT,
            CameraTexture::Depth => DEPTH_FORMAT,
            CameraTexture::Normals => NORMALS_FORMAT,
        }
    }

    pub fn is_hdr(self) -> bool {
        matches!(self, CameraTexture::Hdr0 | CameraTexture::Hdr1)
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraTexture::Ldr0 => "Camera LDR 0",
            CameraTexture::Ldr1 => "Camera LDR 1",
            CameraTexture::Hdr0 => "Camera HDR 0",
            CameraTexture::Hdr1 => "Camera HDR 1",
            CameraTexture::Depth => "Camera Depth",
            CameraTexture::Normals => "Camera Normals",
        }
    }

    /// Attachment slot this texture is bound to.
    pub fn slot(self) -> AttachmentSlot {
        match self {
            CameraTexture::Ldr0 => AttachmentSlot::Color0,
            CameraTexture::Hdr0 => AttachmentSlot::Color1,
            CameraTexture::Ldr1 => AttachmentSlot::Color2,
            CameraTexture::Hdr1 => AttachmentSlot::Color3,
            CameraTexture::Normals => AttachmentSlot::Color4,
            CameraTexture::Depth => AttachmentSlot::Depth,
        }
    }
}

/// Framebuffer attachment points, each permanently bound to one texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    Color0,
    Color1,
    Color2,
    Color3,
    Color4,
    Depth,
}

impl AttachmentSlot {
    pub fn texture(self) -> CameraTexture {
        match self {
            AttachmentSlot::Color0 => CameraTexture::Ldr0,
            AttachmentSlot::Color1 => CameraTexture::Hdr0,
            AttachmentSlot::Color2 => CameraTexture::Ldr1,
            AttachmentSlot::Color3 => CameraTexture::Hdr1,
            AttachmentSlot::Color4 => CameraTexture::Normals,
            AttachmentSlot::Depth => CameraTexture::Depth,
        }
    }
}

bitflags::bitflags! {
    /// Which buffers a clear touches
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits();
    }
}

/// One allocated target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetTexture {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub format: TextureFormat,
    /// Texture + sampler group for fullscreen passes reading this target
    pub sample_group: Option<BindGroupHandle>,
}

/// Which optional textures a set carries. Normals and depth are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetFeatures {
    pub hdr: bool,
}

impl TargetFeatures {
    fn wants(&self, texture: CameraTexture) -> bool {
        !texture.is_hdr() || self.hdr
    }
}

/// Targets allocated at a new size that have not replaced the live set yet.
///
/// Hand them to [`RenderTargetSet::commit_resize`] or drop them with
/// [`ResizedTargets::discard`].
pub struct ResizedTargets {
    slots: [Option<TargetTexture>; 6],
    size: (u32, u32),
}

impl ResizedTargets {
    pub fn view(&self, texture: CameraTexture) -> Option<TextureViewHandle> {
        self.slots[texture.index()].as_ref().map(|t| t.view)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn discard(mut self, backend: &mut dyn GraphicsBackend) {
        RenderTargetSet::release_slots(backend, &mut self.slots);
        log::debug!("Discarded camera targets of {}x{}", self.size.0, self.size.1);
    }
}

/// Render Target Set. Storage is a fixed array indexed by [`CameraTexture`].
pub struct RenderTargetSet {
    slots: [Option<TargetTexture>; 6],
    size: (u32, u32),
    features: TargetFeatures,
    draw_buffer: AttachmentSlot,
    clear_color: [f32; 4],
    sample_layout: BindGroupLayoutHandle,
    sampler: SamplerHandle,
}

impl RenderTargetSet {
    /// Allocate every target the features call for. Fails without leaking if any
    /// allocation fails.
    pub fn allocate(
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
        features: TargetFeatures,
        sample_layout: BindGroupLayoutHandle,
        sampler: SamplerHandle,
    ) -> BackendResult<Self> {
        let slots = Self::allocate_slots(backend, width, height, features, sample_layout, sampler)?;
        log::debug!(
            "Allocated camera targets {}x{} (hdr: {})",
            width,
            height,
            features.hdr
        );
        Ok(Self {
            slots,
            size: (width, height),
            features,
            draw_buffer: AttachmentSlot::Color0,
            clear_color: NEUTRAL_CLEAR_COLOR,
            sample_layout,
            sampler,
        })
    }

    fn allocate_slots(
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
        features: TargetFeatures,
        sample_layout: BindGroupLayoutHandle,
        sampler: SamplerHandle,
    ) -> BackendResult<[Option<TargetTexture>; 6]> {
        if width == 0 || height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "camera targets of {}x{}",
                width, height
            )));
        }

        let mut slots = [None; 6];
        for texture in CameraTexture::ALL {
            if !features.wants(texture) {
                continue;
            }
            match Self::allocate_target(backend, texture, width, height, sample_layout, sampler) {
                Ok(target) => slots[texture.index()] = Some(target),
                Err(err) => {
                    log::error!("Failed to allocate {}: {}", texture.label(), err);
                    Self::release_slots(backend, &mut slots);
                    return Err(err);
                }
            }
        }
        Ok(slots)
    }

    fn allocate_target(
        backend: &mut dyn GraphicsBackend,
        kind: CameraTexture,
        width: u32,
        height: u32,
        sample_layout: BindGroupLayoutHandle,
        sampler: SamplerHandle,
    ) -> BackendResult<TargetTexture> {
        let format = kind.format();
        let texture = backend.create_texture(&TextureDescriptor::render_target(
            kind.label(),
            width,
            height,
            format,
        ))?;
        let view = match backend.create_texture_view(texture, TextureViewDimension::D2) {
            Ok(view) => view,
            Err(err) => {
                backend.destroy_texture(texture);
                return Err(err);
            }
        };

        let sample_group = if format.is_depth() {
            None
        } else {
            let group = backend.create_bind_group(
                sample_layout,
                &[
                    (0, BindGroupEntry::Texture(view)),
                    (1, BindGroupEntry::Sampler(sampler)),
                ],
            );
            match group {
                Ok(group) => Some(group),
                Err(err) => {
                    backend.destroy_texture(texture);
                    return Err(err);
                }
            }
        };

        Ok(TargetTexture {
            texture,
            view,
            format,
            sample_group,
        })
    }

    fn release_slots(backend: &mut dyn GraphicsBackend, slots: &mut [Option<TargetTexture>; 6]) {
        for target in slots.iter_mut().filter_map(Option::take) {
            if let Some(group) = target.sample_group {
                backend.destroy_bind_group(group);
            }
            backend.destroy_texture(target.texture);
        }
    }

    /// Reallocate every target at a new size. A zero extent or an unchanged size is
    /// ignored and returns `Ok(false)`. On failure the old targets stay in place.
    pub fn resize(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> BackendResult<bool> {
        match self.prepare_resize(backend, width, height)? {
            Some(resized) => {
                self.commit_resize(backend, resized);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Allocate a full set at a new size without touching the live targets.
    /// Returns `None` for a zero extent or an unchanged size.
    pub fn prepare_resize(
        &self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> BackendResult<Option<ResizedTargets>> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring camera target resize to {}x{}", width, height);
            return Ok(None);
        }
        if (width, height) == self.size {
            return Ok(None);
        }

        let slots = Self::allocate_slots(
            backend,
            width,
            height,
            self.features,
            self.sample_layout,
            self.sampler,
        )?;
        Ok(Some(ResizedTargets {
            slots,
            size: (width, height),
        }))
    }

    /// Swap in targets from [`Self::prepare_resize`] and release the old ones.
    pub fn commit_resize(&mut self, backend: &mut dyn GraphicsBackend, resized: ResizedTargets) {
        let ResizedTargets { mut slots, size } = resized;
        std::mem::swap(&mut self.slots, &mut slots);
        Self::release_slots(backend, &mut slots);
        self.size = size;
        log::debug!("Resized camera targets to {}x{}", size.0, size.1);
    }

    /// Make `slot` the attachment subsequent draws render into.
    pub fn select_draw_buffer(&mut self, slot: AttachmentSlot) {
        debug_assert!(
            self.get(slot.texture()).is_some(),
            "{:?} has no texture",
            slot
        );
        self.draw_buffer = slot;
    }

    pub fn draw_buffer(&self) -> AttachmentSlot {
        self.draw_buffer
    }

    /// View of the selected draw buffer.
    pub fn draw_view(&self) -> Option<TextureViewHandle> {
        self.view(self.draw_buffer.texture())
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Record a pass clearing the draw buffer and/or the depth buffer.
    pub fn clear(&self, backend: &mut dyn GraphicsBackend, flags: ClearFlags) {
        let color_attachments = if flags.contains(ClearFlags::COLOR) {
            self.draw_view()
                .map(|view| vec![ColorAttachment::clear(view, self.clear_color)])
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let depth_stencil_attachment = if flags.contains(ClearFlags::DEPTH) {
            self.view(CameraTexture::Depth)
                .map(DepthStencilAttachment::clear)
        } else {
            None
        };
        if color_attachments.is_empty() && depth_stencil_attachment.is_none() {
            return;
        }

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Camera Clear".to_string()),
            color_attachments,
            depth_stencil_attachment,
        });
        backend.end_render_pass();
    }

    pub fn get(&self, texture: CameraTexture) -> Option<&TargetTexture> {
        self.slots[texture.index()].as_ref()
    }

    pub fn view(&self, texture: CameraTexture) -> Option<TextureViewHandle> {
        self.get(texture).map(|t| t.view)
    }

    pub fn sample_group(&self, texture: CameraTexture) -> Option<BindGroupHandle> {
        self.get(texture).and_then(|t| t.sample_group)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Size of one texture, `None` when the set does not carry it.
    pub fn texture_size(&self, texture: CameraTexture) -> Option<(u32, u32)> {
        self.get(texture).map(|_| self.size)
    }

    pub fn features(&self) -> TargetFeatures {
        self.features
    }

    /// Which camera texture a view belongs to.
    pub fn identify(&self, view: TextureViewHandle) -> Option<CameraTexture> {
        CameraTexture::ALL
            .into_iter()
            .find(|texture| self.view(*texture) == Some(view))
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        Self::release_slots(backend, &mut self.slots);
        log::debug!("Released camera targets");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BindGroupLayoutEntry, BindingType, RecordingBackend, SamplerDescriptor, ShaderStageFlags,
    };

    fn sampling(backend: &mut RecordingBackend) -> (BindGroupLayoutHandle, SamplerHandle) {
        let layout = backend
            .create_bind_group_layout(&[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::texture_2d(),
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::Sampler,
                },
            ])
            .unwrap();
        let sampler = backend.create_sampler(&SamplerDescriptor::default()).unwrap();
        (layout, sampler)
    }

    #[test]
    fn slot_table_round_trips() {
        for texture in CameraTexture::ALL {
            assert_eq!(texture.slot().texture(), texture);
        }
    }

    #[test]
    fn ldr_set_has_no_hdr_textures() {
        let mut backend = RecordingBackend::new(64, 64);
        let (layout, sampler) = sampling(&mut backend);
        let targets =
            RenderTargetSet::allocate(&mut backend, 64, 32, TargetFeatures::default(), layout, sampler)
                .unwrap();

        assert!(targets.get(CameraTexture::Hdr0).is_none());
        assert!(targets.get(CameraTexture::Hdr1).is_none());
        assert_eq!(targets.texture_size(CameraTexture::Normals), Some((64, 32)));
        assert!(targets.sample_group(CameraTexture::Depth).is_none());
        assert_eq!(targets.texture_size(CameraTexture::Ldr1), Some((64, 32)));
    }

    #[test]
    fn failed_allocation_leaks_nothing() {
        let mut backend = RecordingBackend::new(64, 64);
        let (layout, sampler) = sampling(&mut backend);
        let before = backend.live_texture_count();
        backend.fail_texture_allocations_after(3);

        let result = RenderTargetSet::allocate(
            &mut backend,
            64,
            64,
            TargetFeatures { hdr: true },
            layout,
            sampler,
        );

        assert!(matches!(result, Err(BackendError::OutOfMemory)));
        assert_eq!(backend.live_texture_count(), before);
    }

    #[test]
    fn discarded_resize_keeps_the_live_set() {
        let mut backend = RecordingBackend::new(16, 16);
        let (layout, sampler) = sampling(&mut backend);
        let targets =
            RenderTargetSet::allocate(&mut backend, 16, 16, TargetFeatures::default(), layout, sampler)
                .unwrap();
        let before = backend.live_texture_count();
        let depth = targets.view(CameraTexture::Depth).unwrap();

        let resized = targets.prepare_resize(&mut backend, 32, 8).unwrap().unwrap();
        assert_eq!(resized.size(), (32, 8));
        assert_ne!(resized.view(CameraTexture::Depth), Some(depth));
        resized.discard(&mut backend);

        assert_eq!(backend.live_texture_count(), before);
        assert!(backend.is_live_view(depth));
        assert_eq!(targets.size(), (16, 16));
        assert!(targets.prepare_resize(&mut backend, 16, 16).unwrap().is_none());
    }

    #[test]
    fn depth_only_clear_has_no_color_attachment() {
        let mut backend = RecordingBackend::new(16, 16);
        let (layout, sampler) = sampling(&mut backend);
        let targets =
            RenderTargetSet::allocate(&mut backend, 16, 16, TargetFeatures::default(), layout, sampler)
                .unwrap();

        targets.clear(&mut backend, ClearFlags::DEPTH);

        let pass = &backend.passes()[0];
        assert!(pass.color_attachments.is_empty());
        assert_eq!(pass.depth_attachment, targets.view(CameraTexture::Depth));
    }

    #[test]
    fn identify_maps_views_back_to_textures() {
        let mut backend = RecordingBackend::new(16, 16);
        let (layout, sampler) = sampling(&mut backend);
        let targets = RenderTargetSet::allocate(
            &mut backend,
            16,
            16,
            TargetFeatures { hdr: true },
            layout,
            sampler,
        )
        .unwrap();

        for texture in CameraTexture::ALL {
            let view = targets.view(texture).unwrap();
            assert_eq!(targets.identify(view), Some(texture));
        }
        assert_eq!(targets.identify(backend.swapchain_view()), None);
    }
}
