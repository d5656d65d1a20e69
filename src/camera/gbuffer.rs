//! G-buffer for the deferred render path

use crate::backend::{
    BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindGroupLayoutHandle,
    BindingType, ColorAttachment, DepthStencilAttachment, GraphicsBackend, RenderPassDescriptor,
    SamplerHandle, ShaderStageFlags, TextureDescriptor, TextureFormat, TextureHandle,
    TextureSampleType, TextureViewDimension, TextureViewHandle,
};

/// Cleared value of both G-buffer color attachments
const GBUFFER_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Layout of the resolve input group: depth, albedo, normal/material, sampler.
pub fn input_layout(backend: &mut dyn GraphicsBackend) -> BackendResult<BindGroupLayoutHandle> {
    backend.create_bind_group_layout(&[
        BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Depth,
                view_dimension: TextureViewDimension::D2,
            },
        },
        BindGroupLayoutEntry {
            binding: 1,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::texture_2d(),
        },
        BindGroupLayoutEntry {
            binding: 2,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::texture_2d(),
        },
        BindGroupLayoutEntry {
            binding: 3,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Sampler,
        },
    ])
}

struct GBufferTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
}

/// Two geometry color attachments plus the camera's depth buffer. The depth view is
/// borrowed from the Render Target Set and never destroyed here.
pub struct GBuffer {
    color0: GBufferTarget,
    color1: GBufferTarget,
    depth: TextureViewHandle,
    formats: [TextureFormat; 2],
    size: (u32, u32),
    input_group: BindGroupHandle,
    input_layout: BindGroupLayoutHandle,
    sampler: SamplerHandle,
}

impl GBuffer {
    /// Attachment formats: albedo follows the camera's dynamic range, the
    /// normal/material target is always float.
    pub fn formats(hdr: bool) -> [TextureFormat; 2] {
        let color0 = if hdr {
            TextureFormat::Rgba16Float
        } else {
            TextureFormat::Rgba8Unorm
        };
        [color0, TextureFormat::Rgba16Float]
    }

    pub fn allocate(
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
        hdr: bool,
        depth: TextureViewHandle,
        input_layout: BindGroupLayoutHandle,
        sampler: SamplerHandle,
    ) -> BackendResult<Self> {
        let formats = Self::formats(hdr);
        let color0 = Self::allocate_target(backend, "G-Buffer Albedo", width, height, formats[0])?;
        let color1 =
            match Self::allocate_target(backend, "G-Buffer Normal", width, height, formats[1]) {
                Ok(target) => target,
                Err(err) => {
                    backend.destroy_texture(color0.texture);
                    return Err(err);
                }
            };
        let input_group =
            match Self::create_input_group(backend, input_layout, depth, &color0, &color1, sampler) {
                Ok(group) => group,
                Err(err) => {
                    backend.destroy_texture(color0.texture);
                    backend.destroy_texture(color1.texture);
                    return Err(err);
                }
            };

        log::debug!("Allocated G-buffer {}x{} ({:?})", width, height, formats);
        Ok(Self {
            color0,
            color1,
            depth,
            formats,
            size: (width, height),
            input_group,
            input_layout,
            sampler,
        })
    }

    fn allocate_target(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> BackendResult<GBufferTarget> {
        let texture =
            backend.create_texture(&TextureDescriptor::render_target(label, width, height, format))?;
        match backend.create_texture_view(texture, TextureViewDimension::D2) {
            Ok(view) => Ok(GBufferTarget { texture, view }),
            Err(err) => {
                backend.destroy_texture(texture);
                Err(err)
            }
        }
    }

    fn create_input_group(
        backend: &mut dyn GraphicsBackend,
        layout: BindGroupLayoutHandle,
        depth: TextureViewHandle,
        color0: &GBufferTarget,
        color1: &GBufferTarget,
        sampler: SamplerHandle,
    ) -> BackendResult<BindGroupHandle> {
        backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(depth)),
                (1, BindGroupEntry::Texture(color0.view)),
                (2, BindGroupEntry::Texture(color1.view)),
                (3, BindGroupEntry::Sampler(sampler)),
            ],
        )
    }

    /// Reallocate at a new size against a new camera depth view. On failure the
    /// current attachments stay in place.
    pub fn resize(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
        depth: TextureViewHandle,
    ) -> BackendResult<()> {
        let hdr = self.formats[0] == TextureFormat::Rgba16Float;
        let mut replacement = Self::allocate(
            backend,
            width,
            height,
            hdr,
            depth,
            self.input_layout,
            self.sampler,
        )?;
        std::mem::swap(self, &mut replacement);
        replacement.release(backend);
        Ok(())
    }

    /// Record the geometry pass header: both color attachments and depth are cleared.
    pub fn begin_geometry_pass(&self, backend: &mut dyn GraphicsBackend) {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("G-Buffer Geometry".to_string()),
            color_attachments: vec![
                ColorAttachment::clear(self.color0.view, GBUFFER_CLEAR),
                ColorAttachment::clear(self.color1.view, GBUFFER_CLEAR),
            ],
            depth_stencil_attachment: Some(DepthStencilAttachment::clear(self.depth)),
        });
    }

    pub fn color_views(&self) -> [TextureViewHandle; 2] {
        [self.color0.view, self.color1.view]
    }

    pub fn depth_view(&self) -> TextureViewHandle {
        self.depth
    }

    pub fn color_formats(&self) -> [TextureFormat; 2] {
        self.formats
    }

    /// Group sampling depth and both color attachments.
    pub fn input_group(&self) -> BindGroupHandle {
        self.input_group
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.input_group);
        backend.destroy_texture(self.color0.texture);
        backend.destroy_texture(self.color1.texture);
    }
}
