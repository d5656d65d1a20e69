//! Core backend abstraction traits
//!
//! Every pass records through `&mut dyn GraphicsBackend`, so the camera pipeline runs
//! unchanged on the wgpu backend and on the headless recording backend.

use crate::backend::types::*;
use bitflags::bitflags;
use thiserror::Error;

/// Failures reported by a [`GraphicsBackend`]
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("no usable GPU adapter: {0}")]
    InitializationFailed(String),
    #[error("surface setup failed: {0}")]
    SurfaceCreationFailed(String),
    #[error("device request failed: {0}")]
    DeviceCreationFailed(String),
    #[error("could not acquire a swapchain image: {0}")]
    AcquireImageFailed(String),
    #[error("texture error: {0}")]
    TextureCreationFailed(String),
    #[error("pipeline error: {0}")]
    PipelineCreationFailed(String),
    #[error("shader error: {0}")]
    ShaderCreationFailed(String),
    #[error("swapchain surface lost")]
    SurfaceLost,
    #[error("GPU memory exhausted")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! backend_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub(crate) u64);
        )*
    };
}

backend_handle! {
    /// GPU buffer
    BufferHandle;
    TextureHandle;
    /// View over a texture; the swapchain image is one too
    TextureViewHandle;
    SamplerHandle;
    RenderPipelineHandle;
    BindGroupHandle;
    BindGroupLayoutHandle;
}

/// Bind group entry for creating bind groups
#[derive(Debug, Clone)]
pub enum BindGroupEntry {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        size: Option<u64>,
    },
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
}

/// Bind group layout entry
#[derive(Debug, Clone)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub ty: BindingType,
}

bitflags! {
    /// Shader stages that can access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// Binding type
#[derive(Debug, Clone)]
pub enum BindingType {
    UniformBuffer,
    Texture {
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
    },
    /// Filtering sampler
    Sampler,
}

impl BindingType {
    /// Filterable 2D float texture, the common case for fullscreen passes
    pub fn texture_2d() -> Self {
        BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
        }
    }

    pub fn texture_cube() -> Self {
        BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::Cube,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSampleType {
    Float { filterable: bool },
    Depth,
}

/// Render pipeline descriptor
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    /// WGSL module providing `vs_main` (and `fs_main` when a fragment stage is set)
    pub vertex_shader: String,
    pub fragment_shader: Option<String>,
    pub vertex_layouts: Vec<VertexBufferLayout>,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub cull_mode: CullMode,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_targets: Vec<ColorTargetState>,
}

impl RenderPipelineDescriptor {
    /// Fullscreen-triangle pipeline writing one color target without depth.
    pub fn fullscreen(
        label: &str,
        shader: &str,
        bind_group_layouts: Vec<BindGroupLayoutHandle>,
        format: TextureFormat,
    ) -> Self {
        Self {
            label: Some(label.to_string()),
            vertex_shader: shader.to_string(),
            fragment_shader: Some(shader.to_string()),
            vertex_layouts: Vec::new(),
            bind_group_layouts,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState {
                format,
                write_mask: ColorWrites::ALL,
            }],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
}

/// Opaque color target; nothing in the camera pipeline blends
#[derive(Debug, Clone)]
pub struct ColorTargetState {
    pub format: TextureFormat,
    pub write_mask: ColorWrites,
}

/// What an attachment holds when its pass begins. Results are always stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    Clear(V),
    Load,
}

#[derive(Debug, Clone)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp<[f32; 4]>,
}

impl ColorAttachment {
    pub fn load(view: TextureViewHandle) -> Self {
        Self {
            view,
            load_op: LoadOp::Load,
        }
    }

    pub fn clear(view: TextureViewHandle, color: [f32; 4]) -> Self {
        Self {
            view,
            load_op: LoadOp::Clear(color),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepthStencilAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp<f32>,
}

impl DepthStencilAttachment {
    pub fn load(view: TextureViewHandle) -> Self {
        Self {
            view,
            load_op: LoadOp::Load,
        }
    }

    /// Clear to the far plane.
    pub fn clear(view: TextureViewHandle) -> Self {
        Self {
            view,
            load_op: LoadOp::Clear(1.0),
        }
    }
}

/// Render pass descriptor
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

/// Frame context returned when beginning a frame
pub struct FrameContext {
    pub swapchain_view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

/// Device, swapchain and command recording used by every camera pass.
///
/// Resources are addressed by copyable handles. Commands issued between
/// `begin_render_pass` and `end_render_pass` belong to that pass; outside a pass
/// they are dropped.
pub trait GraphicsBackend {
    /// Reconfigure the swapchain. Zero-sized requests are ignored.
    fn resize(&mut self, width: u32, height: u32);

    /// Swapchain extent after clamping to device limits.
    fn surface_size(&self) -> (u32, u32);

    fn begin_frame(&mut self) -> BackendResult<FrameContext>;

    /// Submit recorded passes and present.
    fn end_frame(&mut self) -> BackendResult<()>;

    fn swapchain_format(&self) -> TextureFormat;

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    /// Queue a buffer upload. Writes issued during a frame all land before the
    /// frame's passes execute, in issue order.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle>;

    /// Upload tightly packed texel rows to every layer of a texture.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        data: &[u8],
        width: u32,
        height: u32,
        layers: u32,
    );

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    /// Fails when an entry refers to a destroyed resource.
    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle>;

    /// Compile the WGSL module and build the pipeline; shader errors surface as
    /// [`BackendError::ShaderCreationFailed`].
    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    fn end_render_pass(&mut self);

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64);

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat);

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>);

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    );

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroys the views created from the texture as well.
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle);
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}
