//! wgpu backend implementation
//!
//! Render pass commands are buffered between `begin_render_pass` and
//! `end_render_pass` and replayed into a single `wgpu::RenderPass`, because the
//! object-safe trait cannot hand out a pass that borrows the backend.

mod convert;

use crate::backend::traits::*;
use crate::backend::types::*;
use convert::{surface_format, ToWgpu};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use wgpu::util::DeviceExt;

enum RenderCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup(u32, BindGroupHandle),
    SetVertexBuffer(u32, BufferHandle, u64),
    SetIndexBuffer(BufferHandle, u64, IndexFormat),
    Draw(Range<u32>, Range<u32>),
    DrawIndexed(Range<u32>, i32, Range<u32>),
}

struct PendingPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<RenderCommand>,
}

struct Frame {
    output: wgpu::SurfaceTexture,
    view_id: u64,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

struct Texture {
    texture: wgpu::Texture,
    format: TextureFormat,
}

/// wgpu backend rendering into a window surface
pub struct WgpuBackend {
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    swapchain_format: TextureFormat,
    frame: Option<Frame>,
    pending: Option<PendingPass>,

    next_id: u64,
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, Texture>,
    /// View id to (view, owning texture id)
    views: HashMap<u64, (wgpu::TextureView, u64)>,
    samplers: HashMap<u64, wgpu::Sampler>,
    layouts: HashMap<u64, wgpu::BindGroupLayout>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    pipelines: HashMap<u64, wgpu::RenderPipeline>,
}

impl WgpuBackend {
    /// Create a backend for the given window, blocking on adapter and device requests.
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        // WGPU_BACKEND=vulkan,metal,... narrows the adapter search
        let backends = wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all());
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;
        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?} backend)", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Camera Pipeline Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let (wgpu_format, swapchain_format) = caps
            .formats
            .iter()
            .filter_map(|&f| surface_format(f).map(|ours| (f, ours)))
            .max_by_key(|(f, _)| f.is_srgb())
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed("Surface offers no usable color format".into())
            })?;

        let size = window.inner_size();
        let (width, height) =
            clamp_to_limits(device.limits().max_texture_dimension_2d, size.width, size.height);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu_format,
            width,
            height,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: Vec::new(),
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        log::debug!("Surface configured {}x{} {:?}", width, height, wgpu_format);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            surface_config,
            swapchain_format,
            frame: None,
            pending: None,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            samplers: HashMap::new(),
            layouts: HashMap::new(),
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
        })
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `f` inside an error scope and report what the device rejected.
    fn scoped<T>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(filter);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn record(&mut self, command: RenderCommand) {
        if let Some(pending) = self.pending.as_mut() {
            pending.commands.push(command);
        }
    }

    fn replay<'p>(&'p self, pass: &mut wgpu::RenderPass<'p>, commands: &[RenderCommand]) {
        for command in commands {
            match command {
                RenderCommand::SetPipeline(handle) => {
                    if let Some(pipeline) = self.pipelines.get(&handle.0) {
                        pass.set_pipeline(pipeline);
                    }
                }
                RenderCommand::SetBindGroup(index, handle) => {
                    if let Some(group) = self.bind_groups.get(&handle.0) {
                        pass.set_bind_group(*index, group, &[]);
                    }
                }
                RenderCommand::SetVertexBuffer(slot, handle, offset) => {
                    if let Some(buffer) = self.buffers.get(&handle.0) {
                        pass.set_vertex_buffer(*slot, buffer.slice(*offset..));
                    }
                }
                RenderCommand::SetIndexBuffer(handle, offset, format) => {
                    if let Some(buffer) = self.buffers.get(&handle.0) {
                        pass.set_index_buffer(buffer.slice(*offset..), format.to_wgpu());
                    }
                }
                RenderCommand::Draw(vertices, instances) => {
                    pass.draw(vertices.clone(), instances.clone());
                }
                RenderCommand::DrawIndexed(indices, base_vertex, instances) => {
                    pass.draw_indexed(indices.clone(), *base_vertex, instances.clone());
                }
            }
        }
    }
}

/// Scale down to the device limit, keeping the aspect ratio.
fn clamp_to_limits(max_size: u32, width: u32, height: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width.max(1), height.max(1));
    }
    let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (width, height) =
            clamp_to_limits(self.device.limits().max_texture_dimension_2d, width, height);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let output = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
            other => BackendError::AcquireImageFailed(other.to_string()),
        })?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        let view_id = self.allocate_id();
        self.frame = Some(Frame {
            output,
            view_id,
            view,
            encoder,
        });

        Ok(FrameContext {
            swapchain_view: TextureViewHandle(view_id),
            width: self.surface_config.width,
            height: self.surface_config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let Some(frame) = self.frame.take() {
            self.queue.submit(Some(frame.encoder.finish()));
            frame.output.present();
        }
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.swapchain_format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: desc.usage.to_wgpu(),
            mapped_at_creation: false,
        });
        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: desc.label.as_deref(),
                contents: data,
                usage: desc.usage.to_wgpu(),
            });
        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(target) = self.buffers.get(&buffer.0) {
            self.queue.write_buffer(target, offset, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let texture = self
            .scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: desc.label.as_deref(),
                    size: wgpu::Extent3d {
                        width: desc.width,
                        height: desc.height,
                        depth_or_array_layers: desc.layers.max(1),
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    // Cubemaps are 2D textures with six layers
                    dimension: wgpu::TextureDimension::D2,
                    format: desc.format.to_wgpu(),
                    usage: desc.usage.to_wgpu(),
                    view_formats: &[],
                })
            })
            .map_err(|error| {
                log::error!("Texture {:?} allocation failed: {}", desc.label, error);
                BackendError::OutOfMemory
            })?;

        let id = self.allocate_id();
        self.textures.insert(
            id,
            Texture {
                texture,
                format: desc.format,
            },
        );
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        let view = self
            .textures
            .get(&texture.0)
            .map(|t| {
                t.texture.create_view(&wgpu::TextureViewDescriptor {
                    dimension: Some(dimension.to_wgpu()),
                    ..Default::default()
                })
            })
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?;

        let id = self.allocate_id();
        self.views.insert(id, (view, texture.0));
        Ok(TextureViewHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        data: &[u8],
        width: u32,
        height: u32,
        layers: u32,
    ) {
        let Some(target) = self.textures.get(&texture.0) else {
            return;
        };
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * target.format.bytes_per_pixel()),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers.max(1),
            },
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let filter = desc.filter.to_wgpu();
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            ..Default::default()
        });
        let id = self.allocate_id();
        self.samplers.insert(id, sampler);
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.to_wgpu(),
                ty: entry.ty.to_wgpu(),
                count: None,
            })
            .collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            });
        let id = self.allocate_id();
        self.layouts.insert(id, layout);
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout = self
            .layouts
            .get(&layout.0)
            .ok_or_else(|| BackendError::PipelineCreationFailed("Layout not found".into()))?;

        let resolved: Option<Vec<wgpu::BindGroupEntry>> = entries
            .iter()
            .map(|(binding, entry)| {
                let resource = match entry {
                    BindGroupEntry::Buffer {
                        buffer,
                        offset,
                        size,
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: self.buffers.get(&buffer.0)?,
                        offset: *offset,
                        size: size.and_then(std::num::NonZeroU64::new),
                    }),
                    BindGroupEntry::Texture(view) => {
                        wgpu::BindingResource::TextureView(&self.views.get(&view.0)?.0)
                    }
                    BindGroupEntry::Sampler(sampler) => {
                        wgpu::BindingResource::Sampler(self.samplers.get(&sampler.0)?)
                    }
                };
                Some(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource,
                })
            })
            .collect();
        let resolved = resolved.ok_or_else(|| {
            BackendError::PipelineCreationFailed("Bind group references a destroyed resource".into())
        })?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &resolved,
        });
        let id = self.allocate_id();
        self.bind_groups.insert(id, bind_group);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let label = desc.label.as_deref().unwrap_or("pipeline");
        if desc.vertex_shader.trim().is_empty() {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{}: empty shader source",
                label
            )));
        }

        let shader = self
            .scoped(wgpu::ErrorFilter::Validation, |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: desc.label.as_deref(),
                    source: wgpu::ShaderSource::Wgsl(desc.vertex_shader.as_str().into()),
                })
            })
            .map_err(|e| BackendError::ShaderCreationFailed(format!("{}: {}", label, e)))?;

        let group_layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .filter_map(|handle| self.layouts.get(&handle.0))
            .collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });

        // wgpu layouts borrow their attribute slices
        let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format.to_wgpu(),
                        offset: a.offset,
                        shader_location: a.location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_layouts
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.to_wgpu(),
                    blend: None,
                    write_mask: target.write_mask.to_wgpu(),
                })
            })
            .collect();

        let pipeline = self
            .scoped(wgpu::ErrorFilter::Validation, |device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: desc.label.as_deref(),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: "vs_main",
                        buffers: &vertex_buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: desc.fragment_shader.as_ref().map(|_| wgpu::FragmentState {
                        module: &shader,
                        entry_point: "fs_main",
                        targets: &targets,
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        cull_mode: desc.cull_mode.to_wgpu(),
                        ..Default::default()
                    },
                    depth_stencil: desc.depth_stencil.as_ref().map(|ds| wgpu::DepthStencilState {
                        format: ds.format.to_wgpu(),
                        depth_write_enabled: ds.depth_write_enabled,
                        depth_compare: ds.depth_compare.to_wgpu(),
                        stencil: Default::default(),
                        bias: Default::default(),
                    }),
                    multisample: Default::default(),
                    multiview: None,
                })
            })
            .map_err(|e| BackendError::PipelineCreationFailed(format!("{}: {}", label, e)))?;

        let id = self.allocate_id();
        self.pipelines.insert(id, pipeline);
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.pending = Some(PendingPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(mut frame) = self.frame.take() else {
            log::warn!("Render pass {:?} recorded outside a frame", pending.descriptor.label);
            return;
        };

        {
            let desc = &pending.descriptor;
            let view_of = |handle: TextureViewHandle| {
                if handle.0 == frame.view_id {
                    Some(&frame.view)
                } else {
                    self.views.get(&handle.0).map(|(view, _)| view)
                }
            };
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = desc
                .color_attachments
                .iter()
                .map(|attachment| {
                    view_of(attachment.view).map(|view| wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: attachment.load_op.to_wgpu(),
                    })
                })
                .collect();
            let depth_stencil_attachment = desc.depth_stencil_attachment.as_ref().and_then(|depth| {
                view_of(depth.view).map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(depth.load_op.to_wgpu()),
                    stencil_ops: None,
                })
            });

            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: desc.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.replay(&mut pass, &pending.commands);
        }

        self.frame = Some(frame);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(RenderCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(RenderCommand::SetBindGroup(index, bind_group));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        self.record(RenderCommand::SetVertexBuffer(slot, buffer, offset));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        self.record(RenderCommand::SetIndexBuffer(buffer, offset, format));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(RenderCommand::Draw(vertices, instances));
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record(RenderCommand::DrawIndexed(indices, base_vertex, instances));
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.views.retain(|_, (_, owner)| *owner != texture.0);
        if let Some(entry) = self.textures.remove(&texture.0) {
            entry.texture.destroy();
        }
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::clamp_to_limits;

    #[test]
    fn oversized_surfaces_keep_their_aspect() {
        assert_eq!(clamp_to_limits(2048, 4096, 1024), (2048, 512));
        assert_eq!(clamp_to_limits(2048, 800, 600), (800, 600));
        assert_eq!(clamp_to_limits(2048, 0, 600), (1, 600));
    }
}
