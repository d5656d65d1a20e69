//! Headless backend that records commands instead of talking to a GPU.
//!
//! Every call is logged at trace level and finished render passes are kept as
//! [`RecordedPass`] entries, so tests can check which targets a pass wrote and which
//! textures it sampled. Texel contents are simulated well enough to follow data
//! through the camera pipeline: load-op clears fill their attachments, and a
//! fullscreen draw (`0..3`) whose group 0 samples a 2D texture copies that texture
//! into color attachment 0. Other draws are recorded only. Buffer writes issued
//! inside a frame are held back until `end_frame`, the way a GPU queue applies them
//! before the frame's command buffer runs.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;

/// One finished render pass.
#[derive(Debug, Clone)]
pub struct RecordedPass {
    pub label: Option<String>,
    pub color_attachments: Vec<TextureViewHandle>,
    pub color_load_ops: Vec<LoadOp<[f32; 4]>>,
    pub depth_attachment: Option<TextureViewHandle>,
    pub depth_load_op: Option<LoadOp<f32>>,
    /// Texture views reachable through bind groups bound at draw time
    pub sampled_views: Vec<TextureViewHandle>,
    pub pipelines: Vec<RenderPipelineHandle>,
    pub draw_count: u32,
}

impl RecordedPass {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    pub fn writes(&self, view: TextureViewHandle) -> bool {
        self.color_attachments.contains(&view)
    }

    pub fn reads(&self, view: TextureViewHandle) -> bool {
        self.sampled_views.contains(&view)
    }
}

#[derive(Debug, Clone)]
enum PassCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    Draw { vertices: std::ops::Range<u32> },
    DrawIndexed,
}

struct PendingPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<PassCommand>,
}

struct RecordedTexture {
    width: u32,
    height: u32,
    layers: u32,
    format: TextureFormat,
    texels: Vec<[f32; 4]>,
}

struct RecordedView {
    texture: u64,
    dimension: TextureViewDimension,
}

/// Recording backend used by tests and headless tools.
pub struct RecordingBackend {
    surface_size: (u32, u32),
    swapchain_format: TextureFormat,
    swapchain: (TextureHandle, TextureViewHandle),
    frame_open: bool,
    frames_presented: u64,

    textures: HashMap<u64, RecordedTexture>,
    views: HashMap<u64, RecordedView>,
    buffers: HashMap<u64, Vec<u8>>,
    samplers: HashMap<u64, SamplerDescriptor>,
    layouts: HashMap<u64, usize>,
    bind_groups: HashMap<u64, Vec<(u32, BindGroupEntry)>>,
    pipelines: HashMap<u64, String>,

    // Handles of every kind share one counter so ids are unique across kinds
    next_id: u64,
    texture_budget: Option<usize>,
    /// Buffer writes issued inside a frame, applied at submit
    staged_writes: Vec<(u64, u64, Vec<u8>)>,

    pending: Option<PendingPass>,
    passes: Vec<RecordedPass>,
}

impl RecordingBackend {
    /// Create a backend whose swapchain has the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let mut backend = Self {
            surface_size: (width.max(1), height.max(1)),
            swapchain_format: TextureFormat::Bgra8UnormSrgb,
            swapchain: (TextureHandle(0), TextureViewHandle(0)),
            frame_open: false,
            frames_presented: 0,
            textures: HashMap::new(),
            views: HashMap::new(),
            buffers: HashMap::new(),
            samplers: HashMap::new(),
            layouts: HashMap::new(),
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
            next_id: 1,
            texture_budget: None,
            staged_writes: Vec::new(),
            pending: None,
            passes: Vec::new(),
        };
        backend.swapchain = backend.allocate_swapchain();
        backend
    }

    fn apply_write(&mut self, buffer: u64, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            let start = offset as usize;
            let end = start + data.len();
            if contents.len() < end {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        }
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn allocate_swapchain(&mut self) -> (TextureHandle, TextureViewHandle) {
        let (width, height) = self.surface_size;
        let texture = self.next_handle();
        self.textures.insert(
            texture,
            RecordedTexture {
                width,
                height,
                layers: 1,
                format: self.swapchain_format,
                texels: vec![[0.0; 4]; (width * height) as usize],
            },
        );
        let view = self.next_handle();
        self.views.insert(
            view,
            RecordedView {
                texture,
                dimension: TextureViewDimension::D2,
            },
        );
        (TextureHandle(texture), TextureViewHandle(view))
    }

    /// Make texture creation fail with `OutOfMemory` once `count` more textures exist.
    pub fn fail_texture_allocations_after(&mut self, count: usize) {
        self.texture_budget = Some(count);
    }

    /// Render passes finished since creation or the last [`Self::clear_passes`].
    pub fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    pub fn clear_passes(&mut self) {
        self.passes.clear();
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// The swapchain view handed out by `begin_frame`.
    pub fn swapchain_view(&self) -> TextureViewHandle {
        self.swapchain.1
    }

    pub fn is_live_texture(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture.0)
    }

    pub fn is_live_view(&self, view: TextureViewHandle) -> bool {
        self.views.contains_key(&view.0)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn view_size(&self, view: TextureViewHandle) -> Option<(u32, u32)> {
        let texture = self.textures.get(&self.views.get(&view.0)?.texture)?;
        Some((texture.width, texture.height))
    }

    pub fn view_dimension(&self, view: TextureViewHandle) -> Option<TextureViewDimension> {
        self.views.get(&view.0).map(|v| v.dimension)
    }

    pub fn pipeline_label(&self, pipeline: RenderPipelineHandle) -> Option<&str> {
        self.pipelines.get(&pipeline.0).map(String::as_str)
    }

    /// Buffer bytes as of the last submitted frame.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    /// Texture views a bind group references.
    pub fn bind_group_views(&self, bind_group: BindGroupHandle) -> Vec<TextureViewHandle> {
        self.bind_groups
            .get(&bind_group.0)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(_, entry)| match entry {
                        BindGroupEntry::Texture(view) => Some(*view),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Simulated texels of the texture behind `view`, all layers in order.
    pub fn read_texels(&self, view: TextureViewHandle) -> Option<Vec<[f32; 4]>> {
        let texture = self.views.get(&view.0)?.texture;
        self.textures.get(&texture).map(|t| t.texels.clone())
    }

    /// Overwrite every texel of the texture behind `view`.
    pub fn fill_view(&mut self, view: TextureViewHandle, color: [f32; 4]) {
        if let Some(texture) = self.views.get(&view.0).map(|v| v.texture) {
            self.fill_texture(texture, color);
        }
    }

    fn fill_texture(&mut self, texture: u64, color: [f32; 4]) {
        if let Some(texture) = self.textures.get_mut(&texture) {
            texture.texels.iter_mut().for_each(|t| *t = color);
        }
    }

    fn view_texture(&self, view: TextureViewHandle) -> Option<u64> {
        self.views.get(&view.0).map(|v| v.texture)
    }

    /// Nearest-neighbour copy from the first layer of `source` into `target`.
    fn blit(&mut self, source: u64, target: u64) {
        let Some(src) = self.textures.get(&source) else {
            return;
        };
        if src.format.is_depth() {
            return;
        }
        let (src_width, src_height) = (src.width, src.height);
        let src_texels = src.texels[..(src_width * src_height) as usize].to_vec();
        let Some(dst) = self.textures.get_mut(&target) else {
            return;
        };
        for y in 0..dst.height {
            let sy = (y * src_height / dst.height).min(src_height - 1);
            for x in 0..dst.width {
                let sx = (x * src_width / dst.width).min(src_width - 1);
                dst.texels[(y * dst.width + x) as usize] = src_texels[(sy * src_width + sx) as usize];
            }
        }
    }

    fn decode_texels(format: TextureFormat, data: &[u8]) -> Option<Vec<[f32; 4]>> {
        match format {
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => Some(
                data.chunks_exact(4)
                    .map(|p| [p[0], p[1], p[2], p[3]].map(|c| c as f32 / 255.0))
                    .collect(),
            ),
            TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => Some(
                data.chunks_exact(4)
                    .map(|p| [p[2], p[1], p[0], p[3]].map(|c| c as f32 / 255.0))
                    .collect(),
            ),
            TextureFormat::Rgba32Float => Some(
                data.chunks_exact(16)
                    .map(|p| bytemuck::pod_read_unaligned::<[f32; 4]>(p))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl GraphicsBackend for RecordingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        log::trace!("RecordingBackend: resize {}x{}", width, height);
        self.surface_size = (width, height);
        let (old_texture, _) = self.swapchain;
        self.destroy_texture(old_texture);
        self.swapchain = self.allocate_swapchain();
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if self.frame_open {
            return Err(BackendError::AcquireImageFailed(
                "previous frame was not ended".into(),
            ));
        }
        self.frame_open = true;
        log::trace!("RecordingBackend: begin frame {}", self.frames_presented);
        Ok(FrameContext {
            swapchain_view: self.swapchain.1,
            width: self.surface_size.0,
            height: self.surface_size.1,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        for (buffer, offset, data) in std::mem::take(&mut self.staged_writes) {
            self.apply_write(buffer, offset, &data);
        }
        self.frame_open = false;
        self.frames_presented += 1;
        log::trace!("RecordingBackend: end frame");
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.swapchain_format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!("RecordingBackend: creating buffer {:?} (size: {})", desc.label, desc.size);
        let id = self.next_handle();
        self.buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self.create_buffer(desc)?;
        self.apply_write(buffer.0, 0, data);
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if self.frame_open {
            self.staged_writes.push((buffer.0, offset, data.to_vec()));
        } else {
            self.apply_write(buffer.0, offset, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "RecordingBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.layers
        );
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has a zero extent",
                desc.label
            )));
        }
        if let Some(budget) = self.texture_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::OutOfMemory);
            }
            *budget -= 1;
        }
        let layers = desc.layers.max(1);
        let clear = if desc.format.is_depth() {
            [1.0, 0.0, 0.0, 1.0]
        } else {
            [0.0; 4]
        };
        let id = self.next_handle();
        self.textures.insert(
            id,
            RecordedTexture {
                width: desc.width,
                height: desc.height,
                layers,
                format: desc.format,
                texels: vec![clear; (desc.width * desc.height * layers) as usize],
            },
        );
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        let layers = self
            .textures
            .get(&texture.0)
            .map(|t| t.layers)
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?;
        if dimension == TextureViewDimension::Cube && layers != 6 {
            return Err(BackendError::TextureCreationFailed(format!(
                "cube view over {} layers",
                layers
            )));
        }
        let id = self.next_handle();
        self.views.insert(
            id,
            RecordedView {
                texture: texture.0,
                dimension,
            },
        );
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
        let Some(target) = self.textures.get_mut(&texture.0) else {
            return;
        };
        let Some(texels) = Self::decode_texels(target.format, data) else {
            log::trace!(
                "RecordingBackend: texel upload for {:?} is not simulated",
                target.format
            );
            return;
        };
        let count = (width * height * layers.max(1)) as usize;
        for (dst, src) in target.texels.iter_mut().zip(texels.into_iter().take(count)) {
            *dst = src;
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("RecordingBackend: creating sampler {:?}", desc.label);
        let id = self.next_handle();
        self.samplers.insert(id, desc.clone());
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let id = self.next_handle();
        self.layouts.insert(id, entries.len());
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let expected = *self
            .layouts
            .get(&layout.0)
            .ok_or_else(|| BackendError::PipelineCreationFailed("Layout not found".into()))?;
        if expected != entries.len() {
            return Err(BackendError::PipelineCreationFailed(format!(
                "layout expects {} entries, got {}",
                expected,
                entries.len()
            )));
        }
        let all_live = entries.iter().all(|(_, entry)| match entry {
            BindGroupEntry::Buffer { buffer, .. } => self.buffers.contains_key(&buffer.0),
            BindGroupEntry::Texture(view) => self.views.contains_key(&view.0),
            BindGroupEntry::Sampler(sampler) => self.samplers.contains_key(&sampler.0),
        });
        if !all_live {
            return Err(BackendError::PipelineCreationFailed(
                "Bind group references a destroyed resource".into(),
            ));
        }
        let id = self.next_handle();
        self.bind_groups.insert(id, entries.to_vec());
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let label = desc.label.clone().unwrap_or_else(|| "pipeline".to_string());
        log::trace!("RecordingBackend: creating render pipeline {}", label);
        if !desc.vertex_shader.contains("vs_main") {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{}: no vs_main entry point",
                label
            )));
        }
        if desc
            .fragment_shader
            .as_ref()
            .is_some_and(|source| !source.contains("fs_main"))
        {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{}: no fs_main entry point",
                label
            )));
        }
        let id = self.next_handle();
        self.pipelines.insert(id, label);
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        log::trace!("RecordingBackend: begin render pass {:?}", desc.label);
        if let Some(unfinished) = self.pending.take() {
            log::error!(
                "RecordingBackend: pass {:?} was never ended",
                unfinished.descriptor.label
            );
        }
        self.pending = Some(PendingPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let desc = pending.descriptor;

        for attachment in &desc.color_attachments {
            if let (LoadOp::Clear(color), Some(texture)) =
                (&attachment.load_op, self.view_texture(attachment.view))
            {
                self.fill_texture(texture, *color);
            }
        }
        if let Some(depth) = &desc.depth_stencil_attachment {
            if let (LoadOp::Clear(value), Some(texture)) =
                (depth.load_op, self.view_texture(depth.view))
            {
                self.fill_texture(texture, [value, 0.0, 0.0, 1.0]);
            }
        }

        let mut record = RecordedPass {
            label: desc.label.clone(),
            color_attachments: desc.color_attachments.iter().map(|a| a.view).collect(),
            color_load_ops: desc.color_attachments.iter().map(|a| a.load_op).collect(),
            depth_attachment: desc.depth_stencil_attachment.as_ref().map(|d| d.view),
            depth_load_op: desc.depth_stencil_attachment.as_ref().map(|d| d.load_op),
            sampled_views: Vec::new(),
            pipelines: Vec::new(),
            draw_count: 0,
        };

        let mut bound: HashMap<u32, BindGroupHandle> = HashMap::new();
        for command in &pending.commands {
            match command {
                PassCommand::SetPipeline(pipeline) => record.pipelines.push(*pipeline),
                PassCommand::SetBindGroup { index, bind_group } => {
                    bound.insert(*index, *bind_group);
                }
                PassCommand::Draw { .. } | PassCommand::DrawIndexed => {
                    record.draw_count += 1;
                    for group in bound.values() {
                        for view in self.bind_group_views(*group) {
                            if !record.sampled_views.contains(&view) {
                                record.sampled_views.push(view);
                            }
                        }
                    }
                }
            }

            if let PassCommand::Draw { vertices } = command {
                if *vertices != (0..3) {
                    continue;
                }
                let source = bound
                    .get(&0)
                    .and_then(|group| self.bind_group_views(*group).into_iter().find(|view| {
                        self.view_dimension(*view) == Some(TextureViewDimension::D2)
                    }))
                    .and_then(|view| self.view_texture(view));
                let target = record
                    .color_attachments
                    .first()
                    .and_then(|view| self.view_texture(*view));
                if let (Some(source), Some(target)) = (source, target) {
                    self.blit(source, target);
                }
            }
        }

        log::trace!(
            "RecordingBackend: end render pass {:?} ({} draws)",
            record.label,
            record.draw_count
        );
        self.passes.push(record);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        log::trace!("RecordingBackend: set pipeline {:?}", pipeline);
        if let Some(pending) = self.pending.as_mut() {
            pending.commands.push(PassCommand::SetPipeline(pipeline));
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        log::trace!("RecordingBackend: set bind group {} = {:?}", index, bind_group);
        if let Some(pending) = self.pending.as_mut() {
            pending
                .commands
                .push(PassCommand::SetBindGroup { index, bind_group });
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        log::trace!("RecordingBackend: set vertex buffer {} = {:?}", slot, buffer);
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, _format: IndexFormat) {
        log::trace!("RecordingBackend: set index buffer {:?}", buffer);
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        log::trace!("RecordingBackend: draw {:?} x {:?}", vertices, instances);
        if let Some(pending) = self.pending.as_mut() {
            pending.commands.push(PassCommand::Draw { vertices });
        }
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        log::trace!("RecordingBackend: draw indexed {:?} x {:?}", indices, instances);
        if let Some(pending) = self.pending.as_mut() {
            pending.commands.push(PassCommand::DrawIndexed);
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        log::trace!("RecordingBackend: destroying texture {:?}", texture);
        self.views.retain(|_, view| view.texture != texture.0);
        self.textures.remove(&texture.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(backend: &mut RecordingBackend, width: u32, height: u32) -> TextureViewHandle {
        let texture = backend
            .create_texture(&TextureDescriptor::render_target(
                "target",
                width,
                height,
                TextureFormat::Rgba8Unorm,
            ))
            .unwrap();
        backend
            .create_texture_view(texture, TextureViewDimension::D2)
            .unwrap()
    }

    #[test]
    fn clear_load_op_fills_attachment() {
        let mut backend = RecordingBackend::new(4, 4);
        let view = target(&mut backend, 4, 4);

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("clear".into()),
            color_attachments: vec![ColorAttachment::clear(view, [0.25, 0.5, 0.75, 1.0])],
            depth_stencil_attachment: None,
        });
        backend.end_render_pass();

        let texels = backend.read_texels(view).unwrap();
        assert!(texels.iter().all(|t| *t == [0.25, 0.5, 0.75, 1.0]));
        assert_eq!(backend.passes().len(), 1);
        assert_eq!(backend.passes()[0].label(), "clear");
    }

    #[test]
    fn fullscreen_draw_copies_sampled_texture() {
        let mut backend = RecordingBackend::new(4, 4);
        let source = target(&mut backend, 2, 2);
        let dest = target(&mut backend, 4, 4);
        backend.fill_view(source, [1.0, 0.0, 0.0, 1.0]);

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
        let group = backend
            .create_bind_group(
                layout,
                &[
                    (0, BindGroupEntry::Texture(source)),
                    (1, BindGroupEntry::Sampler(sampler)),
                ],
            )
            .unwrap();

        backend.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: vec![ColorAttachment::load(dest)],
            depth_stencil_attachment: None,
        });
        backend.set_bind_group(0, group);
        backend.draw(0..3, 0..1);
        backend.end_render_pass();

        assert!(backend.read_texels(dest).unwrap().iter().all(|t| *t == [1.0, 0.0, 0.0, 1.0]));
        let pass = &backend.passes()[0];
        assert!(pass.reads(source));
        assert!(pass.writes(dest));
        assert_eq!(pass.draw_count, 1);
    }

    #[test]
    fn writes_inside_a_frame_land_at_submit() {
        let mut backend = RecordingBackend::new(4, 4);
        let buffer = backend
            .create_buffer_init(
                &BufferDescriptor::new("params", 4, BufferUsage::UNIFORM | BufferUsage::COPY_DST),
                &[1; 4],
            )
            .unwrap();

        backend.begin_frame().unwrap();
        backend.write_buffer(buffer, 0, &[2; 4]);
        backend.write_buffer(buffer, 0, &[3; 4]);
        assert_eq!(backend.buffer_contents(buffer), Some(&[1u8; 4][..]));
        backend.end_frame().unwrap();

        // only the last write of the frame is ever visible
        assert_eq!(backend.buffer_contents(buffer), Some(&[3u8; 4][..]));
        backend.write_buffer(buffer, 0, &[4; 4]);
        assert_eq!(backend.buffer_contents(buffer), Some(&[4u8; 4][..]));
    }

    #[test]
    fn texture_budget_reports_out_of_memory() {
        let mut backend = RecordingBackend::new(4, 4);
        backend.fail_texture_allocations_after(1);
        let desc = TextureDescriptor::render_target("t", 4, 4, TextureFormat::Rgba8Unorm);

        assert!(backend.create_texture(&desc).is_ok());
        assert!(matches!(
            backend.create_texture(&desc),
            Err(BackendError::OutOfMemory)
        ));
    }

    #[test]
    fn destroying_texture_drops_its_views() {
        let mut backend = RecordingBackend::new(4, 4);
        let texture = backend
            .create_texture(&TextureDescriptor::render_target("t", 4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        let view = backend
            .create_texture_view(texture, TextureViewDimension::D2)
            .unwrap();

        backend.destroy_texture(texture);

        assert!(!backend.is_live_texture(texture));
        assert!(!backend.is_live_view(view));
    }

    #[test]
    fn pipeline_without_entry_point_is_rejected() {
        let mut backend = RecordingBackend::new(4, 4);
        let desc = RenderPipelineDescriptor::fullscreen("broken", "", Vec::new(), TextureFormat::Rgba8Unorm);
        assert!(matches!(
            backend.create_render_pipeline(&desc),
            Err(BackendError::ShaderCreationFailed(_))
        ));
    }

    #[test]
    fn resize_replaces_swapchain() {
        let mut backend = RecordingBackend::new(4, 4);
        let before = backend.swapchain_view();
        backend.resize(8, 2);
        assert_ne!(backend.swapchain_view(), before);
        assert_eq!(backend.view_size(backend.swapchain_view()), Some((8, 2)));
        assert_eq!(backend.surface_size(), (8, 2));
    }
}
