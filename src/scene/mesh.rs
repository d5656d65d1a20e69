//! Mesh geometry and the mesh drawable

use crate::backend::{
    BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindGroupLayoutHandle,
    BindingType, BufferDescriptor, BufferHandle, BufferUsage, ColorTargetState, ColorWrites,
    CompareFunction, CullMode, DepthStencilState, GraphicsBackend, IndexFormat, ObjectUniform,
    RenderPipelineDescriptor, RenderPipelineHandle, ShaderStageFlags, TextureFormat, Vertex,
};
use crate::camera::{RenderPath, TargetFormats};
use crate::pipeline::shaders;
use crate::scene::{DrawContext, Drawable, Transform};
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Indexed triangle list in CPU memory
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Append a quad spanned by `right` and `up` around `center`, wound counter-clockwise.
    fn push_quad(&mut self, center: Vec3, right: Vec3, up: Vec3, normal: Vec3) {
        let base = self.vertices.len() as u32;
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        self.vertices.extend(corners.map(|(u, v)| Vertex {
            position: center + right * u + up * v,
            normal,
            uv: Vec2::new(u + 1.0, 1.0 - v) * 0.5,
        }));
        self.indices
            .extend([0, 1, 2, 0, 2, 3].map(|offset| base + offset));
    }

    /// Unit cube centered at the origin, four vertices per face
    pub fn cube() -> Self {
        let mut mesh = Mesh {
            name: "cube".to_string(),
            ..Default::default()
        };
        for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            let up = if normal.y == 0.0 { Vec3::Y } else { Vec3::NEG_Z * normal.y };
            let right = up.cross(normal);
            mesh.push_quad(normal * 0.5, right * 0.5, up * 0.5, normal);
        }
        mesh
    }

    /// Y-up grid of `cells` x `cells` quads on the XZ plane
    pub fn plane(width: f32, depth: f32, cells: u32) -> Self {
        let cells = cells.max(1);
        let row = cells + 1;
        let extent = Vec2::new(width, depth);

        let vertices = (0..row * row)
            .map(|i| {
                let uv = Vec2::new((i % row) as f32, (i / row) as f32) / cells as f32;
                let offset = (uv - Vec2::splat(0.5)) * extent;
                Vertex {
                    position: Vec3::new(offset.x, 0.0, offset.y),
                    normal: Vec3::Y,
                    uv,
                }
            })
            .collect();
        let indices = (0..cells * cells)
            .flat_map(|cell| {
                let a = (cell / cells) * row + cell % cells;
                let b = a + row;
                [a, b, a + 1, a + 1, b, b + 1]
            })
            .collect();

        Mesh {
            name: "plane".to_string(),
            vertices,
            indices,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MaterialUniform {
    base_color: Vec4,
}

/// Pipelines shared by every mesh drawn through one camera.
#[derive(Debug, Clone, Copy)]
pub struct MeshPipelines {
    object_layout: BindGroupLayoutHandle,
    material_layout: BindGroupLayoutHandle,
    forward: RenderPipelineHandle,
    /// Present when the camera has a G-buffer
    gbuffer: Option<RenderPipelineHandle>,
}

impl MeshPipelines {
    /// Build pipelines matching a camera's layouts and target formats.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        camera_layout: BindGroupLayoutHandle,
        object_layout: BindGroupLayoutHandle,
        formats: TargetFormats,
    ) -> BackendResult<Self> {
        let material_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::UniformBuffer,
        }])?;
        let layouts = vec![camera_layout, object_layout, material_layout];

        let forward_source = shaders::with_camera(&[shaders::MESH_BODY, shaders::MESH_FORWARD_FRAGMENT]);
        let forward = backend.create_render_pipeline(&Self::describe(
            "Mesh Forward",
            &forward_source,
            layouts.clone(),
            &[formats.color],
            formats.depth,
        ))?;

        let gbuffer = match formats.gbuffer {
            Some(gbuffer_formats) => {
                let source =
                    shaders::with_camera(&[shaders::MESH_BODY, shaders::MESH_GBUFFER_FRAGMENT]);
                Some(backend.create_render_pipeline(&Self::describe(
                    "Mesh G-Buffer",
                    &source,
                    layouts,
                    &gbuffer_formats,
                    formats.depth,
                ))?)
            }
            None => None,
        };

        Ok(Self {
            object_layout,
            material_layout,
            forward,
            gbuffer,
        })
    }

    fn describe(
        label: &str,
        source: &str,
        bind_group_layouts: Vec<BindGroupLayoutHandle>,
        color_formats: &[TextureFormat],
        depth_format: TextureFormat,
    ) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            label: Some(label.to_string()),
            vertex_shader: source.to_string(),
            fragment_shader: Some(source.to_string()),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: color_formats
                .iter()
                .map(|&format| ColorTargetState {
                    format,
                    write_mask: ColorWrites::ALL,
                })
                .collect(),
        }
    }
}

struct UniformGroup {
    buffer: BufferHandle,
    group: BindGroupHandle,
}

impl UniformGroup {
    fn new<T: Pod>(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        layout: BindGroupLayoutHandle,
        data: &T,
    ) -> BackendResult<Self> {
        let buffer = backend.create_buffer_init(
            &BufferDescriptor::uniform::<T>(label),
            bytemuck::bytes_of(data),
        )?;
        let group = backend.create_bind_group(
            layout,
            &[(
                0,
                BindGroupEntry::Buffer {
                    buffer,
                    offset: 0,
                    size: None,
                },
            )],
        )?;
        Ok(Self { buffer, group })
    }

    fn release(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.group);
        backend.destroy_buffer(self.buffer);
    }
}

/// A mesh instance with a transform and a flat material color.
///
/// Writes G-buffer attributes on the deferred path when its pipelines have a
/// G-buffer variant, and shades directly otherwise.
pub struct MeshDrawable {
    label: String,
    pipelines: MeshPipelines,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    object: UniformGroup,
    material: UniformGroup,
}

impl MeshDrawable {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        mesh: &Mesh,
        pipelines: MeshPipelines,
        transform: &Transform,
        base_color: Vec4,
    ) -> BackendResult<Self> {
        let vertex_data = mesh.vertex_bytes();
        let index_data = mesh.index_bytes();

        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor::new(
                &format!("{} Vertices", mesh.name),
                vertex_data.len() as u64,
                BufferUsage::VERTEX,
            ),
            vertex_data,
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor::new(
                &format!("{} Indices", mesh.name),
                index_data.len() as u64,
                BufferUsage::INDEX,
            ),
            index_data,
        )?;
        let object = UniformGroup::new(
            backend,
            "Mesh Object",
            pipelines.object_layout,
            &transform.object_uniform(),
        )?;
        let material = UniformGroup::new(
            backend,
            "Mesh Material",
            pipelines.material_layout,
            &MaterialUniform { base_color },
        )?;

        Ok(Self {
            label: mesh.name.clone(),
            pipelines,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            object,
            material,
        })
    }

    pub fn set_transform(&self, backend: &mut dyn GraphicsBackend, transform: &Transform) {
        let uniform: ObjectUniform = transform.object_uniform();
        backend.write_buffer(self.object.buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn release(&self, backend: &mut dyn GraphicsBackend) {
        self.object.release(backend);
        self.material.release(backend);
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

impl Drawable for MeshDrawable {
    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let shader_override = ctx.shader_override();
        let pipeline = match (shader_override, ctx.active_render_path()) {
            (Some(pipeline), _) => pipeline,
            (None, RenderPath::Deferred) => match self.pipelines.gbuffer {
                Some(pipeline) => pipeline,
                None => {
                    log::error!("{} drawn in the deferred pass without a G-buffer pipeline", self.label);
                    return;
                }
            },
            (None, RenderPath::Forward) => self.pipelines.forward,
        };
        let camera_group = ctx.camera_bind_group();

        let backend = ctx.backend();
        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, camera_group);
        backend.set_bind_group(1, self.object.group);
        // override pipelines only know the camera and object groups
        if shader_override.is_none() {
            backend.set_bind_group(2, self.material.group);
        }
        backend.set_vertex_buffer(0, self.vertex_buffer, 0);
        backend.set_index_buffer(self.index_buffer, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..self.index_count, 0, 0..1);
    }

    fn supports_deferred_pass(&self) -> bool {
        self.pipelines.gbuffer.is_some()
    }

    fn label(&self) -> &str {
        &self.label
    }
}
