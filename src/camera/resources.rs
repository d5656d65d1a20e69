//! Bind group layouts, uniform buffers and environment bindings owned by a camera

use crate::backend::{
    BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindGroupLayoutHandle,
    BindingType, BufferDescriptor, BufferHandle, CameraUniform, DeferredUniform, GraphicsBackend,
    SamplerDescriptor, SamplerHandle, ShaderStageFlags, SkyboxUniform,
};
use crate::camera::gbuffer;
use crate::camera::view::ViewState;
use crate::scene::{CubeMap, Skybox};
use glam::{Mat4, Vec2};

/// Shader routine of the ambient resolve inside the deferred stage
pub const DEFERRED_MODE_AMBIENT: u32 = 0;

/// Bind group layouts the camera passes, effects and drawables share
#[derive(Debug, Clone, Copy)]
pub struct CameraLayouts {
    /// `texture_2d` + sampler, group 0 of every fullscreen pass
    pub sample: BindGroupLayoutHandle,
    /// Camera uniform block, group 0 of drawables
    pub camera: BindGroupLayoutHandle,
    /// Object uniform block, group 1 of drawables
    pub object: BindGroupLayoutHandle,
    pub gbuffer: BindGroupLayoutHandle,
    pub environment: BindGroupLayoutHandle,
    pub deferred_params: BindGroupLayoutHandle,
    pub skybox_texture: BindGroupLayoutHandle,
    pub skybox_params: BindGroupLayoutHandle,
}

fn uniform_layout(
    backend: &mut dyn GraphicsBackend,
    visibility: ShaderStageFlags,
) -> BackendResult<BindGroupLayoutHandle> {
    backend.create_bind_group_layout(&[BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: BindingType::UniformBuffer,
    }])
}

fn sampler_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStageFlags::FRAGMENT,
        ty: BindingType::Sampler,
    }
}

impl CameraLayouts {
    pub fn new(backend: &mut dyn GraphicsBackend) -> BackendResult<Self> {
        let sample = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::texture_2d(),
            },
            sampler_entry(1),
        ])?;
        let environment = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::texture_cube(),
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::texture_cube(),
            },
            sampler_entry(2),
        ])?;
        let skybox_texture = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::texture_cube(),
            },
            sampler_entry(1),
        ])?;

        Ok(Self {
            sample,
            camera: uniform_layout(backend, ShaderStageFlags::VERTEX_FRAGMENT)?,
            object: uniform_layout(backend, ShaderStageFlags::VERTEX_FRAGMENT)?,
            gbuffer: gbuffer::input_layout(backend)?,
            environment,
            deferred_params: uniform_layout(backend, ShaderStageFlags::FRAGMENT)?,
            skybox_texture,
            skybox_params: uniform_layout(backend, ShaderStageFlags::FRAGMENT)?,
        })
    }
}

/// A uniform buffer and the group binding it
#[derive(Debug, Clone, Copy)]
struct UniformBinding {
    buffer: BufferHandle,
    group: BindGroupHandle,
}

impl UniformBinding {
    fn new<T: bytemuck::Pod>(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<Self> {
        let buffer = backend.create_buffer(&BufferDescriptor::uniform::<T>(label))?;
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

    fn write<T: bytemuck::Pod>(&self, backend: &mut dyn GraphicsBackend, data: &T) {
        backend.write_buffer(self.buffer, 0, bytemuck::bytes_of(data));
    }

    fn release(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.group);
        backend.destroy_buffer(self.buffer);
    }
}

/// Groups built from the scene skybox, or from a placeholder when there is none
#[derive(Debug, Clone, Copy)]
struct EnvironmentBindings {
    source: Option<Skybox>,
    deferred_group: BindGroupHandle,
    skybox_group: BindGroupHandle,
}

pub struct CameraResources {
    pub layouts: CameraLayouts,
    pub sampler: SamplerHandle,
    camera: UniformBinding,
    skybox_params: UniformBinding,
    deferred_params: UniformBinding,
    placeholder: CubeMap,
    environment: EnvironmentBindings,
}

impl CameraResources {
    pub fn new(backend: &mut dyn GraphicsBackend) -> BackendResult<Self> {
        let layouts = CameraLayouts::new(backend)?;
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Camera Sampler".to_string()),
            ..Default::default()
        })?;
        let camera = UniformBinding::new::<CameraUniform>(backend, "Camera Uniforms", layouts.camera)?;
        let skybox_params =
            UniformBinding::new::<SkyboxUniform>(backend, "Skybox Uniforms", layouts.skybox_params)?;
        let deferred_params = UniformBinding::new::<DeferredUniform>(
            backend,
            "Deferred Uniforms",
            layouts.deferred_params,
        )?;
        let placeholder = CubeMap::solid(backend, "Environment Placeholder", 1, [0, 0, 0, 255])?;
        let environment = Self::build_environment(backend, &layouts, sampler, placeholder, None)?;

        Ok(Self {
            layouts,
            sampler,
            camera,
            skybox_params,
            deferred_params,
            placeholder,
            environment,
        })
    }

    fn build_environment(
        backend: &mut dyn GraphicsBackend,
        layouts: &CameraLayouts,
        sampler: SamplerHandle,
        placeholder: CubeMap,
        skybox: Option<Skybox>,
    ) -> BackendResult<EnvironmentBindings> {
        let (specular, irradiance) = match &skybox {
            Some(skybox) => (skybox.specular.view, skybox.irradiance.view),
            None => (placeholder.view, placeholder.view),
        };
        let deferred_group = backend.create_bind_group(
            layouts.environment,
            &[
                (0, BindGroupEntry::Texture(specular)),
                (1, BindGroupEntry::Texture(irradiance)),
                (2, BindGroupEntry::Sampler(sampler)),
            ],
        )?;
        let skybox_group = backend.create_bind_group(
            layouts.skybox_texture,
            &[
                (0, BindGroupEntry::Texture(specular)),
                (1, BindGroupEntry::Sampler(sampler)),
            ],
        )?;
        Ok(EnvironmentBindings {
            source: skybox,
            deferred_group,
            skybox_group,
        })
    }

    /// Rebuild the environment groups if the scene skybox changed.
    pub fn refresh_environment(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        skybox: Option<&Skybox>,
    ) -> BackendResult<()> {
        let skybox = skybox.copied();
        if self.environment.source == skybox {
            return Ok(());
        }
        let bindings =
            Self::build_environment(backend, &self.layouts, self.sampler, self.placeholder, skybox)?;
        let old = std::mem::replace(&mut self.environment, bindings);
        backend.destroy_bind_group(old.deferred_group);
        backend.destroy_bind_group(old.skybox_group);
        log::debug!(
            "Camera environment bindings rebuilt (skybox: {})",
            skybox.is_some()
        );
        Ok(())
    }

    /// Upload the per-frame uniform blocks.
    pub fn write_frame(
        &self,
        backend: &mut dyn GraphicsBackend,
        view: &ViewState,
        gbuffer_size: Option<(u32, u32)>,
    ) {
        self.camera.write(backend, &view.camera_uniform());
        self.skybox_params.write(backend, &view.skybox_uniform());

        if let Some((width, height)) = gbuffer_size {
            let params = DeferredUniform {
                model: Mat4::IDENTITY,
                view: Mat4::IDENTITY,
                projection: Mat4::IDENTITY,
                camera_position: view.position().extend(1.0),
                dimensions: Vec2::new(width as f32, height as f32),
                mode: DEFERRED_MODE_AMBIENT,
                has_environment: self.environment.source.is_some() as u32,
            };
            self.deferred_params.write(backend, &params);
        }
    }

    pub fn camera_group(&self) -> BindGroupHandle {
        self.camera.group
    }

    pub fn camera_buffer(&self) -> BufferHandle {
        self.camera.buffer
    }

    pub fn skybox_params_group(&self) -> BindGroupHandle {
        self.skybox_params.group
    }

    pub fn deferred_params_group(&self) -> BindGroupHandle {
        self.deferred_params.group
    }

    pub fn deferred_params_buffer(&self) -> BufferHandle {
        self.deferred_params.buffer
    }

    pub fn environment_group(&self) -> BindGroupHandle {
        self.environment.deferred_group
    }

    pub fn skybox_texture_group(&self) -> BindGroupHandle {
        self.environment.skybox_group
    }

    pub fn has_environment(&self) -> bool {
        self.environment.source.is_some()
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.environment.deferred_group);
        backend.destroy_bind_group(self.environment.skybox_group);
        self.camera.release(backend);
        self.skybox_params.release(backend);
        self.deferred_params.release(backend);
        self.placeholder.release(backend);
    }
}
