//! Built-in post-processing effects

mod blur;
mod tonemapping;
mod vignette;

pub use blur::GaussianBlur;
pub use tonemapping::{TonemapOperator, Tonemapping};
pub use vignette::Vignette;

use crate::backend::{
    BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindGroupLayoutHandle,
    BindingType, BufferDescriptor, BufferHandle, GraphicsBackend, ShaderStageFlags,
};
use bytemuck::Pod;
use std::marker::PhantomData;

/// Layout of a single fragment-visible uniform block at binding 0.
pub fn uniform_layout(backend: &mut dyn GraphicsBackend) -> BackendResult<BindGroupLayoutHandle> {
    backend.create_bind_group_layout(&[BindGroupLayoutEntry {
        binding: 0,
        visibility: ShaderStageFlags::FRAGMENT,
        ty: BindingType::UniformBuffer,
    }])
}

/// Effect parameter block: a uniform buffer plus the group binding it.
pub struct EffectUniform<T: Pod> {
    buffer: BufferHandle,
    group: BindGroupHandle,
    _data: PhantomData<T>,
}

impl<T: Pod> EffectUniform<T> {
    pub fn new(
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
        Ok(Self {
            buffer,
            group,
            _data: PhantomData,
        })
    }

    pub fn group(&self) -> BindGroupHandle {
        self.group
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn write(&self, backend: &mut dyn GraphicsBackend, data: &T) {
        backend.write_buffer(self.buffer, 0, bytemuck::bytes_of(data));
    }

    pub fn release(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.group);
        backend.destroy_buffer(self.buffer);
    }
}
