//! Mapping of backend-neutral descriptors onto wgpu

use crate::backend::traits::{
    BindingType, IndexFormat, LoadOp, ShaderStageFlags, TextureSampleType,
};
use crate::backend::types::*;

pub(super) trait ToWgpu {
    type Output;

    fn to_wgpu(&self) -> Self::Output;
}

fn map_flags<F, W>(flags: F, table: &[(F, W)], empty: W) -> W
where
    F: bitflags::Flags + Copy,
    W: std::ops::BitOr<Output = W> + Copy,
{
    table
        .iter()
        .filter(|(ours, _)| flags.contains(*ours))
        .fold(empty, |acc, (_, theirs)| acc | *theirs)
}

impl ToWgpu for TextureFormat {
    type Output = wgpu::TextureFormat;

    fn to_wgpu(&self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

/// Swapchain formats the camera resolve can target.
pub(super) fn surface_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    Some(match format {
        wgpu::TextureFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Rgba8UnormSrgb => TextureFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Bgra8Unorm => TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Bgra8UnormSrgb => TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba16Float => TextureFormat::Rgba16Float,
        _ => return None,
    })
}

impl ToWgpu for TextureUsage {
    type Output = wgpu::TextureUsages;

    fn to_wgpu(&self) -> wgpu::TextureUsages {
        map_flags(
            *self,
            &[
                (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
                (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
                (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
                (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
            ],
            wgpu::TextureUsages::empty(),
        )
    }
}

impl ToWgpu for BufferUsage {
    type Output = wgpu::BufferUsages;

    fn to_wgpu(&self) -> wgpu::BufferUsages {
        map_flags(
            *self,
            &[
                (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
                (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
                (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
                (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
            ],
            wgpu::BufferUsages::empty(),
        )
    }
}

impl ToWgpu for ShaderStageFlags {
    type Output = wgpu::ShaderStages;

    fn to_wgpu(&self) -> wgpu::ShaderStages {
        map_flags(
            *self,
            &[
                (ShaderStageFlags::VERTEX, wgpu::ShaderStages::VERTEX),
                (ShaderStageFlags::FRAGMENT, wgpu::ShaderStages::FRAGMENT),
            ],
            wgpu::ShaderStages::empty(),
        )
    }
}

impl ToWgpu for ColorWrites {
    type Output = wgpu::ColorWrites;

    fn to_wgpu(&self) -> wgpu::ColorWrites {
        map_flags(
            *self,
            &[
                (ColorWrites::RED, wgpu::ColorWrites::RED),
                (ColorWrites::GREEN, wgpu::ColorWrites::GREEN),
                (ColorWrites::BLUE, wgpu::ColorWrites::BLUE),
                (ColorWrites::ALPHA, wgpu::ColorWrites::ALPHA),
            ],
            wgpu::ColorWrites::empty(),
        )
    }
}

impl ToWgpu for TextureViewDimension {
    type Output = wgpu::TextureViewDimension;

    fn to_wgpu(&self) -> wgpu::TextureViewDimension {
        match self {
            TextureViewDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureViewDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }
}

impl ToWgpu for VertexFormat {
    type Output = wgpu::VertexFormat;

    fn to_wgpu(&self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        }
    }
}

impl ToWgpu for CompareFunction {
    type Output = wgpu::CompareFunction;

    fn to_wgpu(&self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        }
    }
}

impl ToWgpu for CullMode {
    type Output = Option<wgpu::Face>;

    fn to_wgpu(&self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl ToWgpu for FilterMode {
    type Output = wgpu::FilterMode;

    fn to_wgpu(&self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl ToWgpu for IndexFormat {
    type Output = wgpu::IndexFormat;

    fn to_wgpu(&self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl ToWgpu for LoadOp<[f32; 4]> {
    type Output = wgpu::Operations<wgpu::Color>;

    fn to_wgpu(&self) -> wgpu::Operations<wgpu::Color> {
        let load = match *self {
            LoadOp::Clear([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r.into(),
                g: g.into(),
                b: b.into(),
                a: a.into(),
            }),
            LoadOp::Load => wgpu::LoadOp::Load,
        };
        wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }
    }
}

impl ToWgpu for LoadOp<f32> {
    type Output = wgpu::Operations<f32>;

    fn to_wgpu(&self) -> wgpu::Operations<f32> {
        let load = match *self {
            LoadOp::Clear(depth) => wgpu::LoadOp::Clear(depth),
            LoadOp::Load => wgpu::LoadOp::Load,
        };
        wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }
    }
}

impl ToWgpu for BindingType {
    type Output = wgpu::BindingType;

    fn to_wgpu(&self) -> wgpu::BindingType {
        match self {
            BindingType::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingType::Texture {
                sample_type,
                view_dimension,
            } => wgpu::BindingType::Texture {
                sample_type: match *sample_type {
                    TextureSampleType::Float { filterable } => {
                        wgpu::TextureSampleType::Float { filterable }
                    }
                    TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
                },
                view_dimension: view_dimension.to_wgpu(),
                multisampled: false,
            },
            BindingType::Sampler => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_flags_map_bit_by_bit() {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        assert_eq!(
            usage.to_wgpu(),
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        );
        assert_eq!(ColorWrites::ALL.to_wgpu(), wgpu::ColorWrites::ALL);
        assert_eq!(
            ShaderStageFlags::VERTEX_FRAGMENT.to_wgpu(),
            wgpu::ShaderStages::VERTEX_FRAGMENT
        );
    }

    #[test]
    fn every_surface_format_round_trips() {
        for format in [
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float,
        ] {
            assert_eq!(surface_format(format.to_wgpu()), Some(format));
        }
        assert_eq!(surface_format(wgpu::TextureFormat::Rgb10a2Unorm), None);
    }
}
