//! Environment assets consumed by the background and deferred passes

use crate::backend::{
    BackendResult, GraphicsBackend, TextureDescriptor, TextureFormat, TextureHandle,
    TextureViewDimension, TextureViewHandle,
};

/// A cubemap texture and its cube view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CubeMap {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
}

impl CubeMap {
    /// Create a cubemap whose six faces are filled with one color.
    pub fn solid(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        size: u32,
        color: [u8; 4],
    ) -> BackendResult<Self> {
        let size = size.max(1);
        let texture =
            backend.create_texture(&TextureDescriptor::cube(label, size, TextureFormat::Rgba8Unorm))?;
        let texels: Vec<u8> = color
            .iter()
            .copied()
            .cycle()
            .take((size * size * 6 * 4) as usize)
            .collect();
        backend.write_texture(texture, &texels, size, size, 6);
        let view = backend.create_texture_view(texture, TextureViewDimension::Cube)?;
        Ok(Self { texture, view })
    }

    pub fn release(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_texture(self.texture);
    }
}

/// Image-based lighting environment: a specular cubemap drawn as background and an
/// irradiance cubemap used for ambient light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Skybox {
    pub specular: CubeMap,
    pub irradiance: CubeMap,
}

impl Skybox {
    pub fn new(specular: CubeMap, irradiance: CubeMap) -> Self {
        Self {
            specular,
            irradiance,
        }
    }

    /// Build a skybox from two flat colors (handy for tests and placeholder scenes).
    pub fn solid(
        backend: &mut dyn GraphicsBackend,
        specular: [u8; 4],
        irradiance: [u8; 4],
    ) -> BackendResult<Self> {
        let specular = CubeMap::solid(backend, "Skybox Specular", 1, specular)?;
        let irradiance = match CubeMap::solid(backend, "Skybox Irradiance", 1, irradiance) {
            Ok(cube) => cube,
            Err(err) => {
                specular.release(backend);
                return Err(err);
            }
        };
        Ok(Self::new(specular, irradiance))
    }

    pub fn release(&self, backend: &mut dyn GraphicsBackend) {
        self.specular.release(backend);
        self.irradiance.release(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    #[test]
    fn solid_skybox_has_cube_views() {
        let mut backend = RecordingBackend::new(8, 8);
        let skybox = Skybox::solid(&mut backend, [0, 0, 255, 255], [32, 32, 32, 255]).unwrap();

        assert_eq!(
            backend.view_dimension(skybox.specular.view),
            Some(TextureViewDimension::Cube)
        );
        let texels = backend.read_texels(skybox.specular.view).unwrap();
        assert_eq!(texels.len(), 6);
        assert!(texels.iter().all(|t| *t == [0.0, 0.0, 1.0, 1.0]));

        skybox.release(&mut backend);
        assert!(!backend.is_live_view(skybox.irradiance.view));
    }
}
