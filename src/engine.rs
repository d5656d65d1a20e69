//! Main engine orchestrator

use crate::backend::{BackendResult, GraphicsBackend, WgpuBackend};
use crate::camera::{Camera, CameraConfig};
use crate::error::{RenderError, RenderResult};
use crate::instance::InstanceRegistry;
use crate::pipeline::Effect;
use crate::scene::Scene;
use crate::window::OutputSurface;
use crate::EngineConfig;
use std::sync::Arc;
use winit::window::Window as WinitWindow;

/// Owns the backend, the scene and every camera, and drives one frame at a time.
pub struct Engine {
    backend: Box<dyn GraphicsBackend>,
    registry: Arc<InstanceRegistry>,
    scene: Scene,
    cameras: Vec<Camera>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine rendering into `window` through wgpu.
    pub fn new(window: Arc<WinitWindow>, config: EngineConfig) -> BackendResult<Self> {
        let backend = WgpuBackend::new(window, config.vsync)?;
        Ok(Self::with_backend(Box::new(backend), config))
    }

    /// Create an engine on an existing backend, e.g. the recording backend.
    pub fn with_backend(backend: Box<dyn GraphicsBackend>, config: EngineConfig) -> Self {
        Self::with_registry(backend, Arc::new(InstanceRegistry::new()), config)
    }

    /// Create an engine sharing an identity registry with other systems.
    pub fn with_registry(
        backend: Box<dyn GraphicsBackend>,
        registry: Arc<InstanceRegistry>,
        config: EngineConfig,
    ) -> Self {
        log::info!("Engine started ({}x{})", config.width, config.height);
        Self {
            backend,
            registry,
            scene: Scene::new(),
            cameras: Vec::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> &dyn GraphicsBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn GraphicsBackend {
        self.backend.as_mut()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Backend and scene borrowed together, for building drawables.
    pub fn backend_and_scene(&mut self) -> (&mut dyn GraphicsBackend, &mut Scene) {
        (self.backend.as_mut(), &mut self.scene)
    }

    /// Create a camera at the current surface size and return its index.
    pub fn add_camera(&mut self, config: CameraConfig) -> RenderResult<usize> {
        let resolution = self.backend.surface_size();
        let mut camera = Camera::new(
            self.backend.as_mut(),
            Arc::clone(&self.registry),
            config,
            &self.config.shaders,
            resolution,
        )?;
        camera.on_scene_graph_update(&self.scene);
        self.cameras.push(camera);
        Ok(self.cameras.len() - 1)
    }

    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    pub fn camera_mut(&mut self, index: usize) -> Option<&mut Camera> {
        self.cameras.get_mut(index)
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Append an effect to a camera's chain.
    pub fn add_effect(&mut self, camera: usize, effect: Box<dyn Effect>) -> RenderResult<()> {
        let Some(target) = self.cameras.get_mut(camera) else {
            log::error!("No camera at index {} for effect {}", camera, effect.name());
            return Err(RenderError::UnknownCamera(camera));
        };
        target.add_effect(self.backend.as_mut(), effect)
    }

    /// Render every camera into the swapchain and present.
    pub fn render_frame(&mut self, surface: &dyn OutputSurface) -> RenderResult<()> {
        if surface.was_resized() {
            let (width, height) = surface.resolution();
            if width > 0 && height > 0 {
                self.backend.resize(width, height);
            }
        }

        let frame = self.backend.begin_frame()?;

        for camera in self.cameras.iter_mut() {
            camera.update(self.backend.as_mut(), surface)?;
        }

        if self.scene.take_structure_changed() {
            for camera in self.cameras.iter_mut() {
                camera.on_scene_graph_update(&self.scene);
            }
        }

        for camera in self.cameras.iter_mut() {
            camera.render(self.backend.as_mut(), &self.scene, frame.swapchain_view)?;
        }

        self.backend.end_frame()?;
        Ok(())
    }

    /// Release cameras, the scene environment and every remaining identity.
    /// Call between frames.
    pub fn shutdown(&mut self) {
        for mut camera in self.cameras.drain(..) {
            camera.release(self.backend.as_mut());
        }
        if let Some(skybox) = self.scene.set_skybox(None) {
            skybox.release(self.backend.as_mut());
        }

        let remaining = self.registry.release_all();
        if remaining > 0 {
            log::warn!("{} identities were still registered at shutdown", remaining);
        }
        log::info!("Engine shut down");
    }
}
