//! Camera Pipeline - per-camera frame rendering over forward and deferred paths
//!
//! Each [`Camera`] renders a frame as a fixed sequence of passes:
//! - Background clear (solid color, depth only, skybox, or nothing)
//! - Deferred geometry into a G-buffer plus an ambient resolve
//! - Forward shading, with an optional normals prepass
//! - A post-process effect chain over ping-pong targets, with one HDR to LDR step
//! - Resolve into the output surface
//!
//! Passes record through the [`backend::GraphicsBackend`] trait, implemented by
//! wgpu and by a headless recording backend.

pub mod backend;
pub mod camera;
pub mod engine;
pub mod error;
pub mod instance;
pub mod logging;
pub mod pipeline;
pub mod scene;
pub mod window;

pub use backend::{RecordingBackend, WgpuBackend};
pub use camera::{Camera, CameraConfig, ClearMode, ProjectionKind, RenderPath};
pub use engine::Engine;
pub use error::{RenderError, RenderResult};
pub use instance::{InstanceId, InstanceRegistry};
pub use logging::{init_logging, LoggingConfig};
pub use pipeline::{Effect, EffectDomain};
pub use scene::{Drawable, Scene, SceneQuery, Skybox};
pub use window::{HeadlessSurface, OutputSurface, Window};

use camera::ShaderSet;

/// Configuration for initializing the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Shader sources every camera compiles
    pub shaders: ShaderSet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Camera Pipeline".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            shaders: ShaderSet::default(),
        }
    }
}
