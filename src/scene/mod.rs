//! Scene collaborator: drawables, environment and structural change tracking

pub mod environment;
pub mod mesh;
pub mod transform;

pub use environment::{CubeMap, Skybox};
pub use mesh::{Mesh, MeshDrawable, MeshPipelines};
pub use transform::Transform;

use crate::backend::{BindGroupHandle, GraphicsBackend, RenderPipelineHandle};
use crate::camera::{RenderPath, TargetFormats, ViewState};
use glam::{Mat3, Mat4, Vec3};
use std::rc::Rc;

/// Anything that can record its own draw calls for a camera.
///
/// Drawables are called inside an already-begun render pass. They bind their own
/// pipeline (or the context's shader override), bind the camera group at index 0,
/// their object data at index 1 and issue draws.
pub trait Drawable {
    fn draw(&self, ctx: &mut DrawContext<'_>);

    /// Whether the drawable can write G-buffer attributes for the deferred path.
    fn supports_deferred_pass(&self) -> bool {
        false
    }

    fn label(&self) -> &str {
        "drawable"
    }
}

/// Camera state handed to a drawable for one draw invocation.
pub struct DrawContext<'a> {
    backend: &'a mut dyn GraphicsBackend,
    view: &'a ViewState,
    render_path: RenderPath,
    formats: TargetFormats,
    camera_group: BindGroupHandle,
    shader_override: Option<RenderPipelineHandle>,
}

impl<'a> DrawContext<'a> {
    pub(crate) fn new(
        backend: &'a mut dyn GraphicsBackend,
        view: &'a ViewState,
        render_path: RenderPath,
        formats: TargetFormats,
        camera_group: BindGroupHandle,
        shader_override: Option<RenderPipelineHandle>,
    ) -> Self {
        Self {
            backend,
            view,
            render_path,
            formats,
            camera_group,
            shader_override,
        }
    }

    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        &mut *self.backend
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.view.projection()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view.view()
    }

    pub fn normal_matrix(&self) -> Mat3 {
        self.view.normal()
    }

    pub fn camera_position(&self) -> Vec3 {
        self.view.position()
    }

    pub fn hdr(&self) -> bool {
        self.view.hdr()
    }

    /// Path the camera is currently drawing with. Deferred-capable drawables write
    /// G-buffer attributes under `Deferred` and shade directly under `Forward`.
    pub fn active_render_path(&self) -> RenderPath {
        self.render_path
    }

    /// Formats of the attachments bound for this draw.
    pub fn target_formats(&self) -> TargetFormats {
        self.formats
    }

    /// Bind group holding the camera uniform block, for index 0.
    pub fn camera_bind_group(&self) -> BindGroupHandle {
        self.camera_group
    }

    /// Pipeline the camera wants used instead of the drawable's own.
    pub fn shader_override(&self) -> Option<RenderPipelineHandle> {
        self.shader_override
    }
}

/// Queries a camera makes against the scene graph.
pub trait SceneQuery {
    /// Every drawable currently registered, in insertion order.
    fn drawables(&self) -> &[Rc<dyn Drawable>];

    fn skybox(&self) -> Option<&Skybox>;

    /// Counter bumped on every structural change.
    fn generation(&self) -> u64;
}

/// Owning scene graph.
#[derive(Default)]
pub struct Scene {
    drawables: Vec<Rc<dyn Drawable>>,
    skybox: Option<Skybox>,
    generation: u64,
    structure_changed: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_drawable(&mut self, drawable: Rc<dyn Drawable>) {
        log::debug!("Scene: adding {}", drawable.label());
        self.drawables.push(drawable);
        self.mark_changed();
    }

    /// Remove a drawable by identity. Returns whether it was present.
    pub fn remove_drawable(&mut self, drawable: &Rc<dyn Drawable>) -> bool {
        let before = self.drawables.len();
        self.drawables.retain(|d| !Rc::ptr_eq(d, drawable));
        let removed = self.drawables.len() != before;
        if removed {
            self.mark_changed();
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.drawables.is_empty() {
            self.drawables.clear();
            self.mark_changed();
        }
    }

    /// Replace the environment skybox, returning the previous one so the caller can
    /// release its textures.
    pub fn set_skybox(&mut self, skybox: Option<Skybox>) -> Option<Skybox> {
        std::mem::replace(&mut self.skybox, skybox)
    }

    /// Whether the structure changed since the last call, resetting the flag.
    pub fn take_structure_changed(&mut self) -> bool {
        std::mem::take(&mut self.structure_changed)
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    fn mark_changed(&mut self) {
        self.generation += 1;
        self.structure_changed = true;
    }
}

impl SceneQuery for Scene {
    fn drawables(&self) -> &[Rc<dyn Drawable>] {
        &self.drawables
    }

    fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl Drawable for Marker {
        fn draw(&self, _ctx: &mut DrawContext<'_>) {}
    }

    #[test]
    fn structural_changes_raise_flag_once() {
        let mut scene = Scene::new();
        assert!(!scene.take_structure_changed());

        let drawable: Rc<dyn Drawable> = Rc::new(Marker);
        scene.add_drawable(drawable.clone());
        assert_eq!(scene.generation(), 1);
        assert!(scene.take_structure_changed());
        assert!(!scene.take_structure_changed());

        assert!(scene.remove_drawable(&drawable));
        assert!(!scene.remove_drawable(&drawable));
        assert_eq!(scene.generation(), 2);
        assert!(scene.is_empty());
    }
}
