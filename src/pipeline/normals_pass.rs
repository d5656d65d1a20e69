//! View-space normals prepass

use crate::backend::{ColorAttachment, RenderPassDescriptor};
use crate::camera::CameraTexture;
use crate::pipeline::PassContext;

const NORMALS_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Renders every cached drawable with the normals shader as an override. Runs after
/// the forward pass so depth is already populated (less-equal, no writes).
pub struct NormalsPass;

impl NormalsPass {
    pub(crate) fn execute(ctx: &mut PassContext<'_>) {
        let Some(pipeline) = ctx.shaders.normals() else {
            return;
        };
        let Some(target) = ctx.targets.view(CameraTexture::Normals) else {
            return;
        };

        let mut drawables = ctx.cache.forward();
        drawables.extend(ctx.cache.deferred());

        ctx.targets.select_draw_buffer(CameraTexture::Normals.slot());
        let depth = ctx.depth_attachment();
        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Normals".to_string()),
            color_attachments: vec![ColorAttachment::clear(target, NORMALS_CLEAR)],
            depth_stencil_attachment: depth,
        });
        ctx.draw_all(&drawables, Some(pipeline));
        ctx.backend.end_render_pass();
        let scene = ctx.scene_texture();
        ctx.targets.select_draw_buffer(scene.slot());
    }
}
