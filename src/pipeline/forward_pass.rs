//! Forward pass

use crate::backend::{ColorAttachment, RenderPassDescriptor};
use crate::camera::RenderPath;
use crate::pipeline::normals_pass::NormalsPass;
use crate::pipeline::{CameraPass, FrameStage, PassContext};

/// Draws the forward cache into the scene color target, in cache order.
pub struct ForwardPass;

impl CameraPass for ForwardPass {
    fn stage(&self) -> FrameStage {
        FrameStage::ForwardPass
    }

    fn execute(&self, ctx: &mut PassContext<'_>) {
        ctx.frame.render_path = RenderPath::Forward;

        let drawables = ctx.cache.forward();
        if drawables.is_empty() {
            log::trace!("No forward drawables");
        } else if let Some(target) = ctx.targets.view(ctx.scene_texture()) {
            let depth = ctx.depth_attachment();
            ctx.backend.begin_render_pass(&RenderPassDescriptor {
                label: Some("Forward".to_string()),
                color_attachments: vec![ColorAttachment::load(target)],
                depth_stencil_attachment: depth,
            });
            ctx.draw_all(&drawables, None);
            ctx.backend.end_render_pass();
        }

        if ctx.config.normals_pass {
            NormalsPass::execute(ctx);
        }
    }
}
