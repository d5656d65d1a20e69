//! Deferred geometry pass and ambient resolve

use crate::backend::{ColorAttachment, RenderPassDescriptor};
use crate::camera::RenderPath;
use crate::pipeline::{CameraPass, FrameStage, PassContext};

/// G-buffer geometry followed by a fullscreen ambient resolve into the scene color
/// target. Skipped on the Forward path and when no deferred shader is available.
pub struct DeferredPass;

impl CameraPass for DeferredPass {
    fn stage(&self) -> FrameStage {
        FrameStage::DeferredPass
    }

    fn execute(&self, ctx: &mut PassContext<'_>) {
        if ctx.config.render_path != RenderPath::Deferred {
            return;
        }
        let (Some(gbuffer), Some(pipeline)) = (ctx.gbuffer, ctx.shaders.deferred()) else {
            log::trace!("Deferred shading unavailable, skipping deferred pass");
            return;
        };

        // Geometry: drawables write their attributes into the G-buffer
        ctx.frame.render_path = RenderPath::Deferred;
        let drawables = ctx.cache.deferred();
        gbuffer.begin_geometry_pass(ctx.backend);
        ctx.draw_all(&drawables, None);
        ctx.backend.end_render_pass();

        // Ambient resolve: one fullscreen draw, no depth writes
        let Some(target) = ctx.targets.view(ctx.scene_texture()) else {
            return;
        };
        ctx.frame.depth_write = false;
        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Deferred Ambient".to_string()),
            color_attachments: vec![ColorAttachment::load(target)],
            depth_stencil_attachment: None,
        });
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, gbuffer.input_group());
        ctx.backend.set_bind_group(1, ctx.resources.environment_group());
        ctx.backend.set_bind_group(2, ctx.resources.deferred_params_group());
        ctx.backend.draw(0..3, 0..1);
        ctx.backend.end_render_pass();
        ctx.frame.depth_write = true;
    }
}
