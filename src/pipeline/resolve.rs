//! Resolve stage: copy the camera image to the output view

use crate::backend::{ColorAttachment, RenderPassDescriptor};
use crate::pipeline::{CameraPass, FrameStage, PassContext};

pub struct ResolvePass;

impl CameraPass for ResolvePass {
    fn stage(&self) -> FrameStage {
        FrameStage::Resolve
    }

    fn execute(&self, ctx: &mut PassContext<'_>) {
        let source = ctx.final_texture();
        let Some(input) = ctx.targets.sample_group(source) else {
            log::error!("Resolve source {:?} is not allocated", source);
            return;
        };
        let scene = ctx.scene_texture();
        ctx.targets.select_draw_buffer(scene.slot());

        log::trace!("Resolving {:?} to output", source);
        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Camera Resolve".to_string()),
            color_attachments: vec![ColorAttachment::clear(ctx.output, [0.0, 0.0, 0.0, 1.0])],
            depth_stencil_attachment: None,
        });
        ctx.backend.set_render_pipeline(ctx.shaders.copy_output());
        ctx.backend.set_bind_group(0, input);
        ctx.backend.draw(0..3, 0..1);
        ctx.backend.end_render_pass();
    }
}
