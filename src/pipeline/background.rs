//! Background clear stage

use crate::backend::{ColorAttachment, RenderPassDescriptor};
use crate::camera::{ClearFlags, ClearMode, NEUTRAL_CLEAR_COLOR};
use crate::pipeline::{CameraPass, FrameStage, PassContext};

/// Clears the scene color target according to the camera's clear mode.
pub struct BackgroundPass;

impl BackgroundPass {
    fn draw_skybox(ctx: &mut PassContext<'_>) {
        if ctx.skybox.is_none() {
            log::trace!("Skybox clear without a scene skybox");
            return;
        }
        let Some(pipeline) = ctx.shaders.skybox() else {
            // Degraded at build time and already reported
            return;
        };
        let Some(target) = ctx.targets.draw_view() else {
            return;
        };

        let depth = ctx.depth_attachment();
        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Skybox".to_string()),
            color_attachments: vec![ColorAttachment::load(target)],
            depth_stencil_attachment: depth,
        });
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, ctx.resources.skybox_texture_group());
        ctx.backend.set_bind_group(1, ctx.resources.skybox_params_group());
        ctx.backend.draw(0..3, 0..1);
        ctx.backend.end_render_pass();
    }
}

impl CameraPass for BackgroundPass {
    fn stage(&self) -> FrameStage {
        FrameStage::ClearBackground
    }

    fn execute(&self, ctx: &mut PassContext<'_>) {
        let scene = ctx.scene_texture();
        ctx.targets.select_draw_buffer(scene.slot());

        match ctx.config.clear_mode {
            ClearMode::Nothing => {}
            ClearMode::Depth => ctx.targets.clear(ctx.backend, ClearFlags::DEPTH),
            ClearMode::Color => {
                ctx.targets.set_clear_color(ctx.config.clear_color);
                ctx.targets.clear(ctx.backend, ClearFlags::ALL);
                ctx.targets.set_clear_color(NEUTRAL_CLEAR_COLOR);
            }
            ClearMode::Skybox => {
                ctx.targets.clear(ctx.backend, ClearFlags::ALL);
                Self::draw_skybox(ctx);
            }
        }
    }
}
