//! Vignette

use super::{uniform_layout, EffectUniform};
use crate::backend::{BackendResult, GraphicsBackend, RenderPipelineHandle};
use crate::pipeline::{Effect, EffectContext, EffectDomain, EffectSetup};
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct VignetteParams {
    intensity: f32,
    smoothness: f32,
    _padding: [f32; 2],
}

/// Darkens the image towards its corners. LDR, one sub-pass.
pub struct Vignette {
    pub intensity: f32,
    pub smoothness: f32,
    resources: Option<(RenderPipelineHandle, EffectUniform<VignetteParams>)>,
}

impl Default for Vignette {
    fn default() -> Self {
        Self {
            intensity: 0.4,
            smoothness: 0.5,
            resources: None,
        }
    }
}

impl Effect for Vignette {
    fn name(&self) -> &str {
        "Vignette"
    }

    fn domain(&self) -> EffectDomain {
        EffectDomain::Ldr
    }

    fn prepare(&mut self, setup: &mut EffectSetup<'_>) -> BackendResult<()> {
        let layout = uniform_layout(setup.backend())?;
        let params = EffectUniform::new(setup.backend(), "Vignette Params", layout)?;
        let pipeline = setup.fullscreen_pipeline("Vignette", VIGNETTE_FRAGMENT, &[layout])?;
        self.resources = Some((pipeline, params));
        Ok(())
    }

    fn render(&mut self, ctx: &mut EffectContext<'_>) {
        let Some((pipeline, params)) = &self.resources else {
            log::error!("Vignette rendered before prepare");
            return;
        };
        params.write(
            ctx.backend(),
            &VignetteParams {
                intensity: self.intensity,
                smoothness: self.smoothness,
                _padding: [0.0; 2],
            },
        );
        ctx.bind_shader(*pipeline, &[params.group()]);
        ctx.run_sub_pass();
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some((_, params)) = self.resources.take() {
            params.release(backend);
        }
    }
}

const VIGNETTE_FRAGMENT: &str = r#"
struct VignetteParams {
    intensity: f32,
    smoothness: f32,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var input_texture: texture_2d<f32>;
@group(0) @binding(1) var input_sampler: sampler;
@group(1) @binding(0) var<uniform> params: VignetteParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(input_texture, input_sampler, input.uv, 0.0);
    let distance = length(input.uv - vec2<f32>(0.5)) * 1.41421356;
    let falloff = smoothstep(1.0 - params.smoothness, 1.0, distance);
    return vec4<f32>(color.rgb * (1.0 - falloff * params.intensity), color.a);
}
"#;
