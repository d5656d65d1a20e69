//! Separable gaussian blur

use super::{uniform_layout, EffectUniform};
use crate::backend::{BackendResult, GraphicsBackend, RenderPipelineHandle};
use crate::pipeline::{Effect, EffectContext, EffectDomain, EffectSetup};
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurParams {
    /// Texel offset between taps
    step: [f32; 2],
    _padding: [f32; 2],
}

struct BlurResources {
    pipeline: RenderPipelineHandle,
    horizontal: EffectUniform<BlurParams>,
    vertical: EffectUniform<BlurParams>,
}

/// Gaussian blur run as alternating horizontal and vertical sub-passes.
pub struct GaussianBlur {
    domain: EffectDomain,
    sub_passes: u32,
    pub radius: f32,
    resources: Option<BlurResources>,
}

impl GaussianBlur {
    /// Blur in `domain` (HDR or LDR) using `sub_passes` one-dimensional passes.
    pub fn new(domain: EffectDomain, sub_passes: u32) -> Self {
        debug_assert_ne!(domain, EffectDomain::Tonemapper);
        Self {
            domain,
            sub_passes,
            radius: 1.0,
            resources: None,
        }
    }

    pub fn sub_passes(&self) -> u32 {
        self.sub_passes
    }
}

impl Effect for GaussianBlur {
    fn name(&self) -> &str {
        "Gaussian Blur"
    }

    fn domain(&self) -> EffectDomain {
        self.domain
    }

    fn prepare(&mut self, setup: &mut EffectSetup<'_>) -> BackendResult<()> {
        let layout = uniform_layout(setup.backend())?;
        let horizontal = EffectUniform::new(setup.backend(), "Blur Horizontal", layout)?;
        let vertical = EffectUniform::new(setup.backend(), "Blur Vertical", layout)?;
        let pipeline = setup.fullscreen_pipeline("Gaussian Blur", BLUR_FRAGMENT, &[layout])?;
        self.resources = Some(BlurResources {
            pipeline,
            horizontal,
            vertical,
        });
        Ok(())
    }

    fn render(&mut self, ctx: &mut EffectContext<'_>) {
        let Some(resources) = &self.resources else {
            log::error!("Gaussian blur rendered before prepare");
            return;
        };

        // Both directions are uploaded up front; uniform writes land before the
        // frame's passes execute.
        let (width, height) = ctx.resolution();
        let texel = [self.radius / width as f32, self.radius / height as f32];
        resources.horizontal.write(
            ctx.backend(),
            &BlurParams {
                step: [texel[0], 0.0],
                _padding: [0.0; 2],
            },
        );
        resources.vertical.write(
            ctx.backend(),
            &BlurParams {
                step: [0.0, texel[1]],
                _padding: [0.0; 2],
            },
        );

        for i in 0..self.sub_passes {
            let params = if i % 2 == 0 {
                &resources.horizontal
            } else {
                &resources.vertical
            };
            ctx.bind_shader(resources.pipeline, &[params.group()]);
            ctx.run_sub_pass();
        }
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(resources) = self.resources.take() {
            resources.horizontal.release(backend);
            resources.vertical.release(backend);
        }
    }
}

const BLUR_FRAGMENT: &str = r#"
struct BlurParams {
    step: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var input_texture: texture_2d<f32>;
@group(0) @binding(1) var input_sampler: sampler;
@group(1) @binding(0) var<uniform> params: BlurParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    var color = textureSampleLevel(input_texture, input_sampler, input.uv, 0.0).rgb * weights[0];
    for (var i = 1; i < 5; i++) {
        let offset = params.step * f32(i);
        color += textureSampleLevel(input_texture, input_sampler, input.uv + offset, 0.0).rgb * weights[i];
        color += textureSampleLevel(input_texture, input_sampler, input.uv - offset, 0.0).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}
"#;
