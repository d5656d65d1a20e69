//! Tonemapping: the HDR to LDR step of an effect chain

use super::{uniform_layout, EffectUniform};
use crate::backend::{BackendResult, GraphicsBackend, RenderPipelineHandle};
use crate::pipeline::{Effect, EffectContext, EffectDomain, EffectSetup};
use bytemuck::{Pod, Zeroable};

/// Tonemapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemapOperator {
    Reinhard,
    #[default]
    Aces,
    /// Plain saturate
    Clamp,
}

impl TonemapOperator {
    fn shader_index(self) -> u32 {
        match self {
            TonemapOperator::Reinhard => 0,
            TonemapOperator::Aces => 1,
            TonemapOperator::Clamp => 2,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TonemapParams {
    exposure: f32,
    inv_gamma: f32,
    operator: u32,
    pad: u32,
}

/// Maps the HDR scene into LDR with exposure, an operator and gamma correction.
pub struct Tonemapping {
    pub operator: TonemapOperator,
    pub exposure: f32,
    pub gamma: f32,
    resources: Option<(RenderPipelineHandle, EffectUniform<TonemapParams>)>,
}

impl Default for Tonemapping {
    fn default() -> Self {
        Self::new(TonemapOperator::default())
    }
}

impl Tonemapping {
    pub fn new(operator: TonemapOperator) -> Self {
        Self {
            operator,
            exposure: 1.0,
            gamma: 2.2,
            resources: None,
        }
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }
}

impl Effect for Tonemapping {
    fn name(&self) -> &str {
        "Tonemapping"
    }

    fn domain(&self) -> EffectDomain {
        EffectDomain::Tonemapper
    }

    fn prepare(&mut self, setup: &mut EffectSetup<'_>) -> BackendResult<()> {
        let layout = uniform_layout(setup.backend())?;
        let params = EffectUniform::new(setup.backend(), "Tonemap Params", layout)?;
        let pipeline = setup.fullscreen_pipeline("Tonemapping", TONEMAPPING_FRAGMENT, &[layout])?;
        self.resources = Some((pipeline, params));
        Ok(())
    }

    fn render(&mut self, ctx: &mut EffectContext<'_>) {
        let Some((pipeline, params)) = &self.resources else {
            log::error!("Tonemapping rendered before prepare");
            return;
        };
        params.write(
            ctx.backend(),
            &TonemapParams {
                exposure: self.exposure,
                inv_gamma: 1.0 / self.gamma.max(f32::EPSILON),
                operator: self.operator.shader_index(),
                pad: 0,
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

const TONEMAPPING_FRAGMENT: &str = r#"
struct Params {
    exposure: f32,
    inv_gamma: f32,
    operator: u32,
    pad: u32,
}

@group(0) @binding(0) var scene: texture_2d<f32>;
@group(0) @binding(1) var scene_sampler: sampler;
@group(1) @binding(0) var<uniform> params: Params;

// Narkowicz 2015 fit of the ACES reference curve
fn aces_fitted(x: vec3<f32>) -> vec3<f32> {
    let num = x * (2.51 * x + 0.03);
    let den = x * (2.43 * x + 0.59) + 0.14;
    return clamp(num / den, vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let exposed = params.exposure * textureSampleLevel(scene, scene_sampler, input.uv, 0.0).rgb;

    var ldr = clamp(exposed, vec3<f32>(0.0), vec3<f32>(1.0));
    if params.operator == 0u {
        ldr = exposed / (exposed + 1.0);
    } else if params.operator == 1u {
        ldr = aces_fitted(exposed);
    }
    return vec4<f32>(pow(ldr, vec3<f32>(params.inv_gamma)), 1.0);
}
"#;
