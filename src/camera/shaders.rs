//! Shader sources and the pipelines a camera compiles from them

use crate::backend::{
    BackendResult, CompareFunction, CullMode, DepthStencilState, GraphicsBackend,
    RenderPipelineDescriptor, RenderPipelineHandle, TextureFormat, Vertex,
};
use crate::camera::config::{CameraConfig, RenderPath};
use crate::camera::resources::CameraLayouts;
use crate::camera::targets::{DEPTH_FORMAT, HDR_FORMAT, LDR_FORMAT, NORMALS_FORMAT};
use crate::pipeline::shaders;
use std::fmt;

/// WGSL sources for the camera's own stages.
///
/// `copy` is required. The other stages are optional: a missing or broken source
/// degrades the feature instead of failing the camera.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub copy: String,
    pub skybox: Option<String>,
    pub deferred: Option<String>,
    pub normals: Option<String>,
}

impl Default for ShaderSet {
    fn default() -> Self {
        Self {
            copy: shaders::fullscreen(shaders::COPY_FRAGMENT),
            skybox: Some(shaders::SKYBOX_SHADER.to_string()),
            deferred: Some(shaders::fullscreen(shaders::DEFERRED_FRAGMENT)),
            normals: Some(shaders::with_camera(&[shaders::NORMALS_BODY])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Copy,
    Skybox,
    Deferred,
    Normals,
}

impl ShaderStage {
    /// What the camera does without this stage.
    pub fn fallback(self) -> &'static str {
        match self {
            ShaderStage::Copy => "camera cannot be built",
            ShaderStage::Skybox => "skybox clears fall back to a plain clear",
            ShaderStage::Deferred => "the deferred pass is skipped",
            ShaderStage::Normals => "the normals pass is skipped",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Copy => "copy",
            ShaderStage::Skybox => "skybox",
            ShaderStage::Deferred => "deferred",
            ShaderStage::Normals => "normals",
        };
        f.write_str(name)
    }
}

/// Compiled camera pipelines, one field per stage.
#[derive(Debug, Clone)]
pub struct CameraShaders {
    copy_ldr: RenderPipelineHandle,
    copy_hdr: Option<RenderPipelineHandle>,
    copy_output: RenderPipelineHandle,
    skybox: Option<RenderPipelineHandle>,
    deferred: Option<RenderPipelineHandle>,
    normals: Option<RenderPipelineHandle>,
    degraded: Vec<ShaderStage>,
}

impl CameraShaders {
    pub fn compile(
        backend: &mut dyn GraphicsBackend,
        set: &ShaderSet,
        config: &CameraConfig,
        layouts: &CameraLayouts,
        output_format: TextureFormat,
    ) -> BackendResult<Self> {
        let copy = |format: TextureFormat, label: &str| {
            RenderPipelineDescriptor::fullscreen(label, &set.copy, vec![layouts.sample], format)
        };
        let copy_ldr = backend.create_render_pipeline(&copy(LDR_FORMAT, "Copy LDR"))?;
        let copy_hdr = if config.hdr {
            Some(backend.create_render_pipeline(&copy(HDR_FORMAT, "Copy HDR"))?)
        } else {
            None
        };
        let copy_output = backend.create_render_pipeline(&copy(output_format, "Copy Output"))?;

        let scene_format = if config.hdr { HDR_FORMAT } else { LDR_FORMAT };
        let mut degraded = Vec::new();

        let skybox = compile_optional(
            backend,
            ShaderStage::Skybox,
            set.skybox.as_deref(),
            &mut degraded,
            |source| RenderPipelineDescriptor {
                label: Some("Skybox".to_string()),
                vertex_shader: source.to_string(),
                fragment_shader: Some(source.to_string()),
                depth_stencil: Some(DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: CompareFunction::LessEqual,
                }),
                ..RenderPipelineDescriptor::fullscreen(
                    "Skybox",
                    source,
                    vec![layouts.skybox_texture, layouts.skybox_params],
                    scene_format,
                )
            },
        );

        let deferred = if config.render_path == RenderPath::Deferred {
            compile_optional(
                backend,
                ShaderStage::Deferred,
                set.deferred.as_deref(),
                &mut degraded,
                |source| {
                    RenderPipelineDescriptor::fullscreen(
                        "Deferred Shading",
                        source,
                        vec![layouts.gbuffer, layouts.environment, layouts.deferred_params],
                        scene_format,
                    )
                },
            )
        } else {
            None
        };

        let normals = if config.normals_pass {
            compile_optional(
                backend,
                ShaderStage::Normals,
                set.normals.as_deref(),
                &mut degraded,
                |source| RenderPipelineDescriptor {
                    label: Some("Normals".to_string()),
                    vertex_layouts: vec![Vertex::layout()],
                    cull_mode: CullMode::Back,
                    depth_stencil: Some(DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: false,
                        depth_compare: CompareFunction::LessEqual,
                    }),
                    ..RenderPipelineDescriptor::fullscreen(
                        "Normals",
                        source,
                        vec![layouts.camera, layouts.object],
                        NORMALS_FORMAT,
                    )
                },
            )
        } else {
            None
        };

        Ok(Self {
            copy_ldr,
            copy_hdr,
            copy_output,
            skybox,
            deferred,
            normals,
            degraded,
        })
    }

    /// Copy pipeline writing into a camera target of `format`.
    pub fn copy_for(&self, format: TextureFormat) -> Option<RenderPipelineHandle> {
        match format {
            f if f == LDR_FORMAT => Some(self.copy_ldr),
            f if f == HDR_FORMAT => self.copy_hdr,
            _ => None,
        }
    }

    /// Copy pipeline writing into the output surface.
    pub fn copy_output(&self) -> RenderPipelineHandle {
        self.copy_output
    }

    pub fn skybox(&self) -> Option<RenderPipelineHandle> {
        self.skybox
    }

    pub fn deferred(&self) -> Option<RenderPipelineHandle> {
        self.deferred
    }

    pub fn normals(&self) -> Option<RenderPipelineHandle> {
        self.normals
    }

    /// Stages that fell back to their placeholder behaviour.
    pub fn degraded(&self) -> &[ShaderStage] {
        &self.degraded
    }
}

fn compile_optional(
    backend: &mut dyn GraphicsBackend,
    stage: ShaderStage,
    source: Option<&str>,
    degraded: &mut Vec<ShaderStage>,
    describe: impl FnOnce(&str) -> RenderPipelineDescriptor,
) -> Option<RenderPipelineHandle> {
    let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
        log::warn!("No {} shader available; {}", stage, stage.fallback());
        degraded.push(stage);
        return None;
    };

    match backend.create_render_pipeline(&describe(source)) {
        Ok(pipeline) => Some(pipeline),
        Err(err) => {
            log::warn!("The {} shader failed to build ({}); {}", stage, err, stage.fallback());
            degraded.push(stage);
            None
        }
    }
}
