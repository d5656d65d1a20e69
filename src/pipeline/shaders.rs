//! Built-in WGSL sources used by the camera passes

/// Fullscreen triangle vertex stage shared by every fullscreen pass
pub const FULLSCREEN_VERTEX_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    // Generate fullscreen triangle
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);

    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);

    return output;
}
"#;

/// Prepend the fullscreen vertex stage to a fragment-only module.
pub fn fullscreen(fragment: &str) -> String {
    format!("{}\n{}", FULLSCREEN_VERTEX_SHADER, fragment)
}

/// Plain texture copy, group 0 = source texture + sampler
pub const COPY_FRAGMENT: &str = r#"
@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSampleLevel(source_texture, source_sampler, input.uv, 0.0);
}
"#;

pub const SKYBOX_SHADER: &str = r#"
struct SkyboxUniforms {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    inv_view_projection: mat4x4<f32>,
}

@group(0) @binding(0) var specular_map: texture_cube<f32>;
@group(0) @binding(1) var specular_sampler: sampler;
@group(1) @binding(0) var<uniform> sky: SkyboxUniforms;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(vertex_index & 2u) * 2.0 - 1.0;
    // Far plane, so geometry drawn later wins the depth test
    output.position = vec4<f32>(x, y, 1.0, 1.0);
    output.ndc = vec2<f32>(x, y);
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let far_point = sky.inv_view_projection * vec4<f32>(input.ndc, 1.0, 1.0);
    let direction = normalize(far_point.xyz / far_point.w);
    return vec4<f32>(textureSampleLevel(specular_map, specular_sampler, direction, 0.0).rgb, 1.0);
}
"#;

/// Deferred shading stage. `mode` selects the routine; 0 is the ambient resolve.
pub const DEFERRED_FRAGMENT: &str = r#"
struct DeferredUniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    camera_position: vec4<f32>,
    dimensions: vec2<f32>,
    mode: u32,
    has_environment: u32,
}

@group(0) @binding(0) var gbuffer_depth: texture_depth_2d;
@group(0) @binding(1) var gbuffer_albedo: texture_2d<f32>;
@group(0) @binding(2) var gbuffer_normal: texture_2d<f32>;
@group(0) @binding(3) var gbuffer_sampler: sampler;

@group(1) @binding(0) var specular_map: texture_cube<f32>;
@group(1) @binding(1) var irradiance_map: texture_cube<f32>;
@group(1) @binding(2) var environment_sampler: sampler;

@group(2) @binding(0) var<uniform> params: DeferredUniforms;

const MODE_AMBIENT: u32 = 0u;
const FALLBACK_AMBIENT: vec3<f32> = vec3<f32>(0.03, 0.03, 0.03);

fn ambient(albedo: vec3<f32>, normal: vec3<f32>) -> vec3<f32> {
    var irradiance = FALLBACK_AMBIENT;
    if params.has_environment != 0u {
        irradiance = textureSampleLevel(irradiance_map, environment_sampler, normal, 0.0).rgb;
    }
    return albedo * irradiance;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let coords = vec2<i32>(input.uv * params.dimensions);
    let depth = textureLoad(gbuffer_depth, coords, 0);
    let albedo = textureSampleLevel(gbuffer_albedo, gbuffer_sampler, input.uv, 0.0);
    let encoded = textureSampleLevel(gbuffer_normal, gbuffer_sampler, input.uv, 0.0);
    if depth >= 1.0 {
        discard;
    }

    let normal = normalize(encoded.xyz * 2.0 - 1.0);
    var color = vec3<f32>(0.0);
    if params.mode == MODE_AMBIENT {
        color = ambient(albedo.rgb, normal);
    }
    return vec4<f32>(color, 1.0);
}
"#;

pub const CAMERA_STRUCTS: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    position: vec4<f32>,
    near_far: vec4<f32>,
}

struct ObjectUniforms {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<uniform> object: ObjectUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}
"#;

/// View-space normals, encoded to `[0, 1]`
pub const NORMALS_BODY: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) view_normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let world_pos = object.model * vec4<f32>(input.position, 1.0);
    let world_normal = (object.normal_matrix * vec4<f32>(input.normal, 0.0)).xyz;
    output.clip_position = camera.view_proj * world_pos;
    output.view_normal = normalize((camera.view * vec4<f32>(world_normal, 0.0)).xyz);
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(normalize(input.view_normal) * 0.5 + 0.5, 1.0);
}
"#;

/// Shared by mesh forward and G-buffer shaders
pub const MESH_BODY: &str = r#"
struct MaterialUniforms {
    base_color: vec4<f32>,
}

@group(2) @binding(0) var<uniform> material: MaterialUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let world_pos = object.model * vec4<f32>(input.position, 1.0);
    output.clip_position = camera.view_proj * world_pos;
    output.world_normal = normalize((object.normal_matrix * vec4<f32>(input.normal, 0.0)).xyz);
    return output;
}
"#;

pub const MESH_FORWARD_FRAGMENT: &str = r#"
const LIGHT_DIRECTION: vec3<f32> = vec3<f32>(0.4, 0.8, 0.45);

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(input.world_normal);
    let diffuse = max(dot(n, normalize(LIGHT_DIRECTION)), 0.0);
    let lit = material.base_color.rgb * (0.1 + 0.9 * diffuse);
    return vec4<f32>(lit, material.base_color.a);
}
"#;

pub const MESH_GBUFFER_FRAGMENT: &str = r#"
struct GBufferOutput {
    @location(0) albedo: vec4<f32>,
    @location(1) normal: vec4<f32>,
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    var output: GBufferOutput;
    output.albedo = material.base_color;
    output.normal = vec4<f32>(normalize(input.world_normal) * 0.5 + 0.5, 1.0);
    return output;
}
"#;

/// Concatenate the camera/object declarations with a drawable shader body.
pub fn with_camera(body: &[&str]) -> String {
    let mut source = String::from(CAMERA_STRUCTS);
    for part in body {
        source.push('\n');
        source.push_str(part);
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_modules_have_both_entry_points() {
        let copy = fullscreen(COPY_FRAGMENT);
        assert!(copy.contains("fn vs_main") && copy.contains("fn fs_main"));

        let normals = with_camera(&[NORMALS_BODY]);
        assert!(normals.contains("CameraUniforms") && normals.contains("fn fs_main"));
    }
}
