//! Camera frames end to end on the recording backend

mod common;

use camera_pipeline::camera::{
    matrix_aspect_ratio, CameraConfig, CameraTexture, ClearMode, ProjectionKind, RenderPath,
    ShaderSet, ShaderStage, NEUTRAL_CLEAR_COLOR,
};
use camera_pipeline::pipeline::FrameStage;
use camera_pipeline::{Camera, InstanceRegistry, RenderError, Scene, Skybox};
use common::{
    backend, camera, camera_with_shaders, labels, render, view, FlatDrawable, HEIGHT, WIDTH,
};
use rstest::rstest;
use std::sync::Arc;

const GARBAGE: [f32; 4] = [1.0, 0.0, 1.0, 0.5];

#[test]
fn frame_runs_every_stage_in_order() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    render(&mut backend, &mut camera, &Scene::new());

    assert_eq!(
        camera.frame().completed_stages(),
        &[
            FrameStage::ClearBackground,
            FrameStage::DeferredPass,
            FrameStage::ForwardPass,
            FrameStage::EffectChain,
            FrameStage::Resolve,
        ]
    );
    assert_eq!(camera.frame().stage(), None);
    assert_eq!(backend.frames_presented(), 1);
    camera.release(&mut backend);
}

#[test]
fn hdr_black_clear_produces_black_output() {
    let black = [0.0, 0.0, 0.0, 1.0];
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_hdr(true).with_clear_color(black),
    );
    backend.fill_view(view(&camera, CameraTexture::Hdr0), GARBAGE);
    backend.fill_view(backend.swapchain_view(), GARBAGE);

    let passes = render(&mut backend, &mut camera, &Scene::new());
    assert_eq!(labels(&passes), vec!["Camera Clear", "Camera Resolve"]);
    assert!(passes[1].reads(view(&camera, CameraTexture::Hdr0)));

    let output = backend.read_texels(backend.swapchain_view()).unwrap();
    assert_eq!(output.len(), (WIDTH * HEIGHT) as usize);
    assert!(output.iter().all(|texel| *texel == black));
    camera.release(&mut backend);
}

#[test]
fn clear_nothing_keeps_previous_contents() {
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_clear_mode(ClearMode::Nothing),
    );
    let color = view(&camera, CameraTexture::Ldr0);
    let depth = view(&camera, CameraTexture::Depth);
    backend.fill_view(color, GARBAGE);
    backend.fill_view(depth, [0.5, 0.0, 0.0, 1.0]);

    let passes = render(&mut backend, &mut camera, &Scene::new());
    assert_eq!(labels(&passes), vec!["Camera Resolve"]);
    assert!(backend.read_texels(color).unwrap().iter().all(|t| *t == GARBAGE));
    assert!(backend
        .read_texels(depth)
        .unwrap()
        .iter()
        .all(|t| t[0] == 0.5));
    assert!(backend
        .read_texels(backend.swapchain_view())
        .unwrap()
        .iter()
        .all(|t| *t == GARBAGE));
    camera.release(&mut backend);
}

#[test]
fn clear_depth_leaves_color_alone() {
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_clear_mode(ClearMode::Depth),
    );
    let color = view(&camera, CameraTexture::Ldr0);
    let depth = view(&camera, CameraTexture::Depth);
    backend.fill_view(color, GARBAGE);
    backend.fill_view(depth, [0.25, 0.0, 0.0, 1.0]);

    let passes = render(&mut backend, &mut camera, &Scene::new());
    let clear = &passes[0];
    assert_eq!(clear.label(), "Camera Clear");
    assert!(clear.color_attachments.is_empty());
    assert_eq!(clear.depth_attachment, Some(depth));

    assert!(backend.read_texels(color).unwrap().iter().all(|t| *t == GARBAGE));
    assert!(backend.read_texels(depth).unwrap().iter().all(|t| t[0] == 1.0));
    camera.release(&mut backend);
}

#[test]
fn clear_color_restores_the_neutral_clear_color() {
    let color = [0.2, 0.4, 0.6, 1.0];
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default().with_clear_color(color));

    let passes = render(&mut backend, &mut camera, &Scene::new());
    let clear = &passes[0];
    assert!(clear.writes(view(&camera, CameraTexture::Ldr0)));
    assert_eq!(clear.depth_attachment, Some(view(&camera, CameraTexture::Depth)));
    assert!(backend
        .read_texels(view(&camera, CameraTexture::Ldr0))
        .unwrap()
        .iter()
        .all(|t| *t == color));
    assert_eq!(camera.targets().clear_color(), NEUTRAL_CLEAR_COLOR);
    camera.release(&mut backend);
}

#[test]
fn skybox_clear_draws_the_scene_skybox() {
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_clear_mode(ClearMode::Skybox),
    );
    let mut scene = Scene::new();
    scene.set_skybox(Some(
        Skybox::solid(&mut backend, [80, 120, 200, 255], [20, 30, 40, 255]).unwrap(),
    ));
    camera.on_scene_graph_update(&scene);

    let passes = render(&mut backend, &mut camera, &scene);
    assert_eq!(labels(&passes), vec!["Camera Clear", "Skybox", "Camera Resolve"]);
    let skybox = &passes[1];
    assert!(skybox.writes(view(&camera, CameraTexture::Ldr0)));
    assert_eq!(skybox.draw_count, 1);
    camera.release(&mut backend);
}

#[test]
fn broken_skybox_shader_degrades_to_a_plain_clear() {
    let mut backend = backend();
    let shaders = ShaderSet {
        skybox: Some(String::new()),
        ..ShaderSet::default()
    };
    let mut camera = camera_with_shaders(
        &mut backend,
        CameraConfig::default().with_clear_mode(ClearMode::Skybox),
        &shaders,
    );
    assert!(camera.shaders().degraded().contains(&ShaderStage::Skybox));

    let mut scene = Scene::new();
    scene.set_skybox(Some(
        Skybox::solid(&mut backend, [255; 4], [0, 0, 0, 255]).unwrap(),
    ));
    camera.on_scene_graph_update(&scene);

    let passes = render(&mut backend, &mut camera, &scene);
    assert_eq!(labels(&passes), vec!["Camera Clear", "Camera Resolve"]);
    camera.release(&mut backend);
}

#[test]
fn forward_path_skips_the_deferred_pass() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    let mut scene = Scene::new();
    scene.add_drawable(FlatDrawable::deferred("a"));
    scene.add_drawable(FlatDrawable::forward("b"));
    camera.on_scene_graph_update(&scene);

    let passes = render(&mut backend, &mut camera, &scene);
    assert_eq!(labels(&passes), vec!["Camera Clear", "Forward", "Camera Resolve"]);
    assert_eq!(passes[1].draw_count, 2);
    assert_eq!(camera.cache().forward_len(), 2);
    assert_eq!(camera.cache().deferred_len(), 0);
    camera.release(&mut backend);
}

#[test]
fn deferred_path_draws_geometry_then_ambient() {
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_render_path(RenderPath::Deferred),
    );
    let mut scene = Scene::new();
    scene.add_drawable(FlatDrawable::deferred("wall"));
    scene.add_drawable(FlatDrawable::deferred("floor"));
    scene.add_drawable(FlatDrawable::forward("glass"));
    camera.on_scene_graph_update(&scene);
    assert_eq!(camera.cache().deferred_len(), 2);
    assert_eq!(camera.cache().forward_len(), 1);

    let passes = render(&mut backend, &mut camera, &scene);
    assert_eq!(
        labels(&passes),
        vec![
            "Camera Clear",
            "G-Buffer Geometry",
            "Deferred Ambient",
            "Forward",
            "Camera Resolve"
        ]
    );

    let gbuffer = camera.gbuffer().unwrap();
    let geometry = &passes[1];
    assert_eq!(geometry.draw_count, 2);
    for color in gbuffer.color_views() {
        assert!(geometry.writes(color));
    }
    assert_eq!(geometry.depth_attachment, Some(gbuffer.depth_view()));

    let ambient = &passes[2];
    assert!(ambient.depth_attachment.is_none());
    assert!(ambient.writes(view(&camera, CameraTexture::Ldr0)));
    for color in gbuffer.color_views() {
        assert!(ambient.reads(color));
    }
    assert!(ambient.reads(gbuffer.depth_view()));
    assert_eq!(ambient.draw_count, 1);

    assert_eq!(passes[3].draw_count, 1);
    camera.release(&mut backend);
}

#[test]
fn deferred_path_without_a_shader_skips_the_pass() {
    let mut backend = backend();
    let shaders = ShaderSet {
        deferred: None,
        ..ShaderSet::default()
    };
    let mut camera = camera_with_shaders(
        &mut backend,
        CameraConfig::default().with_render_path(RenderPath::Deferred),
        &shaders,
    );
    assert!(camera.shaders().degraded().contains(&ShaderStage::Deferred));

    let mut scene = Scene::new();
    scene.add_drawable(FlatDrawable::forward("glass"));
    camera.on_scene_graph_update(&scene);

    let passes = render(&mut backend, &mut camera, &scene);
    assert_eq!(labels(&passes), vec!["Camera Clear", "Forward", "Camera Resolve"]);
    camera.release(&mut backend);
}

#[rstest]
#[case::enabled(true, true)]
#[case::disabled(false, false)]
fn normals_pass_follows_the_forward_pass(#[case] enabled: bool, #[case] expected: bool) {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default().with_normals_pass(enabled));
    let mut scene = Scene::new();
    scene.add_drawable(FlatDrawable::forward("a"));
    camera.on_scene_graph_update(&scene);

    let passes = render(&mut backend, &mut camera, &scene);
    let names = labels(&passes);
    assert_eq!(names.contains(&"Normals"), expected);
    assert!(camera.targets().view(CameraTexture::Normals).is_some());

    if expected {
        let forward = names.iter().position(|n| *n == "Forward").unwrap();
        let normals = &passes[forward + 1];
        assert_eq!(normals.label(), "Normals");
        assert!(normals.writes(view(&camera, CameraTexture::Normals)));
        assert_eq!(normals.depth_attachment, Some(view(&camera, CameraTexture::Depth)));
        assert_eq!(normals.draw_count, 1);
    }
    camera.release(&mut backend);
}

#[rstest]
#[case::perspective_ldr(ProjectionKind::Perspective, false)]
#[case::perspective_hdr(ProjectionKind::Perspective, true)]
#[case::orthographic_ldr(ProjectionKind::Orthographic, false)]
#[case::orthographic_hdr(ProjectionKind::Orthographic, true)]
fn resize_reallocates_targets_and_projection(
    #[case] projection: ProjectionKind,
    #[case] hdr: bool,
) {
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default()
            .with_projection(projection)
            .with_hdr(hdr)
            .with_render_path(RenderPath::Deferred),
    );
    let old_color = view(&camera, CameraTexture::Ldr0);

    assert!(camera.resize(&mut backend, 16, 4).unwrap());
    assert_eq!(camera.resolution(), (16, 4));
    for texture in [
        CameraTexture::Ldr0,
        CameraTexture::Ldr1,
        CameraTexture::Depth,
        CameraTexture::Hdr0,
        CameraTexture::Hdr1,
    ] {
        let expected = (!texture.is_hdr() || hdr).then_some((16, 4));
        assert_eq!(camera.targets().texture_size(texture), expected, "{:?}", texture);
    }
    assert!(!backend.is_live_view(old_color));
    assert_eq!(camera.gbuffer().unwrap().size(), (16, 4));

    let aspect = matrix_aspect_ratio(&camera.projection_matrix());
    assert!((aspect - 4.0).abs() < 1e-5, "aspect {}", aspect);
    assert!((camera.aspect_ratio() - 4.0).abs() < 1e-5);

    // Frames still render at the new size
    render(&mut backend, &mut camera, &Scene::new());
    camera.release(&mut backend);
}

#[rstest]
#[case::zero_width(0, 4)]
#[case::zero_height(4, 0)]
#[case::unchanged(WIDTH, HEIGHT)]
fn ignored_resizes_keep_the_targets(#[case] width: u32, #[case] height: u32) {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    let color = view(&camera, CameraTexture::Ldr0);

    assert!(!camera.resize(&mut backend, width, height).unwrap());
    assert_eq!(camera.resolution(), (WIDTH, HEIGHT));
    assert_eq!(view(&camera, CameraTexture::Ldr0), color);
    camera.release(&mut backend);
}

#[rstest]
#[case::first_target(0)]
#[case::depth_target(2)]
#[case::gbuffer_albedo(4)]
#[case::gbuffer_normal(5)]
fn failed_resize_keeps_the_previous_allocation(#[case] budget: usize) {
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_render_path(RenderPath::Deferred),
    );
    let depth = view(&camera, CameraTexture::Depth);
    let color = view(&camera, CameraTexture::Ldr0);
    let textures = backend.live_texture_count();
    let aspect = camera.aspect_ratio();

    backend.fail_texture_allocations_after(budget);
    let result = camera.resize(&mut backend, 16, 4);

    assert!(matches!(result, Err(RenderError::Backend(_))));
    assert_eq!(backend.live_texture_count(), textures);
    assert_eq!(camera.resolution(), (WIDTH, HEIGHT));
    assert_eq!(view(&camera, CameraTexture::Ldr0), color);
    assert!(backend.is_live_view(color));

    let gbuffer = camera.gbuffer().unwrap();
    assert_eq!(gbuffer.size(), (WIDTH, HEIGHT));
    assert_eq!(gbuffer.depth_view(), depth);
    assert!(backend.is_live_view(depth));
    assert!(backend.bind_group_views(gbuffer.input_group()).contains(&depth));
    assert_eq!(camera.aspect_ratio(), aspect);

    // a later resize with memory available still succeeds
    backend.fail_texture_allocations_after(usize::MAX);
    assert!(camera.resize(&mut backend, 16, 4).unwrap());
    assert_eq!(camera.gbuffer().unwrap().depth_view(), view(&camera, CameraTexture::Depth));
    render(&mut backend, &mut camera, &Scene::new());
    camera.release(&mut backend);
}

#[test]
fn cameras_receive_distinct_identities() {
    let mut backend = backend();
    let registry = Arc::new(InstanceRegistry::new());
    let mut cameras = Vec::new();
    for label in ["Left", "Right"] {
        cameras.push(
            Camera::new(
                &mut backend,
                Arc::clone(&registry),
                CameraConfig::default().with_label(label),
                &ShaderSet::default(),
                (WIDTH, HEIGHT),
            )
            .unwrap(),
        );
    }
    assert_ne!(cameras[0].id(), cameras[1].id());
    assert_eq!(registry.get(cameras[1].id()).unwrap(), "Right");

    for mut camera in cameras {
        camera.release(&mut backend);
    }
    assert!(registry.is_empty());
}

#[test]
fn allocation_failure_is_reported() {
    let mut backend = backend();
    let registry = Arc::new(InstanceRegistry::new());
    backend.fail_texture_allocations_after(0);

    let result = Camera::new(
        &mut backend,
        Arc::clone(&registry),
        CameraConfig::default(),
        &ShaderSet::default(),
        (WIDTH, HEIGHT),
    );
    assert!(matches!(result, Err(RenderError::Backend(_))));
    assert!(registry.is_empty());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "drawable cache is stale")]
fn rendering_a_stale_cache_is_caught() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    let mut scene = Scene::new();
    camera.on_scene_graph_update(&scene);
    scene.add_drawable(FlatDrawable::forward("late"));

    render(&mut backend, &mut camera, &scene);
}
