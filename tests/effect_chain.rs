//! Ping-pong protocol of the post-process chain, observed through recorded passes

mod common;

use camera_pipeline::camera::{CameraConfig, CameraTexture};
use camera_pipeline::pipeline::postprocess::{GaussianBlur, Tonemapping, Vignette};
use camera_pipeline::pipeline::sub_pass_buffers;
use camera_pipeline::{EffectDomain, RenderError, Scene};
use common::{backend, camera, effect_passes, render, view, TestEffect};
use rstest::rstest;

#[rstest]
#[case::none(0)]
#[case::one(1)]
#[case::two(2)]
#[case::three(3)]
#[case::four(4)]
#[case::five(5)]
fn sub_passes_alternate_without_aliasing(#[case] sub_passes: u32) {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default().with_hdr(true));
    camera
        .add_effect(&mut backend, TestEffect::boxed("Probe", EffectDomain::Hdr, sub_passes))
        .unwrap();

    let passes = render(&mut backend, &mut camera, &Scene::new());
    let effects = effect_passes(&passes);

    let sub = effects
        .iter()
        .filter(|pass| pass.label().starts_with("Effect: Probe"))
        .collect::<Vec<_>>();
    assert_eq!(sub.len(), sub_passes as usize);

    for (index, pass) in sub.iter().enumerate() {
        assert_eq!(pass.label(), format!("Effect: Probe #{}", index));
        let (read, write) = sub_pass_buffers(EffectDomain::Hdr, index as u32);
        let (read, write) = (view(&camera, read), view(&camera, write));
        assert!(pass.reads(read), "sub-pass {} does not read its input", index);
        assert!(pass.writes(write), "sub-pass {} does not write its output", index);
        assert!(!pass.reads(write), "sub-pass {} samples its own target", index);
        assert!(pass.depth_attachment.is_none());
    }

    let copy_backs = effects
        .iter()
        .filter(|pass| pass.label() == "Effect Copy-Back")
        .count();
    assert_eq!(copy_backs, (sub_passes % 2) as usize);

    // Whatever ran last leaves the result in the primary target
    if let Some(last) = effects.last() {
        assert!(last.writes(view(&camera, CameraTexture::Hdr0)));
    }
    camera.release(&mut backend);
}

#[test]
fn copy_back_moves_secondary_into_primary() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    camera
        .add_effect(&mut backend, TestEffect::boxed("Odd", EffectDomain::Ldr, 1))
        .unwrap();

    let passes = render(&mut backend, &mut camera, &Scene::new());
    let copy_back = passes
        .iter()
        .find(|pass| pass.label() == "Effect Copy-Back")
        .expect("copy-back pass");
    assert!(copy_back.reads(view(&camera, CameraTexture::Ldr1)));
    assert!(copy_back.writes(view(&camera, CameraTexture::Ldr0)));
    camera.release(&mut backend);
}

#[test]
fn zero_sub_pass_effect_records_nothing() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    let effect = TestEffect::new("Idle", EffectDomain::Ldr, 0);
    let probe = effect.probe();
    camera.add_effect(&mut backend, Box::new(effect)).unwrap();

    let passes = render(&mut backend, &mut camera, &Scene::new());
    assert!(effect_passes(&passes).is_empty());
    // render still ran, the effect just did no work
    assert_eq!(probe.borrow().domains, vec![EffectDomain::Ldr]);
    camera.release(&mut backend);
}

#[test]
fn data_reaches_the_output_through_the_chain() {
    let color = [0.25, 0.5, 0.75, 1.0];
    let mut backend = backend();
    let mut camera = camera(
        &mut backend,
        CameraConfig::default().with_hdr(true).with_clear_color(color),
    );
    for (name, sub_passes) in [("A", 3), ("B", 2)] {
        camera
            .add_effect(&mut backend, TestEffect::boxed(name, EffectDomain::Hdr, sub_passes))
            .unwrap();
    }
    camera
        .add_effect(&mut backend, Box::new(Tonemapping::default()))
        .unwrap();
    camera
        .add_effect(&mut backend, TestEffect::boxed("C", EffectDomain::Ldr, 1))
        .unwrap();

    render(&mut backend, &mut camera, &Scene::new());
    let output = backend.read_texels(backend.swapchain_view()).unwrap();
    assert!(output.iter().all(|texel| *texel == color));
    camera.release(&mut backend);
}

#[test]
fn tonemapper_switches_the_chain_to_ldr() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default().with_hdr(true));
    camera
        .add_effect(&mut backend, Box::new(GaussianBlur::new(EffectDomain::Hdr, 3)))
        .unwrap();
    camera
        .add_effect(&mut backend, Box::new(Tonemapping::default()))
        .unwrap();
    let vignette = TestEffect::new("Vignette Probe", EffectDomain::Ldr, 1);
    let probe = vignette.probe();
    camera.add_effect(&mut backend, Box::new(vignette)).unwrap();

    let passes = render(&mut backend, &mut camera, &Scene::new());
    let hdr0 = view(&camera, CameraTexture::Hdr0);
    let hdr1 = view(&camera, CameraTexture::Hdr1);
    let ldr0 = view(&camera, CameraTexture::Ldr0);

    let tonemap_index = passes
        .iter()
        .position(|pass| pass.label() == "Effect: Tonemapping #0")
        .expect("tonemapping pass");
    let tonemap = &passes[tonemap_index];
    assert!(tonemap.reads(hdr0));
    assert!(tonemap.writes(ldr0));

    // Blur ran three times, so its copy-back precedes the tonemapper
    assert_eq!(passes[tonemap_index - 1].label(), "Effect Copy-Back");
    assert!(passes[tonemap_index - 1].writes(hdr0));

    for pass in &passes[tonemap_index + 1..] {
        assert!(!pass.reads(hdr1), "{} reads HDR secondary", pass.label());
        assert!(!pass.writes(hdr1), "{} writes HDR secondary", pass.label());
    }

    let resolve = passes.last().unwrap();
    assert_eq!(resolve.label(), "Camera Resolve");
    assert!(resolve.reads(ldr0));

    assert_eq!(probe.borrow().domains, vec![EffectDomain::Ldr]);
    assert!(camera.frame().tonemapped());
    assert_eq!(camera.frame().domain(), EffectDomain::Ldr);
    camera.release(&mut backend);
}

#[test]
fn hdr_camera_without_tonemapper_resolves_hdr_primary() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default().with_hdr(true));
    camera
        .add_effect(&mut backend, TestEffect::boxed("Hdr", EffectDomain::Hdr, 2))
        .unwrap();

    let passes = render(&mut backend, &mut camera, &Scene::new());
    let resolve = passes.last().unwrap();
    assert!(resolve.reads(view(&camera, CameraTexture::Hdr0)));
    assert!(!camera.frame().tonemapped());
    camera.release(&mut backend);
}

#[test]
fn depth_is_off_inside_the_chain_and_restored_after() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    let effect = TestEffect::new("Depth Probe", EffectDomain::Ldr, 1);
    let probe = effect.probe();
    camera.add_effect(&mut backend, Box::new(effect)).unwrap();
    camera
        .add_effect(&mut backend, Box::new(Vignette::default()))
        .unwrap();

    render(&mut backend, &mut camera, &Scene::new());
    assert_eq!(probe.borrow().depth_enabled, vec![false]);
    assert!(camera.frame().depth_test());
    assert!(camera.frame().depth_write());
    camera.release(&mut backend);
}

#[rstest]
#[case::hdr_on_ldr_camera(false, &[], EffectDomain::Hdr)]
#[case::tonemapper_on_ldr_camera(false, &[], EffectDomain::Tonemapper)]
#[case::ldr_before_tonemapper(true, &[], EffectDomain::Ldr)]
#[case::hdr_after_tonemapper(true, &[EffectDomain::Tonemapper], EffectDomain::Hdr)]
#[case::second_tonemapper(true, &[EffectDomain::Tonemapper], EffectDomain::Tonemapper)]
fn misordered_effects_are_rejected(
    #[case] hdr: bool,
    #[case] existing: &[EffectDomain],
    #[case] next: EffectDomain,
) {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default().with_hdr(hdr));
    for (index, domain) in existing.iter().enumerate() {
        let name = format!("Existing {}", index);
        camera
            .add_effect(&mut backend, TestEffect::boxed(&name, *domain, 1))
            .unwrap();
    }

    let result = camera.add_effect(&mut backend, TestEffect::boxed("Next", next, 1));
    match result {
        Err(RenderError::EffectOrder { effect, domain, .. }) => {
            assert_eq!(effect, "Next");
            assert_eq!(domain, next);
        }
        other => panic!("expected an order error, got {:?}", other),
    }
    assert_eq!(camera.effects().len(), existing.len());
    camera.release(&mut backend);
}

#[test]
fn released_camera_releases_its_effects() {
    let mut backend = backend();
    let mut camera = camera(&mut backend, CameraConfig::default());
    let effect = TestEffect::new("Owned", EffectDomain::Ldr, 1);
    let probe = effect.probe();
    camera.add_effect(&mut backend, Box::new(effect)).unwrap();

    camera.release(&mut backend);
    assert!(probe.borrow().released);
}
