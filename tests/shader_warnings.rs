//! Warnings emitted while a camera builds its shader set

mod common;

use camera_pipeline::camera::{CameraConfig, ShaderSet, ShaderStage};
use common::{backend, camera_with_shaders};
use std::sync::Mutex;

/// Captures formatted warnings; installed once for this test binary.
struct WarningCapture {
    entries: Mutex<Vec<String>>,
}

impl log::Log for WarningCapture {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut entries) = self.entries.lock() {
                entries.push(format!("{}", record.args()));
            }
        }
    }

    fn flush(&self) {}
}

static CAPTURE: WarningCapture = WarningCapture {
    entries: Mutex::new(Vec::new()),
};

#[test]
fn degraded_stage_is_reported_once() {
    log::set_logger(&CAPTURE).expect("no other logger in this binary");
    log::set_max_level(log::LevelFilter::Warn);

    let mut backend = backend();
    let shaders = ShaderSet {
        skybox: Some("not wgsl".to_string()),
        ..Default::default()
    };
    let mut camera = camera_with_shaders(&mut backend, CameraConfig::default(), &shaders);
    assert_eq!(camera.shaders().degraded(), &[ShaderStage::Skybox]);

    let entries = CAPTURE.entries.lock().unwrap();
    let skybox_warnings = entries.iter().filter(|e| e.contains("skybox")).count();
    assert_eq!(skybox_warnings, 1, "{:?}", entries);
    drop(entries);

    camera.release(&mut backend);
}
