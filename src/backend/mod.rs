//! Backend abstraction layer
//!
//! Provides the common trait and types implemented by the wgpu backend and by the
//! headless recording backend.

pub mod recording;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use recording::{RecordedPass, RecordingBackend};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
