//! Errors raised while building or resizing a camera pipeline.

use crate::backend::BackendError;
use crate::instance::InstanceError;
use crate::pipeline::EffectDomain;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("GPU backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("identity registry error: {0}")]
    Instance(#[from] InstanceError),

    #[error("effect '{effect}' ({domain:?}) is out of order: {reason}")]
    EffectOrder {
        effect: String,
        domain: EffectDomain,
        reason: &'static str,
    },

    #[error("render target size {width}x{height} has a zero extent")]
    ZeroResolution { width: u32, height: u32 },

    #[error("no camera at index {0}")]
    UnknownCamera(usize),
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::EffectOrder {
            effect: "vignette".into(),
            domain: EffectDomain::Ldr,
            reason: "LDR effects must follow the tonemapper",
        };
        assert_eq!(
            err.to_string(),
            "effect 'vignette' (Ldr) is out of order: LDR effects must follow the tonemapper"
        );

        let err = RenderError::from(BackendError::OutOfMemory);
        assert_eq!(err.to_string(), "GPU backend error: GPU memory exhausted");

        let err = RenderError::ZeroResolution { width: 0, height: 720 };
        assert_eq!(err.to_string(), "render target size 0x720 has a zero extent");

        assert_eq!(RenderError::UnknownCamera(3).to_string(), "no camera at index 3");
    }
}
