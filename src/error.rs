use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::gpu::ShaderStage;

/// The context refused to hand out a new object.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to allocate {kind}: {reason}")]
    Allocation { kind: &'static str, reason: String },
}

impl GpuError {
    pub(crate) fn allocation(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Allocation {
            kind,
            reason: reason.into(),
        }
    }
}

/// Failure while building a [`ShaderProgram`](crate::ShaderProgram).
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("unable to read {stage} shader source {}", path.display())]
    Io {
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Inconsistency between vertex data and its attribute layout, reported only
/// when validation is enabled on the builder.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("vertex layout has no attributes")]
    EmptyLayout,
    #[error(
        "vertex data is {len} bytes, not a multiple of the {stride}-byte stride of slot {slot}"
    )]
    StrideMismatch { slot: u32, len: usize, stride: u32 },
    #[error("attribute in slot {slot} ends at byte {end}, past its {stride}-byte stride")]
    AttributeOverflow { slot: u32, end: u32, stride: u32 },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Failure while loading an image into a texture object.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode texture {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_carries_stage_and_log() {
        let err = ShaderError::Compile {
            stage: ShaderStage::Fragment,
            log: "0:3(1): error: syntax error".to_string(),
        };
        let message = err.to_string();
        assert!(message.starts_with("fragment shader failed to compile"));
        assert!(message.contains("syntax error"));
    }
}
