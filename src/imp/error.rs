// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::images::shader::ShaderStage;

/// Operations the emulation can never provide on an immediate-mode context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedOperation {
    /// Mapping a sub-range of a buffer.  Only whole-buffer views exist.
    PartialRangeMapping,
    /// Mapping a buffer asynchronously after creation.
    AsyncMapping,
    /// Keeping earlier contents of a multisampled attachment.  Samples live in per-pass
    /// renderbuffers that start empty and cannot be blitted into.
    MultisampledLoad,
}

impl std::fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsupportedOperation::PartialRangeMapping => write!(f, "unsupported range"),
            UnsupportedOperation::AsyncMapping => write!(f, "asynchronous buffer mapping"),
            UnsupportedOperation::MultisampledLoad => {
                write!(f, "loading a multisampled attachment")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The native compiler rejected a shader stage.  Not retried.
    #[error("{stage:?} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    /// Program link failed.  Fatal to the pipeline being created.
    #[error("program failed to link: {log}")]
    Link { log: String },
    /// Only raised when [crate::images::device::DeviceConfig::check_framebuffer_status] is set.
    #[error("framebuffer incomplete (status {status:#06x})")]
    FramebufferIncomplete { status: u32 },
    #[error("operation not supported: {0}")]
    Unsupported(UnsupportedOperation),
    #[error("pipeline compilation was cancelled")]
    Cancelled,
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("waiting on the queue failed")]
    WaitFailed,
    #[error("native context error: {0}")]
    Native(String),
}
